use std::path::Path;

use anyhow::Context;
use dealer_core::seed::{generate, GeneratorOptions};

use crate::cmd::load_config;
use crate::output::{money, print_json};

pub fn run(
    root: &Path,
    seed: Option<u64>,
    vehicles: usize,
    inquiries: usize,
    sales: usize,
    json: bool,
) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let layout = config.layout(root);
    let opts = GeneratorOptions {
        vehicles,
        inquiries,
        sales,
    };
    let summary = generate(&layout, seed, opts, config.prompt.aged_days)
        .context("failed to generate dealership data")?;

    if json {
        return print_json(&summary);
    }
    println!("Generated data in {}", layout.data_dir.display());
    println!("  vehicles:            {}", summary.inventory_count);
    println!("  competitor listings: {}", summary.competitor_listings);
    println!("  customer inquiries:  {}", summary.customer_inquiries);
    println!("  sales history:       {}", summary.sales_history);
    println!(
        "  inventory value:     {}",
        money(summary.total_inventory_value)
    );
    println!(
        "  aged (>{} days):     {}",
        config.prompt.aged_days, summary.aged_inventory_count
    );
    Ok(())
}
