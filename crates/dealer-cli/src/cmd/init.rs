use std::path::Path;

use anyhow::Context;
use dealer_core::config::Config;
use dealer_core::io;
use dealer_core::paths::{self, CONFIG_FILE};

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing dealership in: {}", root.display());

    let yaml = serde_yaml::to_string(&Config::default())?;
    let created = io::write_if_missing(&paths::config_path(root), yaml.as_bytes())
        .context("failed to write dealer.yaml")?;
    if created {
        println!("  created: {CONFIG_FILE}");
    } else {
        println!("  exists:  {CONFIG_FILE}");
    }

    let config = Config::load(root).context("failed to read dealer.yaml")?;
    let layout = config.layout(root);
    for dir in [&layout.data_dir, &layout.log_dir] {
        io::ensure_dir(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }

    println!("\nNext: `dealer generate` to create sample data, then `dealer cycle`.");
    Ok(())
}
