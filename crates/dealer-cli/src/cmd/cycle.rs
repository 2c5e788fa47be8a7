use std::path::Path;

use dealer_agent::CycleRunner;
use dealer_core::action_log::{CycleOutcome, CycleRecord};
use dealer_core::executor::ExecutionMode;

use crate::cmd::{load_config, source_for};
use crate::output::print_json;

pub fn run(root: &Path, live: bool, offline: bool, json: bool) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let mode = if live {
        ExecutionMode::Live
    } else {
        ExecutionMode::DryRun
    };
    let source = source_for(&config, offline)?;
    let runner = CycleRunner::from_config(source, &config, config.layout(root), mode);

    let rt = tokio::runtime::Runtime::new()?;
    let record = rt.block_on(runner.run_once())?;

    if json {
        print_json(&record)?;
    } else {
        print_record(&record);
    }
    if let CycleOutcome::Failed { reason } = &record.outcome {
        anyhow::bail!("cycle failed: {reason}");
    }
    Ok(())
}

fn print_record(record: &CycleRecord) {
    println!("Cycle {} ({})", record.id, record.mode);
    if let Some(summary) = &record.analysis_summary {
        println!("  {summary}");
    }
    println!(
        "  proposed {}  accepted {}  rejected {}  applied {}  malformed {}",
        record.proposed,
        record.accepted,
        record.rejected,
        record.applied,
        record.malformed.len()
    );
    for m in &record.malformed {
        match m.index {
            Some(i) => println!("  malformed {}[{i}]: {}", m.section, m.reason),
            None => println!("  malformed {}: {}", m.section, m.reason),
        }
    }
    println!("  took {} ms; see `dealer log` for details", record.duration_ms());
}
