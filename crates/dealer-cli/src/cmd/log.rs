use std::path::Path;

use dealer_core::action_log::{ActionLog, CycleOutcome};

use crate::cmd::load_config;
use crate::output::{print_json, print_table};

pub fn run(root: &Path, limit: usize, cycles: bool, json: bool) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let log = ActionLog::open(&config.layout(root));
    if cycles {
        show_cycles(&log, limit, json)
    } else {
        show_actions(&log, limit, json)
    }
}

fn show_actions(log: &ActionLog, limit: usize, json: bool) -> anyhow::Result<()> {
    let entries = log.recent(limit)?;
    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No actions logged yet.");
        return Ok(());
    }
    let rows = entries
        .iter()
        .map(|e| {
            vec![
                e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                e.mode.to_string(),
                e.status().to_string(),
                e.action.kind().as_str().to_string(),
                e.action.describe(),
                e.rejection
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["TIME", "MODE", "STATUS", "KIND", "ACTION", "REJECTION"], rows);
    Ok(())
}

fn show_cycles(log: &ActionLog, limit: usize, json: bool) -> anyhow::Result<()> {
    let cycles = log.recent_cycles(limit)?;
    if json {
        return print_json(&cycles);
    }
    if cycles.is_empty() {
        println!("No cycles logged yet.");
        return Ok(());
    }
    let rows = cycles
        .iter()
        .map(|c| {
            let outcome = match &c.outcome {
                CycleOutcome::Completed => "completed".to_string(),
                CycleOutcome::Failed { reason } => format!("failed: {reason}"),
            };
            vec![
                c.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                c.mode.to_string(),
                c.proposed.to_string(),
                c.accepted.to_string(),
                c.rejected.to_string(),
                c.applied.to_string(),
                c.malformed.len().to_string(),
                outcome,
            ]
        })
        .collect();
    print_table(
        &["STARTED", "MODE", "PROPOSED", "ACCEPTED", "REJECTED", "APPLIED", "MALFORMED", "OUTCOME"],
        rows,
    );
    Ok(())
}
