//! Append-only action and cycle logs.
//!
//! Both logs are JSON Lines files. [`ActionLog::append`] and
//! [`ActionLog::append_cycle`] are the only writes; each line is synced to
//! disk before the call returns. There is no edit or delete operation.

use crate::action::ProposedAction;
use crate::error::{DealerError, Result};
use crate::executor::{Execution, ExecutionMode, RejectionReason};
use crate::io::{append_line, read_tail_lines};
use crate::paths::Layout;
use crate::response::MalformedEntry;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ActionLogEntry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub cycle_id: Uuid,
    pub action: ProposedAction,
    pub mode: ExecutionMode,
    pub accepted: bool,
    /// Accepted and the store was mutated.
    pub applied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<RejectionReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbox_file: Option<PathBuf>,
}

impl ActionLogEntry {
    pub fn record(
        cycle_id: Uuid,
        action: ProposedAction,
        mode: ExecutionMode,
        execution: &Execution,
    ) -> Self {
        let rejection = execution.verdict.rejection().cloned();
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            cycle_id,
            action,
            mode,
            accepted: execution.verdict.is_accepted(),
            applied: execution.applied,
            rejection_message: rejection.as_ref().map(|r| r.to_string()),
            rejection,
            outbox_file: execution.outbox_file.clone(),
        }
    }

    /// Short status word for feeds and tables.
    pub fn status(&self) -> &'static str {
        match (self.accepted, self.applied, self.mode) {
            (false, _, _) => "rejected",
            (true, true, _) => "applied",
            (true, false, ExecutionMode::DryRun) => "simulated",
            (true, false, ExecutionMode::Live) => "accepted",
        }
    }
}

// ---------------------------------------------------------------------------
// CycleRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleOutcome {
    Completed,
    Failed { reason: String },
}

/// Summary of one scheduler cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub mode: ExecutionMode,
    pub proposed: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub applied: usize,
    #[serde(default)]
    pub malformed: Vec<MalformedEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_summary: Option<String>,
    pub outcome: CycleOutcome,
}

impl CycleRecord {
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, CycleOutcome::Failed { .. })
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

// ---------------------------------------------------------------------------
// ActionLog
// ---------------------------------------------------------------------------

/// Handle to the two log files. Cheap to clone.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionLog {
    actions: PathBuf,
    cycles: PathBuf,
}

impl ActionLog {
    pub fn open(layout: &Layout) -> Self {
        Self {
            actions: layout.action_log(),
            cycles: layout.cycle_log(),
        }
    }

    pub fn actions_path(&self) -> &Path {
        &self.actions
    }

    pub fn cycles_path(&self) -> &Path {
        &self.cycles
    }

    pub fn append(&self, entry: &ActionLogEntry) -> Result<()> {
        let line = serde_json::to_string(entry)?;
        append_line(&self.actions, &line)
    }

    pub fn append_cycle(&self, record: &CycleRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        append_line(&self.cycles, &line)
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> Result<Vec<ActionLogEntry>> {
        read_lines(&self.actions)
    }

    /// The most recent `n` entries, newest first. Only the tail of the file
    /// is read.
    pub fn recent(&self, n: usize) -> Result<Vec<ActionLogEntry>> {
        read_recent(&self.actions, n)
    }

    pub fn cycles(&self) -> Result<Vec<CycleRecord>> {
        read_lines(&self.cycles)
    }

    pub fn recent_cycles(&self, n: usize) -> Result<Vec<CycleRecord>> {
        read_recent(&self.cycles, n)
    }

    pub fn last_cycle(&self) -> Result<Option<CycleRecord>> {
        Ok(self.recent_cycles(1)?.pop())
    }
}

/// Newest first. An unreadable line in the tail is skipped, so fewer than
/// `n` records may come back.
fn read_recent<T: DeserializeOwned>(path: &Path, n: usize) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for line in read_tail_lines(path, n)?.iter().rev() {
        match serde_json::from_str(line) {
            Ok(v) => out.push(v),
            Err(e) => tracing::warn!(path = %path.display(), "skipping unreadable log line: {e}"),
        }
    }
    Ok(out)
}

fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(DealerError::Io(e)),
    };
    let mut out = Vec::new();
    for (n, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(v) => out.push(v),
            Err(e) => tracing::warn!(
                path = %path.display(),
                line = n + 1,
                "skipping unreadable log line: {e}"
            ),
        }
    }
    Ok(out)
}
