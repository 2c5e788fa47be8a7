use std::sync::Arc;

use chrono::{DateTime, Utc};
use dealer_core::action::ProposedAction;
use dealer_core::action_log::{ActionLog, ActionLogEntry, CycleOutcome, CycleRecord};
use dealer_core::config::Config;
use dealer_core::executor::{ExecutionMode, Executor};
use dealer_core::outbox::Outbox;
use dealer_core::paths::Layout;
use dealer_core::response::ParsedDecisions;
use dealer_core::store::StateStore;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::engine::DecisionEngine;
use crate::error::CycleError;
use crate::source::DecisionSource;

// ─── CycleRunner ──────────────────────────────────────────────────────────

/// Runs one full cycle: load the store, ask the engine, then validate,
/// apply and log every proposed action in order.
///
/// The runner holds no store state between cycles; each cycle reads the
/// CSV files afresh so edits made between cycles are picked up.
#[derive(Clone)]
pub struct CycleRunner {
    engine: DecisionEngine,
    executor: Executor,
    log: ActionLog,
    layout: Layout,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Tally {
    accepted: usize,
    rejected: usize,
    applied: usize,
}

impl CycleRunner {
    pub fn new(engine: DecisionEngine, executor: Executor, log: ActionLog, layout: Layout) -> Self {
        Self {
            engine,
            executor,
            log,
            layout,
        }
    }

    /// Wire a runner from `dealer.yaml`. Live runs write drafted emails and
    /// posts to the outbox; dry runs write nothing.
    pub fn from_config(
        source: Arc<dyn DecisionSource>,
        config: &Config,
        layout: Layout,
        mode: ExecutionMode,
    ) -> Self {
        let engine = DecisionEngine::from_config(source, config);
        let mut executor = Executor::new(config.bounds, mode);
        if mode == ExecutionMode::Live {
            executor = executor.with_outbox(Outbox::new(&layout));
        }
        let log = ActionLog::open(&layout);
        Self::new(engine, executor, log, layout)
    }

    pub fn mode(&self) -> ExecutionMode {
        self.executor.mode()
    }

    pub fn log(&self) -> &ActionLog {
        &self.log
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    /// Run one cycle and append its [`CycleRecord`].
    ///
    /// A decision failure (service down, bad input) is a handled outcome:
    /// the record is written with `failed` status and returned as `Ok`.
    /// `Err` means the store or the logs could not be read or written; the
    /// actions logged before the failure stay logged.
    pub async fn run_once(&self) -> Result<CycleRecord, CycleError> {
        let cycle_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mode = self.mode();
        info!(cycle = %cycle_id, %mode, source = self.engine.source_name(), "cycle started");

        let layout = self.layout.clone();
        let loaded = tokio::task::spawn_blocking(move || StateStore::open(&layout))
            .await
            .map_err(|e| CycleError::Join(e.to_string()))?;
        let store = match loaded {
            Ok(store) => store,
            Err(e) => {
                let reason = e.to_string();
                let _ = self.fail(cycle_id, started_at, None, &reason).await;
                return Err(e.into());
            }
        };

        let decisions = match self.engine.decide(store.snapshot()).await {
            Ok(d) => d,
            Err(e) => {
                let reason = e.to_string();
                error!(cycle = %cycle_id, "cycle failed: {reason}");
                return self.fail(cycle_id, started_at, None, &reason).await;
            }
        };

        let ParsedDecisions {
            analysis_summary,
            actions,
            malformed,
        } = decisions;
        let proposed = actions.len();

        let executor = self.executor.clone();
        let log = self.log.clone();
        let applied = tokio::task::spawn_blocking(move || {
            let mut store = store;
            apply_all(&executor, &log, &mut store, cycle_id, actions)
        })
        .await
        .map_err(|e| CycleError::Join(e.to_string()))?;

        let tally = match applied {
            Ok(t) => t,
            Err(e) => {
                let reason = e.to_string();
                error!(cycle = %cycle_id, "cycle aborted: {reason}");
                let partial = ParsedDecisions {
                    analysis_summary,
                    actions: Vec::new(),
                    malformed,
                };
                let _ = self
                    .fail(cycle_id, started_at, Some((&partial, proposed)), &reason)
                    .await;
                return Err(e.into());
            }
        };

        let record = CycleRecord {
            id: cycle_id,
            started_at,
            finished_at: Utc::now(),
            mode,
            proposed,
            accepted: tally.accepted,
            rejected: tally.rejected,
            applied: tally.applied,
            malformed,
            analysis_summary,
            outcome: CycleOutcome::Completed,
        };
        self.append_cycle(record.clone()).await?;
        info!(
            cycle = %cycle_id,
            proposed = record.proposed,
            accepted = record.accepted,
            rejected = record.rejected,
            applied = record.applied,
            malformed = record.malformed.len(),
            "cycle finished"
        );
        Ok(record)
    }

    /// Write a `failed` cycle record. Returns the record, or the persistence
    /// error if even that write fails.
    async fn fail(
        &self,
        cycle_id: Uuid,
        started_at: DateTime<Utc>,
        partial: Option<(&ParsedDecisions, usize)>,
        reason: &str,
    ) -> Result<CycleRecord, CycleError> {
        let (proposed, malformed, analysis_summary) = match partial {
            Some((d, proposed)) => (proposed, d.malformed.clone(), d.analysis_summary.clone()),
            None => (0, Vec::new(), None),
        };
        let record = CycleRecord {
            id: cycle_id,
            started_at,
            finished_at: Utc::now(),
            mode: self.mode(),
            proposed,
            accepted: 0,
            rejected: 0,
            applied: 0,
            malformed,
            analysis_summary,
            outcome: CycleOutcome::Failed {
                reason: reason.to_string(),
            },
        };
        if let Err(e) = self.append_cycle(record.clone()).await {
            error!(cycle = %cycle_id, "could not record failed cycle: {e}");
            return Err(e);
        }
        Ok(record)
    }

    async fn append_cycle(&self, record: CycleRecord) -> Result<(), CycleError> {
        let log = self.log.clone();
        tokio::task::spawn_blocking(move || log.append_cycle(&record))
            .await
            .map_err(|e| CycleError::Join(e.to_string()))??;
        Ok(())
    }
}

/// Execute and log each action in order. Later validations see the effects
/// of earlier ones because they share `store`.
fn apply_all(
    executor: &Executor,
    log: &ActionLog,
    store: &mut StateStore,
    cycle_id: Uuid,
    actions: Vec<ProposedAction>,
) -> dealer_core::Result<Tally> {
    let mut tally = Tally::default();
    for action in actions {
        let execution = executor.execute(&action, store)?;
        match execution.verdict.rejection() {
            Some(reason) => {
                tally.rejected += 1;
                warn!(action = %action.id(), "rejected {}: {reason}", action.describe());
            }
            None => {
                tally.accepted += 1;
                info!(action = %action.id(), applied = execution.applied, "{}", action.describe());
            }
        }
        if execution.applied {
            tally.applied += 1;
        }
        let entry = ActionLogEntry::record(cycle_id, action, executor.mode(), &execution);
        log.append(&entry)?;
    }
    Ok(tally)
}
