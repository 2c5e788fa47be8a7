//! Timed cycle loop with manual trigger.
//!
//! One task owns the loop and runs cycles inline, so two cycles can never
//! overlap. Ticks and triggers that arrive while a cycle runs are dropped
//! and counted in [`SchedulerStatus::skipped`]. Stop is only observed
//! between cycles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dealer_core::action_log::{CycleOutcome, CycleRecord};
use dealer_core::executor::ExecutionMode;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::cycle::CycleRunner;

// ─── Status ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

impl SchedulerState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

/// Published on a watch channel after every transition.
///
/// A failed cycle leaves the loop `Idle`; the failure is carried by
/// `last_error` and the failed `last_cycle` until the next cycle finishes.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub mode: ExecutionMode,
    pub interval_secs: u64,
    pub started_at: DateTime<Utc>,
    pub cycles_run: u64,
    pub skipped: u64,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_cycle: Option<CycleRecord>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOutcome {
    Accepted,
    /// A cycle is running or already requested.
    Skipped,
    Stopped,
}

// ─── Handle ───────────────────────────────────────────────────────────────

/// Cloneable control surface for a running [`Scheduler`].
///
/// Dropping every handle stops the loop after the current cycle.
#[derive(Clone)]
pub struct SchedulerHandle {
    status_tx: Arc<watch::Sender<SchedulerStatus>>,
    status_rx: watch::Receiver<SchedulerStatus>,
    trigger_tx: mpsc::Sender<()>,
    stop_tx: Arc<watch::Sender<bool>>,
    busy: Arc<AtomicBool>,
}

impl SchedulerHandle {
    pub fn status(&self) -> SchedulerStatus {
        self.status_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerStatus> {
        self.status_rx.clone()
    }

    /// Request a cycle now. A no-op while a cycle is running.
    pub fn trigger(&self) -> TriggerOutcome {
        if *self.stop_tx.borrow() {
            return TriggerOutcome::Stopped;
        }
        if self.busy.load(Ordering::SeqCst) {
            self.count_skip("manual trigger during running cycle");
            return TriggerOutcome::Skipped;
        }
        match self.trigger_tx.try_send(()) {
            Ok(()) => TriggerOutcome::Accepted,
            Err(mpsc::error::TrySendError::Full(())) => {
                self.count_skip("manual trigger already pending");
                TriggerOutcome::Skipped
            }
            Err(mpsc::error::TrySendError::Closed(())) => TriggerOutcome::Stopped,
        }
    }

    /// Ask the loop to exit. A running cycle finishes first.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    fn count_skip(&self, why: &str) {
        warn!("skipping cycle: {why}");
        self.status_tx.send_modify(|s| s.skipped += 1);
    }
}

// ─── Scheduler ────────────────────────────────────────────────────────────

pub struct Scheduler {
    runner: CycleRunner,
    interval: Duration,
}

impl Scheduler {
    pub fn new(runner: CycleRunner, interval: Duration) -> Self {
        Self { runner, interval }
    }

    /// Start the loop on the current runtime. The first cycle runs at once;
    /// later ones run `interval` after the previous cycle ended.
    pub fn spawn(self) -> (SchedulerHandle, JoinHandle<()>) {
        let status = SchedulerStatus {
            state: SchedulerState::Idle,
            mode: self.runner.mode(),
            interval_secs: self.interval.as_secs(),
            started_at: Utc::now(),
            cycles_run: 0,
            skipped: 0,
            next_run_at: Some(Utc::now()),
            last_cycle: None,
            last_error: None,
        };
        let (status_tx, status_rx) = watch::channel(status);
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = SchedulerHandle {
            status_tx: Arc::new(status_tx),
            status_rx,
            trigger_tx,
            stop_tx: Arc::new(stop_tx),
            busy: Arc::new(AtomicBool::new(false)),
        };
        let task = tokio::spawn(self.run(
            handle.status_tx.clone(),
            trigger_rx,
            stop_rx,
            handle.busy.clone(),
        ));
        (handle, task)
    }

    async fn run(
        self,
        status: Arc<watch::Sender<SchedulerStatus>>,
        mut trigger_rx: mpsc::Receiver<()>,
        mut stop_rx: watch::Receiver<bool>,
        busy: Arc<AtomicBool>,
    ) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            mode = %self.runner.mode(),
            interval_secs = self.interval.as_secs(),
            "scheduler started"
        );

        loop {
            let reason = tokio::select! {
                biased;
                _ = stop_rx.changed() => break,
                _ = ticker.tick() => "tick",
                Some(()) = trigger_rx.recv() => "manual",
            };
            if *stop_rx.borrow() {
                break;
            }

            busy.store(true, Ordering::SeqCst);
            status.send_modify(|s| {
                s.state = SchedulerState::Running;
                s.next_run_at = None;
            });
            info!(trigger = reason, "running cycle");

            let result = self.runner.run_once().await;

            let mut dropped = 0;
            while trigger_rx.try_recv().is_ok() {
                dropped += 1;
            }
            busy.store(false, Ordering::SeqCst);
            if dropped > 0 {
                warn!(dropped, "skipped triggers received during the cycle");
            }
            ticker.reset();

            let next = Utc::now()
                + chrono::Duration::from_std(self.interval).unwrap_or(chrono::Duration::zero());
            status.send_modify(|s| {
                s.state = SchedulerState::Idle;
                s.cycles_run += 1;
                s.skipped += dropped;
                s.next_run_at = Some(next);
                match result {
                    Ok(record) => {
                        s.last_error = match &record.outcome {
                            CycleOutcome::Failed { reason } => Some(reason.clone()),
                            CycleOutcome::Completed => None,
                        };
                        s.last_cycle = Some(record);
                    }
                    Err(e) => {
                        error!("cycle aborted: {e}");
                        s.last_error = Some(e.to_string());
                    }
                }
            });
        }

        status.send_modify(|s| {
            s.state = SchedulerState::Stopped;
            s.next_run_at = None;
        });
        info!("scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecisionError;
    use crate::source::ScriptedSource;
    use crate::test_support::seeded_layout;
    use dealer_core::config::Config;
    use tempfile::TempDir;

    const ANSWER: &str = r#"{"analysis_summary":"ok","price_adjustments":[
        {"vin":"VIN003","current_price":19000,"recommended_price":17500}]}"#;
    const WAIT: Duration = Duration::from_secs(10);

    fn scheduler(dir: &TempDir, source: Arc<ScriptedSource>, interval: Duration) -> Scheduler {
        let layout = seeded_layout(dir.path());
        let runner = CycleRunner::from_config(
            source,
            &Config::default(),
            layout,
            ExecutionMode::DryRun,
        );
        Scheduler::new(runner, interval)
    }

    async fn wait_for(
        handle: &SchedulerHandle,
        f: impl FnMut(&SchedulerStatus) -> bool,
    ) -> SchedulerStatus {
        let mut rx = handle.subscribe();
        let status = tokio::time::timeout(WAIT, rx.wait_for(f))
            .await
            .expect("timed out waiting for scheduler")
            .expect("scheduler dropped its status");
        status.clone()
    }

    #[tokio::test]
    async fn first_cycle_runs_immediately() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(ScriptedSource::always(ANSWER));
        let (handle, task) = scheduler(&dir, source.clone(), Duration::from_secs(3600)).spawn();

        let status = wait_for(&handle, |s| s.cycles_run == 1).await;
        assert_eq!(status.state, SchedulerState::Idle);
        assert_eq!(status.last_cycle.as_ref().unwrap().proposed, 1);
        assert!(status.next_run_at.is_some());

        handle.stop();
        tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
        assert_eq!(handle.status().state, SchedulerState::Stopped);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn trigger_during_a_cycle_is_skipped() {
        let dir = TempDir::new().unwrap();
        let source =
            Arc::new(ScriptedSource::always(ANSWER).with_delay(Duration::from_millis(300)));
        let (handle, task) = scheduler(&dir, source.clone(), Duration::from_secs(3600)).spawn();

        wait_for(&handle, |s| s.state == SchedulerState::Running).await;
        assert_eq!(handle.trigger(), TriggerOutcome::Skipped);
        assert_eq!(handle.trigger(), TriggerOutcome::Skipped);

        let status = wait_for(&handle, |s| s.cycles_run == 1).await;
        assert_eq!(status.skipped, 2);

        assert_eq!(handle.trigger(), TriggerOutcome::Accepted);
        wait_for(&handle, |s| s.cycles_run == 2).await;

        handle.stop();
        tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
        assert_eq!(source.calls(), 2);
        assert_eq!(source.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn short_interval_never_overlaps() {
        let dir = TempDir::new().unwrap();
        let source =
            Arc::new(ScriptedSource::always(ANSWER).with_delay(Duration::from_millis(50)));
        let (handle, task) = scheduler(&dir, source.clone(), Duration::from_millis(10)).spawn();

        wait_for(&handle, |s| s.cycles_run >= 3).await;
        handle.stop();
        tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
        assert_eq!(source.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn failed_cycle_does_not_stop_the_loop() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(ScriptedSource::new([
            Err(DecisionError::UpstreamUnavailable("connection refused".into())),
            Ok(ANSWER.to_string()),
        ]));
        let (handle, task) = scheduler(&dir, source.clone(), Duration::from_secs(3600)).spawn();

        let status = wait_for(&handle, |s| s.cycles_run == 1).await;
        assert_eq!(status.state, SchedulerState::Idle);
        assert!(status.last_cycle.as_ref().unwrap().is_failed());
        assert!(status.last_error.unwrap().contains("connection refused"));

        assert_eq!(handle.trigger(), TriggerOutcome::Accepted);
        let status = wait_for(&handle, |s| s.cycles_run == 2).await;
        assert_eq!(status.state, SchedulerState::Idle);
        assert!(status.last_error.is_none());

        handle.stop();
        tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn failed_cycle_waits_idle_for_the_next_tick() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(ScriptedSource::new([Err(DecisionError::UpstreamUnavailable(
            "timed out".into(),
        ))]));
        let (handle, task) = scheduler(&dir, source, Duration::from_secs(3600)).spawn();

        wait_for(&handle, |s| s.cycles_run == 1).await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        let status = handle.status();
        assert_eq!(status.state, SchedulerState::Idle);
        assert!(status.next_run_at.is_some());
        assert!(status.last_error.unwrap().contains("timed out"));

        handle.stop();
        tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn trigger_after_stop_reports_stopped() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(ScriptedSource::always(ANSWER));
        let (handle, task) = scheduler(&dir, source, Duration::from_secs(3600)).spawn();
        wait_for(&handle, |s| s.cycles_run == 1).await;
        handle.stop();
        tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
        assert_eq!(handle.trigger(), TriggerOutcome::Stopped);
    }
}
