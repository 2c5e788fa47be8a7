use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use dealer_agent::{DecisionSource, SchedulerHandle};
use dealer_core::action_log::ActionLog;
use dealer_core::config::Config;
use dealer_core::paths::Layout;
use tokio::sync::broadcast;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub layout: Layout,
    pub log: ActionLog,
    pub event_tx: broadcast::Sender<()>,
    /// Present when the loop runs in this process; enables manual triggers.
    pub scheduler: Option<SchedulerHandle>,
    /// Reasoning service for on-demand listing copy.
    pub source: Option<Arc<dyn DecisionSource>>,
}

impl AppState {
    pub fn new(root: PathBuf) -> Self {
        let config = match Config::load(&root) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("could not read dealer.yaml, using defaults: {e}");
                Config::default()
            }
        };
        Self::with_config(root, &config)
    }

    pub fn with_config(root: PathBuf, config: &Config) -> Self {
        let layout = config.layout(&root);
        let log = ActionLog::open(&layout);
        let (tx, _) = broadcast::channel(64);
        let state = Self {
            root,
            layout,
            log,
            event_tx: tx.clone(),
            scheduler: None,
            source: None,
        };

        // Poll the log files' mtimes so cycles run by another process (the
        // CLI) reach SSE subscribers too. Only inside a runtime.
        if tokio::runtime::Handle::try_current().is_ok() {
            let files = [
                state.log.actions_path().to_path_buf(),
                state.log.cycles_path().to_path_buf(),
            ];
            tokio::spawn(async move {
                let mut last = [None::<SystemTime>; 2];
                loop {
                    tokio::time::sleep(Duration::from_millis(800)).await;
                    let mut changed = false;
                    for (file, seen) in files.iter().zip(last.iter_mut()) {
                        let Ok(meta) = tokio::fs::metadata(file).await else {
                            continue;
                        };
                        if let Ok(mtime) = meta.modified() {
                            if *seen != Some(mtime) {
                                *seen = Some(mtime);
                                changed = true;
                            }
                        }
                    }
                    if changed {
                        let _ = tx.send(());
                    }
                }
            });
        }

        state
    }

    /// Attach an in-process scheduler. Its status changes are forwarded to
    /// SSE subscribers.
    pub fn with_scheduler(mut self, handle: SchedulerHandle) -> Self {
        let mut rx = handle.subscribe();
        let tx = self.event_tx.clone();
        if tokio::runtime::Handle::try_current().is_ok() {
            tokio::spawn(async move {
                while rx.changed().await.is_ok() {
                    let _ = tx.send(());
                }
            });
        }
        self.scheduler = Some(handle);
        self
    }

    pub fn with_source(mut self, source: Arc<dyn DecisionSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Fresh config for handlers that report it; env overrides applied.
    pub fn config(&self) -> dealer_core::Result<Config> {
        let mut config = Config::load(&self.root)?;
        config.apply_env();
        Ok(config)
    }
}
