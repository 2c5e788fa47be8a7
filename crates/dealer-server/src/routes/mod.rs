pub mod activity;
pub mod agent;
pub mod config;
pub mod events;
pub mod inventory;

use dealer_core::store::{Snapshot, StateStore};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

/// Run blocking store or log IO off the async workers.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> dealer_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(f)
        .await
        .map_err(AppError::join)?;
    Ok(result?)
}

pub(crate) async fn load_snapshot(app: &AppState) -> Result<Snapshot, AppError> {
    let layout = app.layout.clone();
    blocking(move || StateStore::open(&layout).map(StateStore::into_snapshot)).await
}

pub const MAX_LIMIT: usize = 500;

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

impl LimitQuery {
    pub(crate) fn resolve(&self, default: usize) -> Result<usize, AppError> {
        match self.limit {
            None => Ok(default),
            Some(0) => Err(AppError::bad_request("limit must be at least 1")),
            Some(n) => Ok(n.min(MAX_LIMIT)),
        }
    }
}
