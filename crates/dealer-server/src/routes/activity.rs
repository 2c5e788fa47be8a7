use axum::extract::{Query, State};
use axum::Json;
use dealer_core::action_log::{ActionLogEntry, CycleRecord};
use dealer_core::dashboard::{activity_feed, ActivityItem};

use crate::error::AppError;
use crate::routes::{blocking, LimitQuery};
use crate::state::AppState;

const FEED_LEN: usize = 20;

/// GET /api/live-activity: most recent actions as one-line feed items.
pub async fn live_activity(
    State(app): State<AppState>,
) -> Result<Json<Vec<ActivityItem>>, AppError> {
    let log = app.log.clone();
    let entries = blocking(move || log.recent(FEED_LEN)).await?;
    Ok(Json(activity_feed(&entries)))
}

/// GET /api/actions?limit=N: raw action log entries, newest first.
pub async fn list_actions(
    State(app): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<Vec<ActionLogEntry>>, AppError> {
    let limit = q.resolve(50)?;
    let log = app.log.clone();
    Ok(Json(blocking(move || log.recent(limit)).await?))
}

/// GET /api/cycles?limit=N: cycle records, newest first.
pub async fn list_cycles(
    State(app): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<Vec<CycleRecord>>, AppError> {
    let limit = q.resolve(20)?;
    let log = app.log.clone();
    Ok(Json(blocking(move || log.recent_cycles(limit)).await?))
}
