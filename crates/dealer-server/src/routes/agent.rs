use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use dealer_agent::{SchedulerStatus, TriggerOutcome};
use dealer_core::action_log::CycleRecord;
use serde::Serialize;

use crate::error::AppError;
use crate::routes::blocking;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AgentStatus {
    /// `idle`, `running`, `failed` or `stopped` for an in-process
    /// scheduler; `detached` when the loop runs elsewhere (or not at all).
    pub status: String,
    pub scheduler: Option<SchedulerStatus>,
    /// Last cycle from the log, which also covers cycles run by the CLI.
    pub last_cycle: Option<CycleRecord>,
    pub total_actions: usize,
    pub total_cycles: usize,
}

/// GET /api/agent-status
pub async fn agent_status(State(app): State<AppState>) -> Result<Json<AgentStatus>, AppError> {
    let log = app.log.clone();
    let (total_actions, cycles) =
        blocking(move || Ok((log.entries()?.len(), log.cycles()?))).await?;

    let scheduler = app.scheduler.as_ref().map(|h| h.status());
    let status = scheduler
        .as_ref()
        .map_or("detached", |s| s.state.as_str())
        .to_string();
    Ok(Json(AgentStatus {
        status,
        scheduler,
        total_cycles: cycles.len(),
        last_cycle: cycles.into_iter().last(),
        total_actions,
    }))
}

/// POST /api/run-agent: request a cycle from the in-process scheduler.
///
/// 202 when queued, 409 when a cycle is already running (the request is
/// dropped, not queued), 503 when no scheduler is attached.
pub async fn run_agent(
    State(app): State<AppState>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let Some(handle) = app.scheduler.as_ref() else {
        return Err(AppError::unavailable(
            "no scheduler attached; start the loop with `dealer run --port`",
        ));
    };
    match handle.trigger() {
        TriggerOutcome::Accepted => Ok((
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "status": "accepted" })),
        )),
        TriggerOutcome::Skipped => Err(AppError::conflict(
            "a cycle is already running; trigger skipped",
        )),
        TriggerOutcome::Stopped => Err(AppError::unavailable("scheduler is stopped")),
    }
}
