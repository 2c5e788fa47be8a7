use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use dealer_agent::{
    CycleRunner, DecisionError, RuleBasedSource, Scheduler, SchedulerHandle, SchedulerState,
    ScriptedSource,
};
use dealer_core::config::Config;
use dealer_core::executor::ExecutionMode;
use dealer_core::seed::{generate, GeneratorOptions};
use dealer_server::{build_router, AppState};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Generate a seeded dealership inside the temp directory.
fn init_dealership(dir: &TempDir) {
    let layout = Config::default().layout(dir.path());
    generate(&layout, Some(42), GeneratorOptions::default(), 60).unwrap();
}

fn state(dir: &TempDir) -> AppState {
    AppState::new(dir.path().to_path_buf())
}

/// Send a request via `oneshot` and return (status, parsed JSON body).
async fn send(app: axum::Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, "GET", uri).await
}

async fn post(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, "POST", uri).await
}

async fn run_dry_cycle(dir: &TempDir) -> usize {
    let config = Config::default();
    let runner = CycleRunner::from_config(
        Arc::new(RuleBasedSource::new()),
        &config,
        config.layout(dir.path()),
        ExecutionMode::DryRun,
    );
    runner.run_once().await.unwrap().proposed
}

fn scheduler_with_delay(dir: &TempDir, delay: Duration) -> SchedulerHandle {
    let config = Config::default();
    let source = ScriptedSource::always(r#"{"analysis_summary":"quiet day"}"#).with_delay(delay);
    let runner = CycleRunner::from_config(
        Arc::new(source),
        &config,
        config.layout(dir.path()),
        ExecutionMode::DryRun,
    );
    let (handle, _task) = Scheduler::new(runner, Duration::from_secs(3600)).spawn();
    handle
}

async fn wait_until(handle: &SchedulerHandle, f: impl FnMut(&dealer_agent::SchedulerStatus) -> bool) {
    let mut rx = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(10), rx.wait_for(f))
        .await
        .expect("timed out")
        .expect("scheduler gone");
}

// ---------------------------------------------------------------------------
// Store projections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn kpis_reflect_generated_inventory() {
    let dir = TempDir::new().unwrap();
    init_dealership(&dir);

    let (status, json) = get(build_router(state(&dir)), "/api/kpis").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_inventory"], 50);
    assert!(json["total_value"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn inventory_is_sorted_by_age() {
    let dir = TempDir::new().unwrap();
    init_dealership(&dir);

    let (status, json) = get(build_router(state(&dir)), "/api/inventory").await;
    assert_eq!(status, StatusCode::OK);
    let days: Vec<u64> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["days_in_inventory"].as_u64().unwrap())
        .collect();
    assert_eq!(days.len(), 50);
    assert!(days.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn inventory_analysis_has_four_buckets() {
    let dir = TempDir::new().unwrap();
    init_dealership(&dir);

    let (status, json) = get(build_router(state(&dir)), "/api/inventory-analysis").await;
    assert_eq!(status, StatusCode::OK);
    let buckets = json.as_array().unwrap();
    assert_eq!(buckets.len(), 4);
    let total: u64 = buckets.iter().map(|b| b["count"].as_u64().unwrap()).sum();
    assert_eq!(total, 50);
}

#[tokio::test]
async fn top_opportunities_are_capped_at_ten() {
    let dir = TempDir::new().unwrap();
    init_dealership(&dir);

    let (status, json) = get(build_router(state(&dir)), "/api/top-opportunities").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json.as_array().unwrap().len() <= 10);
}

#[tokio::test]
async fn customer_inquiries_are_open_only() {
    let dir = TempDir::new().unwrap();
    init_dealership(&dir);

    let (status, json) = get(
        build_router(state(&dir)),
        "/api/customer-inquiries?limit=5",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let items = json.as_array().unwrap();
    assert!(items.len() <= 5);
    assert!(items.iter().all(|i| i["status"] == "new"));
}

#[tokio::test]
async fn price_position_lists_every_vehicle() {
    let dir = TempDir::new().unwrap();
    init_dealership(&dir);

    let (status, json) = get(build_router(state(&dir)), "/api/price-position").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 50);
}

#[tokio::test]
async fn uninitialized_store_is_503() {
    let dir = TempDir::new().unwrap();
    let (status, json) = get(build_router(state(&dir)), "/api/kpis").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(json["error"].as_str().unwrap().contains("dealer generate"));
}

#[tokio::test]
async fn zero_limit_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (status, _) = get(build_router(state(&dir)), "/api/actions?limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Action log views
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_log_yields_empty_lists() {
    let dir = TempDir::new().unwrap();
    let app = build_router(state(&dir));
    let (status, json) = get(app.clone(), "/api/actions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!([]));

    let (_, json) = get(app.clone(), "/api/live-activity").await;
    assert_eq!(json, serde_json::json!([]));

    let (_, json) = get(app, "/api/agent-status").await;
    assert_eq!(json["status"], "detached");
    assert_eq!(json["total_actions"], 0);
    assert!(json["last_cycle"].is_null());
}

#[tokio::test]
async fn cycle_results_show_up_in_feeds() {
    let dir = TempDir::new().unwrap();
    init_dealership(&dir);
    let proposed = run_dry_cycle(&dir).await;
    assert!(proposed > 0);

    let app = build_router(state(&dir));
    let (status, json) = get(app.clone(), "/api/actions?limit=500").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), proposed);
    assert_eq!(json[0]["mode"], "dry_run");

    let (_, json) = get(app.clone(), "/api/live-activity").await;
    let first = &json[0];
    assert!(first["type"].is_string());
    assert!(first["description"].is_string());

    let (_, json) = get(app.clone(), "/api/cycles").await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["outcome"]["status"], "completed");

    let (_, json) = get(app, "/api/agent-status").await;
    assert_eq!(json["total_actions"], proposed);
    assert_eq!(json["total_cycles"], 1);
}

// ---------------------------------------------------------------------------
// Manual trigger
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_agent_without_scheduler_is_503() {
    let dir = TempDir::new().unwrap();
    let (status, json) = post(build_router(state(&dir)), "/api/run-agent").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn run_agent_during_cycle_is_409_then_202() {
    let dir = TempDir::new().unwrap();
    init_dealership(&dir);
    let handle = scheduler_with_delay(&dir, Duration::from_millis(400));
    let app = build_router(state(&dir).with_scheduler(handle.clone()));

    wait_until(&handle, |s| s.state == SchedulerState::Running).await;
    let (status, _) = post(app.clone(), "/api/run-agent").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, json) = get(app.clone(), "/api/agent-status").await;
    assert_eq!(json["status"], "running");

    wait_until(&handle, |s| s.cycles_run == 1).await;
    let (status, json) = post(app.clone(), "/api/run-agent").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["status"], "accepted");

    wait_until(&handle, |s| s.cycles_run == 2).await;
    assert_eq!(handle.status().skipped, 1);
    handle.stop();
}

// ---------------------------------------------------------------------------
// Vehicle descriptions
// ---------------------------------------------------------------------------

async fn first_vin(dir: &TempDir) -> String {
    let (_, json) = get(build_router(state(dir)), "/api/inventory").await;
    json[0]["vin"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn description_is_generated_for_a_known_vin() {
    let dir = TempDir::new().unwrap();
    init_dealership(&dir);
    let vin = first_vin(&dir).await;
    let app = build_router(state(&dir).with_source(Arc::new(RuleBasedSource::new())));

    let (status, json) = get(app, &format!("/api/generate-description/{vin}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["vin"], vin.as_str());
    assert!(json["description"]
        .as_str()
        .unwrap()
        .contains("Premium Auto Sales"));
    assert!(json["generated_at"].is_string());
}

#[tokio::test]
async fn description_for_unknown_vin_is_404() {
    let dir = TempDir::new().unwrap();
    init_dealership(&dir);
    let app = build_router(state(&dir).with_source(Arc::new(RuleBasedSource::new())));
    let (status, json) = get(app, "/api/generate-description/NOPE123").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("NOPE123"));
}

#[tokio::test]
async fn description_without_a_source_is_503() {
    let dir = TempDir::new().unwrap();
    init_dealership(&dir);
    let vin = first_vin(&dir).await;
    let (status, _) = get(
        build_router(state(&dir)),
        &format!("/api/generate-description/{vin}"),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn description_upstream_failure_is_502() {
    let dir = TempDir::new().unwrap();
    init_dealership(&dir);
    let vin = first_vin(&dir).await;
    let source = ScriptedSource::new([Err(DecisionError::UpstreamUnavailable(
        "timed out".into(),
    ))]);
    let app = build_router(state(&dir).with_source(Arc::new(source)));
    let (status, json) = get(app, &format!("/api/generate-description/{vin}")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(json["error"].as_str().unwrap().contains("timed out"));
}

// ---------------------------------------------------------------------------
// Config and static shell
// ---------------------------------------------------------------------------

#[tokio::test]
async fn config_endpoint_returns_effective_config() {
    let dir = TempDir::new().unwrap();
    let (status, json) = get(build_router(state(&dir)), "/api/config").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["config"]["schedule"]["demo_interval_secs"], 300);
}

#[tokio::test]
async fn root_serves_the_page_shell() {
    let dir = TempDir::new().unwrap();
    let req = axum::http::Request::builder()
        .uri("/")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = build_router(state(&dir)).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&body).contains("/api/events"));
}

#[tokio::test]
async fn unknown_api_path_is_404() {
    let dir = TempDir::new().unwrap();
    let (status, _) = get(build_router(state(&dir)), "/api/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
