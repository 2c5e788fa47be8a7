pub mod embed;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all API routes and middleware.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Events (SSE)
        .route("/api/events", get(routes::events::sse_events))
        // Agent
        .route("/api/agent-status", get(routes::agent::agent_status))
        .route("/api/run-agent", post(routes::agent::run_agent))
        // Action log
        .route("/api/live-activity", get(routes::activity::live_activity))
        .route("/api/actions", get(routes::activity::list_actions))
        .route("/api/cycles", get(routes::activity::list_cycles))
        // Store projections
        .route("/api/kpis", get(routes::inventory::get_kpis))
        .route("/api/inventory", get(routes::inventory::list_inventory))
        .route(
            "/api/customer-inquiries",
            get(routes::inventory::list_inquiries),
        )
        .route(
            "/api/inventory-analysis",
            get(routes::inventory::inventory_analysis),
        )
        .route(
            "/api/price-position",
            get(routes::inventory::get_price_position),
        )
        .route(
            "/api/top-opportunities",
            get(routes::inventory::get_top_opportunities),
        )
        .route(
            "/api/generate-description/{vin}",
            get(routes::inventory::generate_description),
        )
        // Config
        .route("/api/config", get(routes::config::get_config))
        .fallback(embed::static_handler)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Serve the dashboard on a pre-bound listener until the process exits.
///
/// Accepting a bound listener lets the caller read the actual port first
/// (useful with port 0).
pub async fn serve_on(
    app_state: AppState,
    listener: tokio::net::TcpListener,
    open_browser: bool,
) -> anyhow::Result<()> {
    let port = listener.local_addr()?.port();
    let app = build_router(app_state);

    tracing::info!("dashboard listening on http://localhost:{port}");

    if open_browser {
        let url = format!("http://localhost:{port}");
        let _ = open::that(&url);
    }

    axum::serve(listener, app).await?;
    Ok(())
}

/// Bind `0.0.0.0:port` and serve.
pub async fn serve(app_state: AppState, port: u16, open_browser: bool) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    serve_on(app_state, listener, open_browser).await
}
