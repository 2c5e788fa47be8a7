//! Read-only projections over the state store.

use axum::extract::{Path, Query, State};
use axum::Json;
use dealer_agent::{describe_vehicle, VehicleDescription};
use dealer_core::dashboard::{
    age_distribution, kpis, new_inquiries, price_position, top_opportunities, AgeBucket, Kpis,
    Opportunity, PricePosition, TOP_OPPORTUNITIES,
};
use dealer_core::types::{CustomerInquiry, VehicleRecord};
use dealer_core::DealerError;

use crate::error::AppError;
use crate::routes::{blocking, load_snapshot, LimitQuery};
use crate::state::AppState;

/// GET /api/kpis
pub async fn get_kpis(State(app): State<AppState>) -> Result<Json<Kpis>, AppError> {
    let cfg_app = app.clone();
    let aged_days = blocking(move || cfg_app.config().map(|c| c.prompt.aged_days)).await?;
    let snapshot = load_snapshot(&app).await?;
    Ok(Json(kpis(&snapshot, aged_days)))
}

/// GET /api/inventory: all vehicles, longest in stock first.
pub async fn list_inventory(
    State(app): State<AppState>,
) -> Result<Json<Vec<VehicleRecord>>, AppError> {
    let mut vehicles = load_snapshot(&app).await?.inventory;
    vehicles.sort_by(|a, b| b.days_in_inventory.cmp(&a.days_in_inventory));
    Ok(Json(vehicles))
}

/// GET /api/customer-inquiries?limit=N: inquiries still awaiting a reply.
pub async fn list_inquiries(
    State(app): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<Vec<CustomerInquiry>>, AppError> {
    let limit = q.resolve(20)?;
    let snapshot = load_snapshot(&app).await?;
    Ok(Json(new_inquiries(&snapshot, limit)))
}

/// GET /api/inventory-analysis: vehicle counts per age bucket.
pub async fn inventory_analysis(
    State(app): State<AppState>,
) -> Result<Json<Vec<AgeBucket>>, AppError> {
    let snapshot = load_snapshot(&app).await?;
    Ok(Json(age_distribution(&snapshot)))
}

/// GET /api/price-position
pub async fn get_price_position(
    State(app): State<AppState>,
) -> Result<Json<Vec<PricePosition>>, AppError> {
    let snapshot = load_snapshot(&app).await?;
    Ok(Json(price_position(&snapshot)))
}

/// GET /api/top-opportunities
pub async fn get_top_opportunities(
    State(app): State<AppState>,
) -> Result<Json<Vec<Opportunity>>, AppError> {
    let snapshot = load_snapshot(&app).await?;
    Ok(Json(top_opportunities(&snapshot, TOP_OPPORTUNITIES)))
}

/// GET /api/generate-description/{vin}: fresh listing copy from the
/// reasoning service. Not stored.
pub async fn generate_description(
    State(app): State<AppState>,
    Path(vin): Path<String>,
) -> Result<Json<VehicleDescription>, AppError> {
    let snapshot = load_snapshot(&app).await?;
    let vehicle = snapshot
        .vehicle(&vin)
        .cloned()
        .ok_or(DealerError::VehicleNotFound(vin))?;
    let Some(source) = app.source.clone() else {
        return Err(AppError::unavailable("no reasoning service is configured"));
    };
    let cfg_app = app.clone();
    let dealer_name = blocking(move || cfg_app.config().map(|c| c.dealer.name)).await?;
    let description = describe_vehicle(source.as_ref(), &vehicle, &dealer_name).await?;
    Ok(Json(description))
}
