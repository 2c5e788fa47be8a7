//! On-demand listing copy for a single vehicle.

use chrono::{DateTime, Utc};
use dealer_core::prompt::build_description_prompt;
use dealer_core::types::VehicleRecord;
use serde::Serialize;
use tracing::info;

use crate::error::DecisionError;
use crate::source::{DecisionSource, DescriptionRequest};

#[derive(Debug, Clone, Serialize)]
pub struct VehicleDescription {
    pub vin: String,
    pub description: String,
    pub generated_at: DateTime<Utc>,
}

/// Ask `source` for a description of `vehicle`. Nothing is persisted.
///
/// An answer that is empty after trimming counts as unavailable.
pub async fn describe_vehicle(
    source: &dyn DecisionSource,
    vehicle: &VehicleRecord,
    dealer_name: &str,
) -> Result<VehicleDescription, DecisionError> {
    let request = DescriptionRequest {
        prompt: build_description_prompt(vehicle, dealer_name),
        vehicle: vehicle.clone(),
        dealer_name: dealer_name.to_string(),
    };
    let text = source.describe(&request).await?;
    let description = text.trim();
    if description.is_empty() {
        return Err(DecisionError::UpstreamUnavailable(
            "reasoning service returned an empty description".into(),
        ));
    }
    info!(vin = %vehicle.vin, source = source.name(), "generated vehicle description");
    Ok(VehicleDescription {
        vin: vehicle.vin.clone(),
        description: description.to_string(),
        generated_at: Utc::now(),
    })
}
