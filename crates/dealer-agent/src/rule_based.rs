//! Offline decision source.
//!
//! Applies the same decision framework the prompt describes (reprice aged
//! stock within bounds, answer hot leads and price shoppers first, flag a
//! heavy aged share) and answers in the service's JSON schema, so the rest of
//! the pipeline cannot tell it apart from a hosted model.

use async_trait::async_trait;
use dealer_core::prompt::group_thousands;
use dealer_core::store::Snapshot;
use dealer_core::types::{CustomerInquiry, CustomerType, VehicleRecord};
use serde_json::{json, Value};

use crate::error::DecisionError;
use crate::source::{DecisionRequest, DecisionSource, DescriptionRequest};

const MAX_PRICE_ADJUSTMENTS: usize = 5;
const MAX_RESPONSES: usize = 3;
/// Share of aged vehicles above which an alert is raised.
const AGED_ALERT_SHARE: f64 = 0.25;

#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBasedSource;

impl RuleBasedSource {
    pub fn new() -> Self {
        Self
    }
}

fn round_to_dollars(v: f64) -> f64 {
    v.round()
}

/// Cut applied to an aged vehicle: deeper for older stock, capped by the
/// maximum adjustment, never under the margin floor.
fn proposed_price(v: &VehicleRecord, request: &DecisionRequest) -> Option<f64> {
    let bounds = &request.bounds;
    let cut: f64 = if v.days_in_inventory > 90 { 0.08 } else { 0.05 };
    let cut = cut.min(bounds.max_adjustment);
    let mut price = round_to_dollars(v.current_price * (1.0 - cut));
    if bounds.enforce_min_margin {
        let floor = bounds.floor_price(v.cost).ceil();
        price = price.max(floor);
    }
    (price < v.current_price - 0.5).then_some(price)
}

fn price_adjustments(request: &DecisionRequest) -> Vec<Value> {
    request
        .snapshot
        .aged_vehicles(request.aged_days)
        .into_iter()
        .filter_map(|v| proposed_price(v, request).map(|p| (v, p)))
        .take(MAX_PRICE_ADJUSTMENTS)
        .map(|(v, price)| {
            let urgency = if v.days_in_inventory > 90 { "high" } else { "medium" };
            json!({
                "vin": v.vin,
                "stock_number": v.stock_number,
                "current_price": v.current_price,
                "recommended_price": price,
                "reason": format!(
                    "{} days in stock; reduce to move the unit while keeping margin",
                    v.days_in_inventory
                ),
                "confidence": 0.7,
                "urgency": urgency,
            })
        })
        .collect()
}

fn response_priority(t: CustomerType) -> u8 {
    match t {
        CustomerType::HotLead => 0,
        CustomerType::PriceShopper => 1,
        CustomerType::WarmLead => 2,
        CustomerType::ColdLead => 3,
    }
}

fn draft_reply(inquiry: &CustomerInquiry, snapshot: &Snapshot, dealer: &str) -> Value {
    let vehicle = snapshot.vehicle(&inquiry.vin);
    let label = vehicle
        .map(|v| v.label())
        .unwrap_or_else(|| "vehicle".to_string());
    let first_name = inquiry
        .customer_name
        .split_whitespace()
        .next()
        .unwrap_or("there");
    let (subject, pitch, strategy) = match inquiry.customer_type {
        CustomerType::HotLead => (
            format!("Your {label} is ready to see"),
            "It is still available and we can have it ready for a test drive today.".to_string(),
            "fast reply to a ready buyer; book a visit",
        ),
        CustomerType::PriceShopper => (
            format!("Pricing on the {label}"),
            "Our price already sits close to the local market and includes a full inspection. \
             Happy to walk through the numbers with you."
                .to_string(),
            "justify value before discussing any discount",
        ),
        CustomerType::WarmLead => (
            format!("More about the {label}"),
            "Here are the details you asked about. Financing options are available.".to_string(),
            "answer questions and offer financing",
        ),
        CustomerType::ColdLead => (
            format!("The {label} at {dealer}"),
            "Thanks for looking. Let us know if you would like more photos or a walkaround video."
                .to_string(),
            "low-pressure follow-up",
        ),
    };
    json!({
        "inquiry_id": inquiry.inquiry_id,
        "customer_name": inquiry.customer_name,
        "response_subject": subject,
        "response_body": format!("Hi {first_name},\n\n{pitch}\n\nBest regards,\n{dealer}"),
        "offer_price": Value::Null,
        "strategy": strategy,
    })
}

fn customer_responses(request: &DecisionRequest) -> Vec<Value> {
    let mut open: Vec<&CustomerInquiry> = request.snapshot.open_inquiries().collect();
    open.sort_by_key(|i| response_priority(i.customer_type));
    open.into_iter()
        .take(MAX_RESPONSES)
        .map(|i| draft_reply(i, &request.snapshot, &request.dealer_name))
        .collect()
}

fn social_posts(request: &DecisionRequest) -> Vec<Value> {
    let Some(v) = request.snapshot.aged_vehicles(request.aged_days).into_iter().next() else {
        return Vec::new();
    };
    vec![json!({
        "platform": "facebook",
        "content": format!(
            "Just reduced: {} {} with {} miles. Come see it at {} this weekend.",
            v.label(),
            v.trim,
            v.mileage,
            request.dealer_name
        ),
        "vehicle_vin": v.vin,
        "hashtags": [format!("#{}", v.make.replace(['-', ' '], "")), "#deal".to_string()],
    })]
}

fn urgent_alerts(request: &DecisionRequest) -> Vec<Value> {
    let total = request.snapshot.inventory.len();
    let aged = request.snapshot.aged_vehicles(request.aged_days).len();
    if total == 0 || (aged as f64) / (total as f64) <= AGED_ALERT_SHARE {
        return Vec::new();
    }
    vec![json!({
        "priority": "high",
        "category": "inventory",
        "message": format!(
            "{aged} of {total} vehicles are older than {} days",
            request.aged_days
        ),
        "recommended_action": "Review aged units with the sales manager",
    })]
}

/// Build the full answer for `request`.
pub fn decide(request: &DecisionRequest) -> Value {
    let total = request.snapshot.inventory.len();
    let aged = request.snapshot.aged_vehicles(request.aged_days).len();
    let open = request.snapshot.open_inquiries().count();
    json!({
        "analysis_summary": format!(
            "{total} vehicles in stock, {aged} older than {} days. {open} new customer inquiries waiting.",
            request.aged_days
        ),
        "price_adjustments": price_adjustments(request),
        "customer_responses": customer_responses(request),
        "social_media_posts": social_posts(request),
        "urgent_alerts": urgent_alerts(request),
    })
}

/// Templated listing copy built from the vehicle's own fields.
pub fn describe(vehicle: &VehicleRecord, dealer: &str) -> String {
    let trim = if vehicle.trim.trim().is_empty() {
        String::new()
    } else {
        format!(" {}", vehicle.trim)
    };
    let opener = if vehicle.mileage < 30_000 {
        "Barely broken in"
    } else if vehicle.mileage < 60_000 {
        "Well cared for"
    } else {
        "Proven and dependable"
    };
    format!(
        "{opener}, this {}{trim} in {} has {} miles and a {} transmission. \
         It is offered in {} condition and runs on {}. \
         At ${:.0} it is priced to move, so come see it at {dealer} today.",
        vehicle.label(),
        vehicle.color.to_lowercase(),
        group_thousands(vehicle.mileage),
        vehicle.transmission.to_lowercase(),
        vehicle.condition.to_lowercase(),
        vehicle.fuel_type.to_lowercase(),
        vehicle.current_price,
    )
}

#[async_trait]
impl DecisionSource for RuleBasedSource {
    fn name(&self) -> &str {
        "rule_based"
    }

    async fn decide(&self, request: &DecisionRequest) -> Result<String, DecisionError> {
        Ok(decide(request).to_string())
    }

    async fn describe(&self, request: &DescriptionRequest) -> Result<String, DecisionError> {
        Ok(describe(&request.vehicle, &request.dealer_name))
    }
}
