//! Read-only projections behind the dashboard endpoints.

use crate::action_log::ActionLogEntry;
use crate::store::Snapshot;
use crate::types::{CustomerInquiry, CustomerType};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use uuid::Uuid;

const AGE_BUCKETS: [(&str, u32, u32); 4] = [
    ("0-30 days", 0, 30),
    ("31-60 days", 31, 60),
    ("61-90 days", 61, 90),
    ("90+ days", 91, u32::MAX),
];

pub const TOP_OPPORTUNITIES: usize = 10;

// ---------------------------------------------------------------------------
// KPIs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    pub total_inventory: usize,
    pub total_value: f64,
    pub avg_days: f64,
    pub aged_inventory: usize,
    pub new_inquiries: usize,
    pub hot_leads: usize,
}

pub fn kpis(snapshot: &Snapshot, aged_days: u32) -> Kpis {
    Kpis {
        total_inventory: snapshot.inventory.len(),
        total_value: (snapshot.total_value() * 100.0).round() / 100.0,
        avg_days: (snapshot.average_days() * 10.0).round() / 10.0,
        aged_inventory: snapshot
            .inventory
            .iter()
            .filter(|v| v.days_in_inventory > aged_days)
            .count(),
        new_inquiries: snapshot.open_inquiries().count(),
        hot_leads: snapshot
            .inquiries
            .iter()
            .filter(|i| i.customer_type == CustomerType::HotLead)
            .count(),
    }
}

// ---------------------------------------------------------------------------
// Age distribution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeBucket {
    pub label: &'static str,
    pub count: usize,
}

pub fn age_distribution(snapshot: &Snapshot) -> Vec<AgeBucket> {
    AGE_BUCKETS
        .iter()
        .map(|&(label, lo, hi)| AgeBucket {
            label,
            count: snapshot
                .inventory
                .iter()
                .filter(|v| (lo..=hi).contains(&v.days_in_inventory))
                .count(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Market position
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePosition {
    pub vin: String,
    pub stock_number: String,
    pub label: String,
    pub days_in_inventory: u32,
    pub current_price: f64,
    /// Mean competitor price for the same make, model and year.
    pub market_avg: Option<f64>,
    /// Percent above (positive) or below the market average.
    pub price_diff_pct: Option<f64>,
}

pub fn price_position(snapshot: &Snapshot) -> Vec<PricePosition> {
    let market = snapshot.market_by_class();
    snapshot
        .inventory
        .iter()
        .map(|v| {
            let avg = market.get(&v.class()).map(|b| b.mean);
            PricePosition {
                vin: v.vin.clone(),
                stock_number: v.stock_number.clone(),
                label: v.label(),
                days_in_inventory: v.days_in_inventory,
                current_price: v.current_price,
                market_avg: avg,
                price_diff_pct: avg
                    .filter(|a| *a > 0.0)
                    .map(|a| (v.current_price - a) / a * 100.0),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opportunity {
    pub vin: String,
    pub stock_number: String,
    pub year: u16,
    pub make: String,
    pub model: String,
    pub current_price: f64,
    pub comp_avg_price: f64,
    pub days_in_inventory: u32,
    pub opportunity_score: f64,
}

/// Vehicles that are both aged and priced above market, best first.
///
/// Score is `days / 10 + price_vs_market * 100`. Vehicles without competitor
/// data are left out.
pub fn top_opportunities(snapshot: &Snapshot, limit: usize) -> Vec<Opportunity> {
    let market = snapshot.market_by_class();
    let mut scored: Vec<Opportunity> = snapshot
        .inventory
        .iter()
        .filter_map(|v| {
            let avg = market.get(&v.class())?.mean;
            if avg <= 0.0 {
                return None;
            }
            let vs_market = (v.current_price - avg) / avg;
            Some(Opportunity {
                vin: v.vin.clone(),
                stock_number: v.stock_number.clone(),
                year: v.year,
                make: v.make.clone(),
                model: v.model.clone(),
                current_price: v.current_price,
                comp_avg_price: avg,
                days_in_inventory: v.days_in_inventory,
                opportunity_score: f64::from(v.days_in_inventory) / 10.0 + vs_market * 100.0,
            })
        })
        .collect();
    scored.sort_by(|a, b| {
        b.opportunity_score
            .partial_cmp(&a.opportunity_score)
            .unwrap_or(Ordering::Equal)
    });
    scored.truncate(limit);
    scored
}

// ---------------------------------------------------------------------------
// Inquiries / activity
// ---------------------------------------------------------------------------

/// First `limit` inquiries still marked `new`.
pub fn new_inquiries(snapshot: &Snapshot, limit: usize) -> Vec<CustomerInquiry> {
    snapshot.open_inquiries().take(limit).cloned().collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityItem {
    pub id: Uuid,
    pub cycle_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub status: &'static str,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<String>,
}

/// Feed items for `entries`, which are expected newest first.
pub fn activity_feed(entries: &[ActionLogEntry]) -> Vec<ActivityItem> {
    entries
        .iter()
        .map(|e| ActivityItem {
            id: e.id,
            cycle_id: e.cycle_id,
            timestamp: e.timestamp,
            kind: e.action.kind().as_str(),
            status: e.status(),
            description: e.action.describe(),
            rejection: e.rejection_message.clone(),
        })
        .collect()
}
