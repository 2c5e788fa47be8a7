//! Fixtures shared by the unit tests in this crate.

use std::path::Path;

use chrono::{TimeZone, Utc};
use dealer_core::config::{Bounds, PathsConfig, PromptConfig};
use dealer_core::paths::Layout;
use dealer_core::prompt::build_prompt;
use dealer_core::store::{write_csv, Snapshot};
use dealer_core::types::{
    CompetitorListing, CustomerInquiry, CustomerType, InquiryStatus, VehicleRecord,
};

use crate::source::DecisionRequest;

pub(crate) const DEALER: &str = "Premium Auto Sales";

fn vehicle(vin: &str, cost: f64, price: f64, days: u32) -> VehicleRecord {
    VehicleRecord {
        vin: vin.to_string(),
        stock_number: format!("STK-{vin}"),
        make: "Toyota".into(),
        model: "Camry".into(),
        year: 2022,
        mileage: 31_000,
        cost,
        current_price: price,
        msrp: price * 1.1,
        days_in_inventory: days,
        color: "Silver".into(),
        condition: "Used".into(),
        trim: "SE".into(),
        transmission: "Automatic".into(),
        fuel_type: "Gasoline".into(),
        popularity_score: 0.8,
        last_price_change: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        view_count: 52,
        inquiry_count: 4,
    }
}

fn inquiry(
    id: &str,
    vin: &str,
    kind: CustomerType,
    status: InquiryStatus,
) -> CustomerInquiry {
    CustomerInquiry {
        inquiry_id: id.to_string(),
        vin: vin.to_string(),
        stock_number: format!("STK-{vin}"),
        customer_name: "Marcus Chen".into(),
        customer_email: "marcus@example.com".into(),
        customer_phone: "555-0142".into(),
        customer_type: kind,
        message: "What's your best price?".into(),
        timestamp: Utc.with_ymd_and_hms(2024, 5, 3, 10, 15, 0).unwrap(),
        status,
        preferred_contact: "email".into(),
        budget_max: 18_000.0,
        trade_in: false,
        financing_needed: false,
    }
}

fn competitor(id: &str, price: f64) -> CompetitorListing {
    CompetitorListing {
        listing_id: id.to_string(),
        make: "Toyota".into(),
        model: "Camry".into(),
        year: 2022,
        mileage: 28_000,
        price,
        dealer_name: "AutoNation".into(),
        distance_miles: 8,
        listing_date: Utc.with_ymd_and_hms(2024, 4, 28, 8, 0, 0).unwrap(),
        condition: "Used".into(),
        trim: "LE".into(),
    }
}

/// Three vehicles (two aged), two competitor listings, two open inquiries
/// and one already answered.
pub(crate) fn sample_snapshot() -> Snapshot {
    Snapshot {
        inventory: vec![
            vehicle("VIN001", 10_000.0, 11_000.0, 75),
            vehicle("VIN002", 20_000.0, 25_000.0, 12),
            vehicle("VIN003", 15_000.0, 19_000.0, 120),
        ],
        competitors: vec![competitor("CMP1", 10_500.0), competitor("CMP2", 11_500.0)],
        inquiries: vec![
            inquiry("INQ1", "VIN001", CustomerType::HotLead, InquiryStatus::New),
            inquiry("INQ2", "VIN002", CustomerType::WarmLead, InquiryStatus::Responded),
            inquiry("INQ3", "VIN003", CustomerType::PriceShopper, InquiryStatus::New),
        ],
    }
}

pub(crate) fn request_for(snapshot: Snapshot) -> DecisionRequest {
    let bounds = Bounds::default();
    let prompt = PromptConfig::default();
    DecisionRequest {
        prompt: build_prompt(&snapshot, DEALER, &bounds, &prompt),
        snapshot,
        bounds,
        dealer_name: DEALER.to_string(),
        aged_days: prompt.aged_days,
    }
}

/// Write [`sample_snapshot`] as CSV under `root` and return its layout.
pub(crate) fn seeded_layout(root: &Path) -> Layout {
    let layout = Layout::new(root, &PathsConfig::default());
    let snapshot = sample_snapshot();
    write_csv(&layout.inventory(), &snapshot.inventory).unwrap();
    write_csv(&layout.competitors(), &snapshot.competitors).unwrap();
    write_csv(&layout.inquiries(), &snapshot.inquiries).unwrap();
    layout
}
