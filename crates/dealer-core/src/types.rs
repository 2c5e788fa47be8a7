//! Tabular records held by the state store.
//!
//! Column names match the CSV headers the data generator writes, so every
//! struct here round-trips through `csv` + `serde` without renames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// VehicleClass
// ---------------------------------------------------------------------------

/// The make/model/year triple competitor listings are matched on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VehicleClass {
    pub make: String,
    pub model: String,
    pub year: u16,
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.year, self.make, self.model)
    }
}

// ---------------------------------------------------------------------------
// VehicleRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub vin: String,
    pub stock_number: String,
    pub make: String,
    pub model: String,
    pub year: u16,
    pub mileage: u32,
    /// Cost basis.
    pub cost: f64,
    pub current_price: f64,
    pub msrp: f64,
    pub days_in_inventory: u32,
    pub color: String,
    pub condition: String,
    pub trim: String,
    pub transmission: String,
    pub fuel_type: String,
    /// Demand signal for the make, 0..1.
    pub popularity_score: f64,
    pub last_price_change: DateTime<Utc>,
    pub view_count: u32,
    pub inquiry_count: u32,
}

impl VehicleRecord {
    pub fn class(&self) -> VehicleClass {
        VehicleClass {
            make: self.make.clone(),
            model: self.model.clone(),
            year: self.year,
        }
    }

    /// Current margin over cost as a fraction.
    pub fn margin(&self) -> f64 {
        if self.cost <= 0.0 {
            return 0.0;
        }
        (self.current_price - self.cost) / self.cost
    }

    pub fn label(&self) -> String {
        format!("{} {} {}", self.year, self.make, self.model)
    }
}

// ---------------------------------------------------------------------------
// CompetitorListing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorListing {
    pub listing_id: String,
    pub make: String,
    pub model: String,
    pub year: u16,
    pub mileage: u32,
    pub price: f64,
    pub dealer_name: String,
    pub distance_miles: u32,
    pub listing_date: DateTime<Utc>,
    pub condition: String,
    pub trim: String,
}

impl CompetitorListing {
    pub fn class(&self) -> VehicleClass {
        VehicleClass {
            make: self.make.clone(),
            model: self.model.clone(),
            year: self.year,
        }
    }
}

// ---------------------------------------------------------------------------
// CustomerInquiry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerType {
    HotLead,
    WarmLead,
    ColdLead,
    PriceShopper,
}

impl CustomerType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HotLead => "hot_lead",
            Self::WarmLead => "warm_lead",
            Self::ColdLead => "cold_lead",
            Self::PriceShopper => "price_shopper",
        }
    }
}

impl fmt::Display for CustomerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InquiryStatus {
    New,
    Pending,
    Responded,
}

impl fmt::Display for InquiryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::New => "new",
            Self::Pending => "pending",
            Self::Responded => "responded",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerInquiry {
    pub inquiry_id: String,
    /// Referenced vehicle.
    pub vin: String,
    pub stock_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub customer_type: CustomerType,
    pub message: String,
    /// When the inquiry was received.
    pub timestamp: DateTime<Utc>,
    pub status: InquiryStatus,
    pub preferred_contact: String,
    pub budget_max: f64,
    pub trade_in: bool,
    pub financing_needed: bool,
}

impl CustomerInquiry {
    pub fn is_responded(&self) -> bool {
        self.status == InquiryStatus::Responded
    }

    pub fn is_open(&self) -> bool {
        self.status == InquiryStatus::New
    }
}

// ---------------------------------------------------------------------------
// SaleRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub sale_id: String,
    pub sale_date: DateTime<Utc>,
    pub make: String,
    pub year: u16,
    pub original_price: f64,
    pub sold_price: f64,
    pub discount: f64,
    pub days_to_sell: u32,
    /// Calendar quarter, 0 = Q1.
    pub season: u8,
    pub gross_profit: f64,
    pub financing: bool,
    pub trade_in: bool,
}
