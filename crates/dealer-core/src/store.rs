//! CSV-backed state store.
//!
//! The store owns the inventory, competitor and inquiry tables for the
//! duration of a cycle. Reads go through [`Snapshot`]; the only mutations are
//! [`StateStore::set_price`] and [`StateStore::mark_responded`], both of which
//! rewrite the affected CSV atomically before returning.

use crate::error::{DealerError, Result};
use crate::paths::Layout;
use crate::types::{CompetitorListing, CustomerInquiry, InquiryStatus, VehicleClass, VehicleRecord};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Read-only view of the tables the decision engine works from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub inventory: Vec<VehicleRecord>,
    pub competitors: Vec<CompetitorListing>,
    pub inquiries: Vec<CustomerInquiry>,
}

/// Aggregate of observed competitor prices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBand {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

impl PriceBand {
    fn from_prices(prices: &[f64]) -> Option<Self> {
        if prices.is_empty() {
            return None;
        }
        let sum: f64 = prices.iter().sum();
        let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
        let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            mean: sum / prices.len() as f64,
            min,
            max,
            count: prices.len(),
        })
    }
}

impl Snapshot {
    pub fn vehicle(&self, vin: &str) -> Option<&VehicleRecord> {
        self.inventory.iter().find(|v| v.vin == vin)
    }

    pub fn inquiry(&self, inquiry_id: &str) -> Option<&CustomerInquiry> {
        self.inquiries.iter().find(|i| i.inquiry_id == inquiry_id)
    }

    /// Inquiries with status `new`, in file order.
    pub fn open_inquiries(&self) -> impl Iterator<Item = &CustomerInquiry> {
        self.inquiries.iter().filter(|i| i.is_open())
    }

    /// Vehicles older than `days`, oldest first.
    pub fn aged_vehicles(&self, days: u32) -> Vec<&VehicleRecord> {
        let mut aged: Vec<&VehicleRecord> = self
            .inventory
            .iter()
            .filter(|v| v.days_in_inventory > days)
            .collect();
        aged.sort_by(|a, b| b.days_in_inventory.cmp(&a.days_in_inventory));
        aged
    }

    pub fn total_value(&self) -> f64 {
        self.inventory.iter().map(|v| v.current_price).sum()
    }

    pub fn average_days(&self) -> f64 {
        if self.inventory.is_empty() {
            return 0.0;
        }
        let total: u64 = self
            .inventory
            .iter()
            .map(|v| u64::from(v.days_in_inventory))
            .sum();
        total as f64 / self.inventory.len() as f64
    }

    /// Competitor price bands grouped by make and model.
    pub fn market_by_model(&self) -> BTreeMap<(String, String), PriceBand> {
        let mut grouped: BTreeMap<(String, String), Vec<f64>> = BTreeMap::new();
        for c in &self.competitors {
            grouped
                .entry((c.make.clone(), c.model.clone()))
                .or_default()
                .push(c.price);
        }
        grouped
            .into_iter()
            .filter_map(|(k, prices)| PriceBand::from_prices(&prices).map(|b| (k, b)))
            .collect()
    }

    /// Competitor price bands grouped by make, model and year.
    pub fn market_by_class(&self) -> BTreeMap<VehicleClass, PriceBand> {
        let mut grouped: BTreeMap<VehicleClass, Vec<f64>> = BTreeMap::new();
        for c in &self.competitors {
            grouped.entry(c.class()).or_default().push(c.price);
        }
        grouped
            .into_iter()
            .filter_map(|(k, prices)| PriceBand::from_prices(&prices).map(|b| (k, b)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// StateStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct StoreFiles {
    inventory: PathBuf,
    competitors: PathBuf,
    inquiries: PathBuf,
}

/// The state store: a [`Snapshot`] plus, when file-backed, the CSV paths it
/// persists mutations to.
#[derive(Debug, Clone)]
pub struct StateStore {
    files: Option<StoreFiles>,
    snapshot: Snapshot,
}

impl StateStore {
    /// Load the store from the CSV files in `layout.data_dir`.
    ///
    /// The inventory file is required; missing competitor or inquiry files
    /// load as empty tables.
    pub fn open(layout: &Layout) -> Result<Self> {
        let files = StoreFiles {
            inventory: layout.inventory(),
            competitors: layout.competitors(),
            inquiries: layout.inquiries(),
        };
        if !files.inventory.exists() {
            return Err(DealerError::NotInitialized(
                layout.data_dir.display().to_string(),
            ));
        }
        let snapshot = Snapshot {
            inventory: read_csv(&files.inventory)?,
            competitors: read_csv_or_empty(&files.competitors)?,
            inquiries: read_csv_or_empty(&files.inquiries)?,
        };
        Ok(Self {
            files: Some(files),
            snapshot,
        })
    }

    /// A store that lives only in memory. Mutations are never written anywhere.
    pub fn in_memory(snapshot: Snapshot) -> Self {
        Self {
            files: None,
            snapshot,
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn into_snapshot(self) -> Snapshot {
        self.snapshot
    }

    /// Set a vehicle's price and persist the inventory table.
    ///
    /// Returns the previous price. If the write fails the in-memory price is
    /// restored and the error is returned.
    pub fn set_price(&mut self, vin: &str, price: f64, at: DateTime<Utc>) -> Result<f64> {
        let vehicle = self
            .snapshot
            .inventory
            .iter_mut()
            .find(|v| v.vin == vin)
            .ok_or_else(|| DealerError::VehicleNotFound(vin.to_string()))?;
        let previous = (vehicle.current_price, vehicle.last_price_change);
        vehicle.current_price = price;
        vehicle.last_price_change = at;

        if let Err(e) = self.persist_inventory() {
            if let Some(v) = self.snapshot.inventory.iter_mut().find(|v| v.vin == vin) {
                v.current_price = previous.0;
                v.last_price_change = previous.1;
            }
            return Err(e);
        }
        Ok(previous.0)
    }

    /// Mark an inquiry as responded and persist the inquiry table.
    pub fn mark_responded(&mut self, inquiry_id: &str) -> Result<()> {
        let inquiry = self
            .snapshot
            .inquiries
            .iter_mut()
            .find(|i| i.inquiry_id == inquiry_id)
            .ok_or_else(|| DealerError::InquiryNotFound(inquiry_id.to_string()))?;
        let previous = inquiry.status;
        inquiry.status = InquiryStatus::Responded;

        if let Err(e) = self.persist_inquiries() {
            if let Some(i) = self
                .snapshot
                .inquiries
                .iter_mut()
                .find(|i| i.inquiry_id == inquiry_id)
            {
                i.status = previous;
            }
            return Err(e);
        }
        Ok(())
    }

    fn persist_inventory(&self) -> Result<()> {
        match &self.files {
            Some(files) => write_csv(&files.inventory, &self.snapshot.inventory),
            None => Ok(()),
        }
    }

    fn persist_inquiries(&self) -> Result<()> {
        match &self.files {
            Some(files) => write_csv(&files.inquiries, &self.snapshot.inquiries),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// CSV helpers
// ---------------------------------------------------------------------------

pub fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let csv_err = |source: csv::Error| DealerError::Csv {
        path: path.display().to_string(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()
        .map_err(csv_err)
}

pub fn read_csv_or_empty<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    read_csv(path)
}

/// Serialize `rows` as CSV (header from the first row) and write atomically.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let fail = |e: std::io::Error| DealerError::persistence(path, e);
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| fail(std::io::Error::other(e.to_string())))?;
    }
    let data = writer.into_inner().map_err(|e| fail(e.into_error()))?;
    crate::io::atomic_write(path, &data)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
