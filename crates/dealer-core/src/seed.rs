//! Synthetic dealership data.
//!
//! Produces the four CSV tables and `summary.json` the rest of the system
//! reads. A fixed seed yields byte-identical output apart from timestamps,
//! which are anchored on the `now` passed in.

use crate::error::Result;
use crate::io::atomic_write;
use crate::paths::Layout;
use crate::store::write_csv;
use crate::types::{
    CompetitorListing, CustomerInquiry, CustomerType, InquiryStatus, SaleRecord, VehicleRecord,
};
use chrono::{DateTime, Datelike, Duration, Utc};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

struct MakeProfile {
    make: &'static str,
    models: &'static [&'static str],
    price_range: (u32, u32),
    popularity: f64,
}

const MAKES: &[MakeProfile] = &[
    MakeProfile {
        make: "Toyota",
        models: &["Camry", "Corolla", "RAV4", "Highlander", "Tacoma"],
        price_range: (25_000, 45_000),
        popularity: 0.85,
    },
    MakeProfile {
        make: "Honda",
        models: &["Accord", "Civic", "CR-V", "Pilot"],
        price_range: (24_000, 42_000),
        popularity: 0.80,
    },
    MakeProfile {
        make: "Ford",
        models: &["F-150", "Escape", "Explorer", "Mustang", "Bronco"],
        price_range: (28_000, 55_000),
        popularity: 0.75,
    },
    MakeProfile {
        make: "Chevrolet",
        models: &["Silverado", "Equinox", "Traverse", "Tahoe"],
        price_range: (27_000, 52_000),
        popularity: 0.70,
    },
    MakeProfile {
        make: "Tesla",
        models: &["Model 3", "Model Y", "Model S"],
        price_range: (42_000, 85_000),
        popularity: 0.90,
    },
    MakeProfile {
        make: "BMW",
        models: &["3 Series", "5 Series", "X3", "X5"],
        price_range: (45_000, 75_000),
        popularity: 0.65,
    },
    MakeProfile {
        make: "Mercedes-Benz",
        models: &["C-Class", "E-Class", "GLC", "GLE"],
        price_range: (48_000, 78_000),
        popularity: 0.60,
    },
];

const SALES_MAKES: &[&str] = &["Toyota", "Honda", "Ford", "Chevrolet", "Tesla"];
const COLORS: &[&str] = &["Black", "White", "Silver", "Gray", "Blue", "Red", "Green"];
const TRIMS: &[&str] = &["Base", "LE", "XLE", "Limited", "Sport", "Premium"];
const TRANSMISSIONS: &[&str] = &["Automatic", "Manual", "CVT"];
const FUELS: &[&str] = &["Gasoline", "Hybrid", "Electric", "Diesel"];
const COMPETITORS: &[&str] = &[
    "AutoNation",
    "CarMax",
    "Lithia Motors",
    "Penske Automotive",
    "Sonic Automotive",
    "Local Motors",
    "City Auto Group",
];
const FIRST_NAMES: &[&str] = &[
    "James", "Maria", "Robert", "Linda", "Michael", "Aisha", "David", "Sofia", "Daniel", "Priya",
    "Kevin", "Grace", "Luis", "Hannah", "Omar", "Emily",
];
const LAST_NAMES: &[&str] = &[
    "Smith", "Garcia", "Johnson", "Nguyen", "Brown", "Patel", "Miller", "Kim", "Davis", "Lopez",
    "Wilson", "Okafor", "Moore", "Chen",
];
const EMAIL_DOMAINS: &[&str] = &["example.com", "example.org", "example.net"];
const CONTACT: &[&str] = &["email", "phone", "text"];

/// Age buckets (inclusive day ranges) and their weights.
const AGE_BUCKETS: &[((u32, u32), u32)] = &[
    ((1, 30), 40),
    ((31, 60), 30),
    ((61, 90), 20),
    ((91, 150), 10),
];

const CUSTOMER_TYPES: &[(CustomerType, u32)] = &[
    (CustomerType::HotLead, 15),
    (CustomerType::WarmLead, 35),
    (CustomerType::ColdLead, 30),
    (CustomerType::PriceShopper, 20),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorOptions {
    pub vehicles: usize,
    pub inquiries: usize,
    pub sales: usize,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            vehicles: 50,
            inquiries: 25,
            sales: 150,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub inventory: Vec<VehicleRecord>,
    pub competitors: Vec<CompetitorListing>,
    pub inquiries: Vec<CustomerInquiry>,
    pub sales: Vec<SaleRecord>,
}

/// Contents of `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub generated_at: DateTime<Utc>,
    pub inventory_count: usize,
    pub competitor_listings: usize,
    pub customer_inquiries: usize,
    pub sales_history: usize,
    pub total_inventory_value: f64,
    pub avg_days_in_stock: f64,
    pub aged_inventory_count: usize,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn pick<'a, R: Rng>(rng: &mut R, items: &'a [&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

fn weighted<'a, T, R: Rng>(rng: &mut R, table: &'a [(T, u32)]) -> &'a T {
    match WeightedIndex::new(table.iter().map(|(_, w)| *w)) {
        Ok(dist) => &table[dist.sample(rng)].0,
        Err(_) => &table[0].0,
    }
}

fn vin<R: Rng>(rng: &mut R) -> String {
    let letters: String = (0..3)
        .map(|_| char::from(b'A' + rng.gen_range(0..26u8)))
        .collect();
    let digits: String = (0..8)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect();
    format!("{letters}{digits}")
}

fn generate_inventory<R: Rng>(rng: &mut R, n: usize, now: DateTime<Utc>) -> Vec<VehicleRecord> {
    let newest = u16::try_from(now.year()).unwrap_or(2024);
    (0..n)
        .map(|i| {
            let profile = &MAKES[rng.gen_range(0..MAKES.len())];
            let model = pick(rng, profile.models);
            let year = rng.gen_range(newest - 3..=newest);
            let age = u32::from(newest - year);
            let mileage = age * rng.gen_range(8_000..=15_000u32) + rng.gen_range(0..=5_000u32);

            let (lo_price, hi_price) = profile.price_range;
            let base_price = f64::from(rng.gen_range(lo_price..=hi_price));
            let depreciation = f64::from(age) * 0.10;
            let mileage_factor = f64::from(mileage) / 50_000.0 * 0.05;
            let cost = base_price * (1.0 - depreciation - mileage_factor);
            let current_price = cost * rng.gen_range(1.15..1.35);

            let (lo, hi) = *weighted(rng, AGE_BUCKETS);
            let days_in_inventory = rng.gen_range(lo..=hi);

            let condition = if year == newest {
                "New"
            } else {
                pick(rng, &["Used", "Certified Pre-Owned"])
            };

            VehicleRecord {
                vin: vin(rng),
                stock_number: format!("STK{}", 10_000 + i),
                make: profile.make.to_string(),
                model: model.to_string(),
                year,
                mileage,
                cost: round2(cost),
                current_price: round2(current_price),
                msrp: round2(base_price),
                days_in_inventory,
                color: pick(rng, COLORS).to_string(),
                condition: condition.to_string(),
                trim: pick(rng, TRIMS).to_string(),
                transmission: pick(rng, TRANSMISSIONS).to_string(),
                fuel_type: pick(rng, FUELS).to_string(),
                popularity_score: profile.popularity,
                last_price_change: now - Duration::days(rng.gen_range(1..=30)),
                view_count: rng.gen_range(5..=200),
                inquiry_count: rng.gen_range(0..=15),
            }
        })
        .collect()
}

fn generate_competitors<R: Rng>(
    rng: &mut R,
    inventory: &[VehicleRecord],
    now: DateTime<Utc>,
) -> Vec<CompetitorListing> {
    let mut out = Vec::new();
    for vehicle in inventory {
        for _ in 0..rng.gen_range(3..=7) {
            let mileage = (i64::from(vehicle.mileage) + rng.gen_range(-8_000..=8_000)).max(1_000);
            out.push(CompetitorListing {
                listing_id: format!("CMP{}", 40_000 + out.len()),
                make: vehicle.make.clone(),
                model: vehicle.model.clone(),
                year: vehicle.year,
                mileage: u32::try_from(mileage).unwrap_or(1_000),
                price: round2(vehicle.current_price * rng.gen_range(0.92..1.08)),
                dealer_name: pick(rng, COMPETITORS).to_string(),
                distance_miles: rng.gen_range(2..=45),
                listing_date: now - Duration::days(rng.gen_range(1..=60)),
                condition: vehicle.condition.clone(),
                trim: pick(rng, &TRIMS[..5]).to_string(),
            });
        }
    }
    out
}

fn inquiry_message<R: Rng>(rng: &mut R, kind: CustomerType, v: &VehicleRecord) -> String {
    let options = match kind {
        CustomerType::HotLead => [
            format!(
                "I'm very interested in the {} {} {}. Can I come see it today?",
                v.year, v.make, v.model
            ),
            format!(
                "Is the {} {} still available? I'd like to buy this week.",
                v.make, v.model
            ),
            "I've been looking for exactly this car! What's your best price?".to_string(),
        ],
        CustomerType::WarmLead => [
            format!(
                "Can you tell me more about the {} {} {}?",
                v.year, v.make, v.model
            ),
            "I'm interested in this vehicle. Does it have a clean title?".to_string(),
            format!("What financing options do you have for the {}?", v.model),
        ],
        CustomerType::ColdLead => [
            format!(
                "Just browsing. Is this {} {} negotiable on price?",
                v.make, v.model
            ),
            "I might be interested. Can you send me more photos?".to_string(),
            "How much would you take for this?".to_string(),
        ],
        CustomerType::PriceShopper => [
            format!(
                "I found this same car for ${:.0} elsewhere. Can you match?",
                v.current_price * 0.95
            ),
            "Your price seems high. What's your absolute lowest price?".to_string(),
            "I'm comparing prices. What discounts can you offer?".to_string(),
        ],
    };
    let idx = rng.gen_range(0..options.len());
    options[idx].clone()
}

fn generate_inquiries<R: Rng>(
    rng: &mut R,
    inventory: &[VehicleRecord],
    n: usize,
    now: DateTime<Utc>,
) -> Vec<CustomerInquiry> {
    if inventory.is_empty() {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let vehicle = &inventory[rng.gen_range(0..inventory.len())];
            let customer_type = *weighted(rng, CUSTOMER_TYPES);
            let first = pick(rng, FIRST_NAMES);
            let last = pick(rng, LAST_NAMES);
            let status = *[
                InquiryStatus::New,
                InquiryStatus::Pending,
                InquiryStatus::Responded,
            ]
            .choose(rng)
            .unwrap_or(&InquiryStatus::New);
            CustomerInquiry {
                inquiry_id: format!("INQ{}", 20_000 + i),
                vin: vehicle.vin.clone(),
                stock_number: vehicle.stock_number.clone(),
                customer_name: format!("{first} {last}"),
                customer_email: format!(
                    "{}.{}@{}",
                    first.to_lowercase(),
                    last.to_lowercase(),
                    pick(rng, EMAIL_DOMAINS)
                ),
                customer_phone: format!(
                    "{:03}-555-{:04}",
                    rng.gen_range(201..=989u32),
                    rng.gen_range(0..10_000u32)
                ),
                customer_type,
                message: inquiry_message(rng, customer_type, vehicle),
                timestamp: now - Duration::hours(rng.gen_range(1..=72)),
                status,
                preferred_contact: pick(rng, CONTACT).to_string(),
                budget_max: round2(vehicle.current_price * rng.gen_range(0.90..1.05)),
                trade_in: rng.gen_bool(0.5),
                financing_needed: rng.gen_bool(0.5),
            }
        })
        .collect()
}

fn generate_sales<R: Rng>(rng: &mut R, n: usize, now: DateTime<Utc>) -> Vec<SaleRecord> {
    let newest = u16::try_from(now.year()).unwrap_or(2024);
    (0..n)
        .map(|i| {
            let sale_date = now - Duration::days(rng.gen_range(1..=365));
            let base_price = f64::from(rng.gen_range(22_000..=60_000u32));
            let sold_price = base_price * rng.gen_range(0.85..0.98);
            SaleRecord {
                sale_id: format!("SALE{}", 30_000 + i),
                sale_date,
                make: pick(rng, SALES_MAKES).to_string(),
                year: rng.gen_range(newest - 5..=newest - 1),
                original_price: round2(base_price),
                sold_price: round2(sold_price),
                discount: round2(base_price - sold_price),
                days_to_sell: rng.gen_range(3..=120),
                season: u8::try_from(sale_date.month0() / 3).unwrap_or(0),
                gross_profit: round2(sold_price * rng.gen_range(0.08..0.18)),
                financing: rng.gen_bool(0.5),
                trade_in: rng.gen_bool(0.5),
            }
        })
        .collect()
}

/// Build a dataset in memory.
pub fn generate_dataset(seed: Option<u64>, opts: GeneratorOptions, now: DateTime<Utc>) -> Dataset {
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let inventory = generate_inventory(&mut rng, opts.vehicles, now);
    let competitors = generate_competitors(&mut rng, &inventory, now);
    let inquiries = generate_inquiries(&mut rng, &inventory, opts.inquiries, now);
    let sales = generate_sales(&mut rng, opts.sales, now);
    Dataset {
        inventory,
        competitors,
        inquiries,
        sales,
    }
}

impl Dataset {
    pub fn summary(&self, generated_at: DateTime<Utc>, aged_days: u32) -> GenerationSummary {
        let total: f64 = self.inventory.iter().map(|v| v.current_price).sum();
        let avg_days = if self.inventory.is_empty() {
            0.0
        } else {
            self.inventory
                .iter()
                .map(|v| f64::from(v.days_in_inventory))
                .sum::<f64>()
                / self.inventory.len() as f64
        };
        GenerationSummary {
            generated_at,
            inventory_count: self.inventory.len(),
            competitor_listings: self.competitors.len(),
            customer_inquiries: self.inquiries.len(),
            sales_history: self.sales.len(),
            total_inventory_value: round2(total),
            avg_days_in_stock: avg_days,
            aged_inventory_count: self
                .inventory
                .iter()
                .filter(|v| v.days_in_inventory > aged_days)
                .count(),
        }
    }

    /// Write every table plus `summary.json` into `layout.data_dir`,
    /// replacing existing files.
    pub fn write(&self, layout: &Layout, summary: &GenerationSummary) -> Result<()> {
        write_csv(&layout.inventory(), &self.inventory)?;
        write_csv(&layout.competitors(), &self.competitors)?;
        write_csv(&layout.inquiries(), &self.inquiries)?;
        write_csv(&layout.sales(), &self.sales)?;
        let json = serde_json::to_string_pretty(summary)?;
        atomic_write(&layout.summary(), json.as_bytes())
    }
}

/// Generate and write a full dataset. Returns the summary that was written.
pub fn generate(
    layout: &Layout,
    seed: Option<u64>,
    opts: GeneratorOptions,
    aged_days: u32,
) -> Result<GenerationSummary> {
    let now = Utc::now();
    let dataset = generate_dataset(seed, opts, now);
    let summary = dataset.summary(now, aged_days);
    dataset.write(layout, &summary)?;
    tracing::info!(
        vehicles = summary.inventory_count,
        listings = summary.competitor_listings,
        inquiries = summary.customer_inquiries,
        "generated dealership data"
    );
    Ok(summary)
}
