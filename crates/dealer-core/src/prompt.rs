use crate::config::{Bounds, PromptConfig};
use crate::store::Snapshot;
use crate::types::VehicleRecord;
use serde::Serialize;
use std::fmt::Write;

#[derive(Serialize)]
struct AgedRow<'a> {
    vin: &'a str,
    stock_number: &'a str,
    year: u16,
    make: &'a str,
    model: &'a str,
    current_price: f64,
    cost: f64,
    days_in_inventory: u32,
}

#[derive(Serialize)]
struct InquiryRow<'a> {
    inquiry_id: &'a str,
    customer_name: &'a str,
    customer_type: &'a str,
    message: &'a str,
    stock_number: &'a str,
    vin: &'a str,
}

#[derive(Serialize)]
struct MarketRow<'a> {
    make: &'a str,
    model: &'a str,
    mean: f64,
    min: f64,
    max: f64,
    listings: usize,
}

const RESPONSE_SCHEMA: &str = r##"{
  "analysis_summary": "2-3 sentence summary of current situation",
  "price_adjustments": [
    {
      "vin": "EXACT vin from above",
      "stock_number": "EXACT stock_number from above",
      "current_price": 0.0,
      "recommended_price": 0.0,
      "reason": "brief explanation",
      "confidence": 0.85,
      "urgency": "high | medium | low"
    }
  ],
  "customer_responses": [
    {
      "inquiry_id": "EXACT inquiry_id from above",
      "customer_name": "name from data",
      "response_subject": "subject line",
      "response_body": "email content",
      "offer_price": null,
      "strategy": "approach explanation"
    }
  ],
  "social_media_posts": [
    {
      "platform": "facebook | instagram | twitter",
      "content": "post text",
      "vehicle_vin": "EXACT vin from above",
      "hashtags": ["#tag"]
    }
  ],
  "urgent_alerts": [
    {
      "priority": "high | medium | low",
      "category": "inventory | pricing | customer",
      "message": "what needs attention",
      "recommended_action": "what a human should do"
    }
  ]
}"##;

fn pretty<T: Serialize>(rows: &T) -> String {
    serde_json::to_string_pretty(rows).unwrap_or_else(|_| "[]".to_string())
}

/// Render the decision prompt for one cycle.
///
/// Only the oldest `max_vehicles` aged vehicles and the first `max_inquiries`
/// open inquiries are listed, so the prompt stays bounded on large stores.
pub fn build_prompt(
    snapshot: &Snapshot,
    dealer_name: &str,
    bounds: &Bounds,
    prompt: &PromptConfig,
) -> String {
    let aged = snapshot.aged_vehicles(prompt.aged_days);
    let fresh = snapshot
        .inventory
        .iter()
        .filter(|v| v.days_in_inventory < prompt.fresh_days)
        .count();

    let aged_rows: Vec<AgedRow<'_>> = aged
        .iter()
        .take(prompt.max_vehicles)
        .map(|v| AgedRow {
            vin: &v.vin,
            stock_number: &v.stock_number,
            year: v.year,
            make: &v.make,
            model: &v.model,
            current_price: v.current_price,
            cost: v.cost,
            days_in_inventory: v.days_in_inventory,
        })
        .collect();

    let inquiry_rows: Vec<InquiryRow<'_>> = snapshot
        .open_inquiries()
        .take(prompt.max_inquiries)
        .map(|i| InquiryRow {
            inquiry_id: &i.inquiry_id,
            customer_name: &i.customer_name,
            customer_type: i.customer_type.as_str(),
            message: &i.message,
            stock_number: &i.stock_number,
            vin: &i.vin,
        })
        .collect();

    let market = snapshot.market_by_model();
    let market_rows: Vec<MarketRow<'_>> = market
        .iter()
        .map(|((make, model), band)| MarketRow {
            make,
            model,
            mean: (band.mean * 100.0).round() / 100.0,
            min: band.min,
            max: band.max,
            listings: band.count,
        })
        .collect();

    let min_margin_pct = bounds.min_margin * 100.0;
    let max_adjust_pct = bounds.max_adjustment * 100.0;

    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(
        out,
        "You are an autonomous agent managing a car dealership called {dealer_name}."
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "INVENTORY OVERVIEW:");
    let _ = writeln!(out, "- Total vehicles: {}", snapshot.inventory.len());
    let _ = writeln!(
        out,
        "- Aged inventory ({}+ days): {}",
        prompt.aged_days,
        aged.len()
    );
    let _ = writeln!(
        out,
        "- Fresh inventory (< {} days): {fresh}",
        prompt.fresh_days
    );
    let _ = writeln!(out, "- Total value: ${:.2}", snapshot.total_value());
    let _ = writeln!(
        out,
        "- Average days in stock: {:.1}",
        snapshot.average_days()
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "TOP AGED VEHICLES (use these EXACT vins and stock numbers):");
    let _ = writeln!(out, "{}", pretty(&aged_rows));
    let _ = writeln!(out);
    let _ = writeln!(out, "COMPETITOR PRICES BY MAKE AND MODEL:");
    let _ = writeln!(out, "{}", pretty(&market_rows));
    let _ = writeln!(out);
    let _ = writeln!(out, "NEW CUSTOMER INQUIRIES (use these EXACT inquiry_ids):");
    let _ = writeln!(out, "{}", pretty(&inquiry_rows));
    let _ = writeln!(out);
    let _ = writeln!(out, "RULES:");
    let _ = writeln!(
        out,
        "1. Use only the exact vins, stock numbers and inquiry_ids listed above. Never invent ids."
    );
    let _ = writeln!(
        out,
        "2. Every recommended price must keep at least a {min_margin_pct:.1}% margin over cost."
    );
    let _ = writeln!(
        out,
        "3. No single price change may exceed {max_adjust_pct:.1}% of the current price."
    );
    let _ = writeln!(
        out,
        "4. Always state current_price exactly as listed above."
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "DECISION FRAMEWORK:");
    let _ = writeln!(
        out,
        "- Vehicles over {} days: recommend a 5-10% reduction if the margin allows.",
        prompt.aged_days
    );
    let _ = writeln!(out, "- Hot leads: draft an immediate response.");
    let _ = writeln!(out, "- Price shoppers: justify the value before discounting.");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Respond with ONLY this JSON structure (no markdown, no explanations):"
    );
    let _ = writeln!(out, "{RESPONSE_SCHEMA}");
    out
}

/// Render the listing-copy prompt for one vehicle.
pub fn build_description_prompt(vehicle: &VehicleRecord, dealer_name: &str) -> String {
    let trim = if vehicle.trim.trim().is_empty() {
        "Standard"
    } else {
        vehicle.trim.as_str()
    };
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Write a compelling 150-word vehicle description for the {dealer_name} listing."
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "VEHICLE DETAILS:");
    let _ = writeln!(out, "- Year: {}", vehicle.year);
    let _ = writeln!(out, "- Make: {}", vehicle.make);
    let _ = writeln!(out, "- Model: {}", vehicle.model);
    let _ = writeln!(out, "- Trim: {trim}");
    let _ = writeln!(out, "- Mileage: {} miles", group_thousands(vehicle.mileage));
    let _ = writeln!(out, "- Color: {}", vehicle.color);
    let _ = writeln!(out, "- Condition: {}", vehicle.condition);
    let _ = writeln!(out, "- Price: ${:.2}", vehicle.current_price);
    let _ = writeln!(out);
    let _ = writeln!(out, "WRITING STYLE:");
    let _ = writeln!(out, "- Enthusiastic but professional");
    let _ = writeln!(out, "- Highlight value and key features");
    let _ = writeln!(out, "- Create an emotional connection");
    let _ = writeln!(out, "- End with a call to action");
    let _ = writeln!(out);
    let _ = write!(out, "Write ONLY the description, no preamble.");
    out
}

/// `31000` becomes `31,000`.
pub fn group_thousands(n: u32) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
