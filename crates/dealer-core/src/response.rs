//! Decoding of the reasoning service's answer into proposed actions.
//!
//! The service is asked for a single JSON object. Answers frequently arrive
//! wrapped in markdown fences or prose, so the outermost `{ ... }` is cut out
//! first. Every array element is decoded on its own: a bad element is
//! recorded as a [`MalformedEntry`] and the rest of the answer still counts.

use crate::action::{ActionPayload, EntityRef, ProposedAction};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PRICE_ADJUSTMENTS: &str = "price_adjustments";
pub const CUSTOMER_RESPONSES: &str = "customer_responses";
pub const SOCIAL_MEDIA_POSTS: &str = "social_media_posts";
pub const URGENT_ALERTS: &str = "urgent_alerts";

/// Part of the answer that could not be decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MalformedEntry {
    /// Section name, or `response` when the whole answer was unusable.
    pub section: String,
    pub index: Option<usize>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDecisions {
    pub analysis_summary: Option<String>,
    pub actions: Vec<ProposedAction>,
    pub malformed: Vec<MalformedEntry>,
}

/// Strip markdown fences and return the outermost `{ ... }` span, if any.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawPriceAdjustment {
    vin: String,
    stock_number: Option<String>,
    current_price: Option<f64>,
    recommended_price: f64,
    #[serde(default)]
    reason: String,
    confidence: Option<f64>,
    urgency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCustomerResponse {
    inquiry_id: String,
    customer_name: Option<String>,
    #[serde(default)]
    response_subject: String,
    response_body: String,
    offer_price: Option<f64>,
    strategy: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSocialPost {
    platform: String,
    content: String,
    vehicle_vin: Option<String>,
    #[serde(default)]
    hashtags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawAlert {
    #[serde(default = "default_priority")]
    priority: String,
    category: Option<String>,
    message: String,
    recommended_action: Option<String>,
    vin: Option<String>,
    inquiry_id: Option<String>,
}

fn default_priority() -> String {
    "medium".to_string()
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

impl From<RawPriceAdjustment> for ProposedAction {
    fn from(raw: RawPriceAdjustment) -> Self {
        ProposedAction::new(
            Some(EntityRef::Vehicle { vin: raw.vin }),
            ActionPayload::PriceAdjustment {
                stock_number: raw.stock_number,
                current_price: raw.current_price,
                recommended_price: raw.recommended_price,
                urgency: raw.urgency,
            },
            raw.reason,
            raw.confidence,
        )
    }
}

impl From<RawCustomerResponse> for ProposedAction {
    fn from(raw: RawCustomerResponse) -> Self {
        let rationale = raw.strategy.clone().unwrap_or_default();
        ProposedAction::new(
            Some(EntityRef::Inquiry {
                inquiry_id: raw.inquiry_id,
            }),
            ActionPayload::CustomerResponse {
                customer_name: raw.customer_name,
                subject: raw.response_subject,
                body: raw.response_body,
                offer_price: raw.offer_price,
                strategy: raw.strategy,
            },
            rationale,
            None,
        )
    }
}

impl From<RawSocialPost> for ProposedAction {
    fn from(raw: RawSocialPost) -> Self {
        ProposedAction::new(
            non_empty(raw.vehicle_vin).map(|vin| EntityRef::Vehicle { vin }),
            ActionPayload::ContentGeneration {
                platform: raw.platform,
                content: raw.content,
                hashtags: raw.hashtags,
            },
            "",
            None,
        )
    }
}

impl From<RawAlert> for ProposedAction {
    fn from(raw: RawAlert) -> Self {
        let target = match (non_empty(raw.vin), non_empty(raw.inquiry_id)) {
            (Some(vin), _) => Some(EntityRef::Vehicle { vin }),
            (None, Some(inquiry_id)) => Some(EntityRef::Inquiry { inquiry_id }),
            (None, None) => None,
        };
        let rationale = raw.recommended_action.clone().unwrap_or_default();
        ProposedAction::new(
            target,
            ActionPayload::Alert {
                priority: raw.priority,
                category: raw.category,
                message: raw.message,
                recommended_action: raw.recommended_action,
            },
            rationale,
            None,
        )
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn whole_response(reason: impl Into<String>) -> MalformedEntry {
    MalformedEntry {
        section: "response".to_string(),
        index: None,
        reason: reason.into(),
    }
}

fn decode_section<R>(root: &serde_json::Map<String, Value>, section: &str, out: &mut ParsedDecisions)
where
    R: DeserializeOwned + Into<ProposedAction>,
{
    let entries = match root.get(section) {
        None | Some(Value::Null) => return,
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            out.malformed.push(MalformedEntry {
                section: section.to_string(),
                index: None,
                reason: format!("expected an array, got {}", json_type(other)),
            });
            return;
        }
    };
    for (index, entry) in entries.iter().enumerate() {
        match R::deserialize(entry) {
            Ok(raw) => out.actions.push(raw.into()),
            Err(e) => out.malformed.push(MalformedEntry {
                section: section.to_string(),
                index: Some(index),
                reason: e.to_string(),
            }),
        }
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Decode the service's answer. Never fails: anything unusable ends up in
/// [`ParsedDecisions::malformed`].
///
/// Actions come out in section order (price adjustments, customer responses,
/// posts, alerts) and in element order within a section.
pub fn parse_decisions(text: &str) -> ParsedDecisions {
    let mut out = ParsedDecisions::default();

    let Some(json) = extract_json(text) else {
        out.malformed
            .push(whole_response("no JSON object found in response"));
        return out;
    };
    let root = match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            out.malformed.push(whole_response(format!(
                "expected a JSON object, got {}",
                json_type(&other)
            )));
            return out;
        }
        Err(e) => {
            out.malformed.push(whole_response(e.to_string()));
            return out;
        }
    };

    out.analysis_summary = root
        .get("analysis_summary")
        .and_then(Value::as_str)
        .map(str::to_string);

    decode_section::<RawPriceAdjustment>(&root, PRICE_ADJUSTMENTS, &mut out);
    decode_section::<RawCustomerResponse>(&root, CUSTOMER_RESPONSES, &mut out);
    decode_section::<RawSocialPost>(&root, SOCIAL_MEDIA_POSTS, &mut out);
    decode_section::<RawAlert>(&root, URGENT_ALERTS, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;

    const FULL: &str = r##"Here you go:
```json
{
  "analysis_summary": "Two aged units need attention.",
  "price_adjustments": [
    {"vin": "VIN001", "stock_number": "STK1001", "current_price": 11000,
     "recommended_price": 10500, "reason": "75 days in stock", "confidence": 0.85, "urgency": "high"}
  ],
  "customer_responses": [
    {"inquiry_id": "INQ1", "customer_name": "Dana", "response_subject": "Your Camry",
     "response_body": "Hi Dana, it is available.", "offer_price": null, "strategy": "fast reply"}
  ],
  "social_media_posts": [
    {"platform": "facebook", "content": "Weekend deal", "vehicle_vin": "VIN001", "hashtags": ["#deal"]}
  ],
  "urgent_alerts": [
    {"priority": "high", "category": "inventory", "message": "Aged stock rising"}
  ]
}
```"##;

    #[test]
    fn extract_json_cuts_outermost_object() {
        assert_eq!(extract_json("noise {\"a\":{\"b\":1}} tail"), Some("{\"a\":{\"b\":1}}"));
        assert_eq!(extract_json("no braces here"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[test]
    fn parses_every_section_in_order() {
        let parsed = parse_decisions(FULL);
        assert!(parsed.malformed.is_empty(), "{:?}", parsed.malformed);
        assert_eq!(
            parsed.analysis_summary.as_deref(),
            Some("Two aged units need attention.")
        );
        let kinds: Vec<ActionKind> = parsed.actions.iter().map(|a| a.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                ActionKind::PriceAdjustment,
                ActionKind::CustomerResponse,
                ActionKind::ContentGeneration,
                ActionKind::Alert,
            ]
        );
        assert_eq!(
            parsed.actions[0].target(),
            Some(&EntityRef::Vehicle {
                vin: "VIN001".into()
            })
        );
        assert_eq!(parsed.actions[0].confidence(), Some(0.85));
        assert!(parsed.actions[3].target().is_none());
        match parsed.actions[2].proposal() {
            ActionPayload::ContentGeneration { hashtags, .. } => {
                assert_eq!(hashtags, &vec!["#deal".to_string()])
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bad_entries_are_dropped_individually() {
        let text = r#"{
            "price_adjustments": [
                {"vin": "VIN001", "recommended_price": "cheap"},
                {"vin": "VIN002", "recommended_price": 24000}
            ],
            "customer_responses": "none"
        }"#;
        let parsed = parse_decisions(text);
        assert_eq!(parsed.actions.len(), 1);
        assert_eq!(parsed.malformed.len(), 2);
        assert_eq!(parsed.malformed[0].section, PRICE_ADJUSTMENTS);
        assert_eq!(parsed.malformed[0].index, Some(0));
        assert_eq!(parsed.malformed[1].section, CUSTOMER_RESPONSES);
        assert_eq!(parsed.malformed[1].index, None);
    }

    #[test]
    fn unparsable_response_yields_no_actions_and_one_malformed_entry() {
        for text in ["I cannot help with that.", "{ not json at all }", "[1, 2]"] {
            let parsed = parse_decisions(text);
            assert!(parsed.actions.is_empty(), "{text}");
            assert_eq!(parsed.malformed.len(), 1, "{text}");
            assert_eq!(parsed.malformed[0].section, "response");
        }
    }

    #[test]
    fn missing_sections_are_fine() {
        let parsed = parse_decisions(r#"{"analysis_summary": "quiet day"}"#);
        assert!(parsed.actions.is_empty());
        assert!(parsed.malformed.is_empty());
    }
}
