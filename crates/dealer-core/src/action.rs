use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    PriceAdjustment,
    CustomerResponse,
    ContentGeneration,
    Alert,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PriceAdjustment => "price_adjustment",
            Self::CustomerResponse => "customer_response",
            Self::ContentGeneration => "content_generation",
            Self::Alert => "alert",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EntityRef
// ---------------------------------------------------------------------------

/// The store entity an action refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityRef {
    Vehicle { vin: String },
    Inquiry { inquiry_id: String },
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vehicle { vin } => write!(f, "vehicle {vin}"),
            Self::Inquiry { inquiry_id } => write!(f, "inquiry {inquiry_id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// ActionPayload
// ---------------------------------------------------------------------------

/// Kind-specific proposed value or content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionPayload {
    PriceAdjustment {
        stock_number: Option<String>,
        /// The price the proposal was computed against, when stated.
        current_price: Option<f64>,
        recommended_price: f64,
        urgency: Option<String>,
    },
    CustomerResponse {
        customer_name: Option<String>,
        subject: String,
        body: String,
        offer_price: Option<f64>,
        strategy: Option<String>,
    },
    ContentGeneration {
        platform: String,
        content: String,
        #[serde(default)]
        hashtags: Vec<String>,
    },
    Alert {
        priority: String,
        category: Option<String>,
        message: String,
        recommended_action: Option<String>,
    },
}

impl ActionPayload {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::PriceAdjustment { .. } => ActionKind::PriceAdjustment,
            Self::CustomerResponse { .. } => ActionKind::CustomerResponse,
            Self::ContentGeneration { .. } => ActionKind::ContentGeneration,
            Self::Alert { .. } => ActionKind::Alert,
        }
    }
}

// ---------------------------------------------------------------------------
// BoundCheck
// ---------------------------------------------------------------------------

/// Bounds metadata the engine attaches to a price adjustment. Advisory only:
/// the executor re-validates against the live store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundCheck {
    /// Lowest price that keeps the minimum margin.
    pub floor_price: f64,
    /// |new - old| / old against the snapshot price.
    pub delta_fraction: f64,
    pub within_margin: bool,
    pub within_max_adjustment: bool,
}

impl BoundCheck {
    pub fn within_bounds(&self) -> bool {
        self.within_margin && self.within_max_adjustment
    }
}

// ---------------------------------------------------------------------------
// ProposedAction
// ---------------------------------------------------------------------------

/// One decision produced by the engine. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedAction {
    id: Uuid,
    kind: ActionKind,
    target: Option<EntityRef>,
    proposal: ActionPayload,
    rationale: String,
    confidence: Option<f64>,
    bound_check: Option<BoundCheck>,
    created_at: DateTime<Utc>,
}

impl ProposedAction {
    pub fn new(
        target: Option<EntityRef>,
        proposal: ActionPayload,
        rationale: impl Into<String>,
        confidence: Option<f64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: proposal.kind(),
            target,
            proposal,
            rationale: rationale.into(),
            confidence,
            bound_check: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_bound_check(mut self, check: BoundCheck) -> Self {
        self.bound_check = Some(check);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn target(&self) -> Option<&EntityRef> {
        self.target.as_ref()
    }

    pub fn proposal(&self) -> &ActionPayload {
        &self.proposal
    }

    pub fn rationale(&self) -> &str {
        &self.rationale
    }

    pub fn confidence(&self) -> Option<f64> {
        self.confidence
    }

    pub fn bound_check(&self) -> Option<&BoundCheck> {
        self.bound_check.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// One-line human description, used by the activity feed and the CLI.
    pub fn describe(&self) -> String {
        let target = self
            .target
            .as_ref()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "dealership".to_string());
        match &self.proposal {
            ActionPayload::PriceAdjustment {
                stock_number,
                current_price,
                recommended_price,
                ..
            } => {
                let name = stock_number.clone().unwrap_or(target);
                match current_price {
                    Some(old) => format!("Reprice {name}: ${old:.0} -> ${recommended_price:.0}"),
                    None => format!("Reprice {name} to ${recommended_price:.0}"),
                }
            }
            ActionPayload::CustomerResponse {
                customer_name,
                subject,
                ..
            } => {
                let who = customer_name.clone().unwrap_or(target);
                format!("Reply to {who}: {subject}")
            }
            ActionPayload::ContentGeneration { platform, .. } => {
                format!("Draft {platform} post for {target}")
            }
            ActionPayload::Alert {
                priority, message, ..
            } => format!("[{priority}] {message}"),
        }
    }
}
