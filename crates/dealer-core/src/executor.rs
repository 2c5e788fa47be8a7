//! Validation and application of proposed actions.
//!
//! Every action is checked against the current store contents and the
//! configured [`Bounds`] before anything happens. Rejected actions never touch
//! the store. Accepted actions mutate the store only in
//! [`ExecutionMode::Live`].

use crate::action::{ActionPayload, BoundCheck, EntityRef, ProposedAction};
use crate::config::Bounds;
use crate::error::Result;
use crate::outbox::Outbox;
use crate::store::{Snapshot, StateStore};
use crate::types::VehicleRecord;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Tolerance for float comparisons against the bounds.
const EPSILON: f64 = 1e-9;

/// A stated price within this many dollars of the store price is current.
const STALE_TOLERANCE: f64 = 1.0;

// ---------------------------------------------------------------------------
// ExecutionMode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    DryRun,
    Live,
}

impl ExecutionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DryRun => "dry_run",
            Self::Live => "live",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RejectionReason / Verdict
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum RejectionReason {
    VehicleNotFound {
        vin: String,
    },
    InquiryNotFound {
        inquiry_id: String,
    },
    AlreadyResponded {
        inquiry_id: String,
    },
    MissingTarget,
    NonPositivePrice {
        proposed: f64,
    },
    NoPriceChange {
        price: f64,
    },
    StalePrice {
        stated: f64,
        current: f64,
    },
    BelowMinimumMargin {
        proposed: f64,
        floor: f64,
        min_margin: f64,
    },
    ExceedsMaxAdjustment {
        delta: f64,
        max_adjustment: f64,
    },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VehicleNotFound { vin } => write!(f, "vehicle not found: {vin}"),
            Self::InquiryNotFound { inquiry_id } => write!(f, "inquiry not found: {inquiry_id}"),
            Self::AlreadyResponded { inquiry_id } => {
                write!(f, "inquiry {inquiry_id} already responded")
            }
            Self::MissingTarget => f.write_str("action has no usable target"),
            Self::NonPositivePrice { proposed } => {
                write!(f, "proposed price ${proposed:.2} is not positive")
            }
            Self::NoPriceChange { price } => {
                write!(f, "no change: proposed price equals current price ${price:.2}")
            }
            Self::StalePrice { stated, current } => write!(
                f,
                "stale price: proposal assumed ${stated:.2} but current price is ${current:.2}"
            ),
            Self::BelowMinimumMargin {
                proposed,
                floor,
                min_margin,
            } => write!(
                f,
                "below minimum margin: ${proposed:.2} is under the ${floor:.2} floor ({:.1}% minimum margin)",
                min_margin * 100.0
            ),
            Self::ExceedsMaxAdjustment {
                delta,
                max_adjustment,
            } => write!(
                f,
                "exceeds maximum adjustment: {:.1}% change, limit {:.1}%",
                delta * 100.0,
                max_adjustment * 100.0
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    Rejected(RejectionReason),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    pub fn rejection(&self) -> Option<&RejectionReason> {
        match self {
            Self::Accepted => None,
            Self::Rejected(r) => Some(r),
        }
    }
}

/// Outcome of [`Executor::execute`] for one action.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub verdict: Verdict,
    /// True when the store was mutated.
    pub applied: bool,
    /// Outbox file written for this action, if any.
    pub outbox_file: Option<PathBuf>,
}

impl Execution {
    fn not_applied(verdict: Verdict) -> Self {
        Self {
            verdict,
            applied: false,
            outbox_file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Bound checks
// ---------------------------------------------------------------------------

/// Relative change from `old` to `new`.
pub fn delta_fraction(old: f64, new: f64) -> f64 {
    if old <= 0.0 {
        return f64::INFINITY;
    }
    (new - old).abs() / old
}

/// Evaluate `proposed` for `vehicle` against `bounds`.
pub fn bound_check(bounds: &Bounds, vehicle: &VehicleRecord, proposed: f64) -> BoundCheck {
    let floor_price = bounds.floor_price(vehicle.cost);
    let delta = delta_fraction(vehicle.current_price, proposed);
    BoundCheck {
        floor_price,
        delta_fraction: delta,
        within_margin: !bounds.enforce_min_margin || proposed + EPSILON >= floor_price,
        within_max_adjustment: delta <= bounds.max_adjustment + EPSILON,
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Executor {
    bounds: Bounds,
    mode: ExecutionMode,
    outbox: Option<Outbox>,
}

impl Executor {
    pub fn new(bounds: Bounds, mode: ExecutionMode) -> Self {
        Self {
            bounds,
            mode,
            outbox: None,
        }
    }

    /// Write live emails and posts to `outbox`.
    pub fn with_outbox(mut self, outbox: Outbox) -> Self {
        self.outbox = Some(outbox);
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Decide whether `action` may be applied to `snapshot`. Pure.
    pub fn validate(&self, action: &ProposedAction, snapshot: &Snapshot) -> Verdict {
        match self.check(action, snapshot) {
            Ok(()) => Verdict::Accepted,
            Err(reason) => Verdict::Rejected(reason),
        }
    }

    fn check(
        &self,
        action: &ProposedAction,
        snapshot: &Snapshot,
    ) -> std::result::Result<(), RejectionReason> {
        match (action.proposal(), action.target()) {
            (
                ActionPayload::PriceAdjustment {
                    current_price,
                    recommended_price,
                    ..
                },
                Some(EntityRef::Vehicle { vin }),
            ) => self.check_price(snapshot, vin, *current_price, *recommended_price),
            (ActionPayload::PriceAdjustment { .. }, _) => Err(RejectionReason::MissingTarget),

            (ActionPayload::CustomerResponse { .. }, Some(EntityRef::Inquiry { inquiry_id })) => {
                let inquiry = snapshot.inquiry(inquiry_id).ok_or_else(|| {
                    RejectionReason::InquiryNotFound {
                        inquiry_id: inquiry_id.clone(),
                    }
                })?;
                if inquiry.is_responded() {
                    return Err(RejectionReason::AlreadyResponded {
                        inquiry_id: inquiry_id.clone(),
                    });
                }
                Ok(())
            }
            (ActionPayload::CustomerResponse { .. }, _) => Err(RejectionReason::MissingTarget),

            (ActionPayload::ContentGeneration { .. } | ActionPayload::Alert { .. }, target) => {
                check_exists(snapshot, target)
            }
        }
    }

    fn check_price(
        &self,
        snapshot: &Snapshot,
        vin: &str,
        stated: Option<f64>,
        proposed: f64,
    ) -> std::result::Result<(), RejectionReason> {
        let vehicle = snapshot
            .vehicle(vin)
            .ok_or_else(|| RejectionReason::VehicleNotFound {
                vin: vin.to_string(),
            })?;
        if !proposed.is_finite() || proposed <= 0.0 {
            return Err(RejectionReason::NonPositivePrice { proposed });
        }
        if (proposed - vehicle.current_price).abs() < 0.005 {
            return Err(RejectionReason::NoPriceChange {
                price: vehicle.current_price,
            });
        }
        if let Some(stated) = stated {
            if (stated - vehicle.current_price).abs() > STALE_TOLERANCE {
                return Err(RejectionReason::StalePrice {
                    stated,
                    current: vehicle.current_price,
                });
            }
        }
        let check = bound_check(&self.bounds, vehicle, proposed);
        if !check.within_margin {
            return Err(RejectionReason::BelowMinimumMargin {
                proposed,
                floor: check.floor_price,
                min_margin: self.bounds.min_margin,
            });
        }
        if !check.within_max_adjustment {
            return Err(RejectionReason::ExceedsMaxAdjustment {
                delta: check.delta_fraction,
                max_adjustment: self.bounds.max_adjustment,
            });
        }
        Ok(())
    }

    /// Validate `action` against the store and, in live mode, apply it.
    ///
    /// Rejections are returned as a [`Verdict`], not an error. An error means
    /// a store or outbox write failed.
    pub fn execute(&self, action: &ProposedAction, store: &mut StateStore) -> Result<Execution> {
        let verdict = self.validate(action, store.snapshot());
        if !verdict.is_accepted() || self.mode == ExecutionMode::DryRun {
            return Ok(Execution::not_applied(verdict));
        }

        let now = Utc::now();
        match (action.proposal(), action.target()) {
            (
                ActionPayload::PriceAdjustment {
                    recommended_price, ..
                },
                Some(EntityRef::Vehicle { vin }),
            ) => {
                store.set_price(vin, *recommended_price, now)?;
                Ok(Execution {
                    verdict,
                    applied: true,
                    outbox_file: None,
                })
            }
            (
                ActionPayload::CustomerResponse { subject, body, .. },
                Some(EntityRef::Inquiry { inquiry_id }),
            ) => {
                let to = store
                    .snapshot()
                    .inquiry(inquiry_id)
                    .map(|i| i.customer_email.clone())
                    .unwrap_or_default();
                // The email goes out before the inquiry is closed, so a failed
                // write leaves the inquiry open for the next cycle.
                let outbox_file = match &self.outbox {
                    Some(outbox) => Some(outbox.write_email(action.id(), &to, subject, body, now)?),
                    None => None,
                };
                if let Err(e) = store.mark_responded(inquiry_id) {
                    if let Some(path) = &outbox_file {
                        let _ = std::fs::remove_file(path);
                    }
                    return Err(e);
                }
                Ok(Execution {
                    verdict,
                    applied: true,
                    outbox_file,
                })
            }
            (
                ActionPayload::ContentGeneration {
                    platform,
                    content,
                    hashtags,
                },
                target,
            ) => {
                let vin = match target {
                    Some(EntityRef::Vehicle { vin }) => Some(vin.as_str()),
                    _ => None,
                };
                let outbox_file = match &self.outbox {
                    Some(outbox) => Some(outbox.write_post(
                        action.id(),
                        platform,
                        vin,
                        content,
                        hashtags,
                        now,
                    )?),
                    None => None,
                };
                Ok(Execution {
                    verdict,
                    applied: false,
                    outbox_file,
                })
            }
            _ => Ok(Execution::not_applied(verdict)),
        }
    }
}

fn check_exists(
    snapshot: &Snapshot,
    target: Option<&EntityRef>,
) -> std::result::Result<(), RejectionReason> {
    match target {
        None => Ok(()),
        Some(EntityRef::Vehicle { vin }) => snapshot
            .vehicle(vin)
            .map(|_| ())
            .ok_or_else(|| RejectionReason::VehicleNotFound { vin: vin.clone() }),
        Some(EntityRef::Inquiry { inquiry_id }) => snapshot
            .inquiry(inquiry_id)
            .map(|_| ())
            .ok_or_else(|| RejectionReason::InquiryNotFound {
                inquiry_id: inquiry_id.clone(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathsConfig;
    use crate::paths::Layout;
    use crate::store::tests::sample_snapshot;
    use crate::store::write_csv;
    use tempfile::TempDir;

    fn price_action(vin: &str, stated: Option<f64>, proposed: f64) -> ProposedAction {
        ProposedAction::new(
            Some(EntityRef::Vehicle { vin: vin.into() }),
            ActionPayload::PriceAdjustment {
                stock_number: None,
                current_price: stated,
                recommended_price: proposed,
                urgency: None,
            },
            "aged",
            None,
        )
    }

    fn response_action(inquiry_id: &str) -> ProposedAction {
        ProposedAction::new(
            Some(EntityRef::Inquiry {
                inquiry_id: inquiry_id.into(),
            }),
            ActionPayload::CustomerResponse {
                customer_name: None,
                subject: "Your Camry".into(),
                body: "It is available.".into(),
                offer_price: None,
                strategy: None,
            },
            "hot lead",
            None,
        )
    }

    fn rejection(verdict: Verdict) -> RejectionReason {
        match verdict {
            Verdict::Rejected(r) => r,
            Verdict::Accepted => panic!("expected rejection"),
        }
    }

    fn live() -> Executor {
        Executor::new(Bounds::default(), ExecutionMode::Live)
    }

    #[test]
    fn below_margin_rejected_citing_minimum_margin() {
        // cost 10000, price 11000, min margin 5% -> floor 10500.
        let snapshot = sample_snapshot();
        let verdict = live().validate(&price_action("VIN001", None, 9_800.0), &snapshot);
        let reason = rejection(verdict);
        assert!(matches!(
            reason,
            RejectionReason::BelowMinimumMargin { floor, .. } if (floor - 10_500.0).abs() < 1e-6
        ));
        assert!(reason.to_string().contains("minimum margin"));
    }

    #[test]
    fn margin_floor_is_inclusive() {
        let snapshot = sample_snapshot();
        let verdict = live().validate(&price_action("VIN001", None, 10_500.0), &snapshot);
        assert_eq!(verdict, Verdict::Accepted);
    }

    #[test]
    fn margin_check_can_be_disabled() {
        let bounds = Bounds {
            enforce_min_margin: false,
            ..Bounds::default()
        };
        let exec = Executor::new(bounds, ExecutionMode::Live);
        let verdict = exec.validate(&price_action("VIN001", None, 9_800.0), &sample_snapshot());
        assert_eq!(verdict, Verdict::Accepted);
    }

    #[test]
    fn large_adjustment_rejected() {
        // 25000 -> 21000 is a 16% cut with a 15% limit; 21000 sits exactly on
        // the margin floor, so only the adjustment bound fails.
        let snapshot = sample_snapshot();
        let reason = rejection(live().validate(&price_action("VIN002", None, 21_000.0), &snapshot));
        assert!(matches!(
            reason,
            RejectionReason::ExceedsMaxAdjustment { delta, .. } if (delta - 0.16).abs() < 1e-9
        ));
    }

    #[test]
    fn exact_max_adjustment_accepted() {
        let snapshot = sample_snapshot();
        let verdict = live().validate(&price_action("VIN002", None, 21_250.0), &snapshot);
        assert_eq!(verdict, Verdict::Accepted);
    }

    #[test]
    fn price_checks_in_order() {
        let snapshot = sample_snapshot();
        let exec = live();
        assert!(matches!(
            rejection(exec.validate(&price_action("NOPE", None, 1.0), &snapshot)),
            RejectionReason::VehicleNotFound { .. }
        ));
        assert!(matches!(
            rejection(exec.validate(&price_action("VIN001", None, 0.0), &snapshot)),
            RejectionReason::NonPositivePrice { .. }
        ));
        assert!(matches!(
            rejection(exec.validate(&price_action("VIN001", None, 11_000.0), &snapshot)),
            RejectionReason::NoPriceChange { .. }
        ));
        assert!(matches!(
            rejection(exec.validate(&price_action("VIN001", Some(12_000.0), 10_600.0), &snapshot)),
            RejectionReason::StalePrice { .. }
        ));
    }

    #[test]
    fn response_to_unknown_or_answered_inquiry_rejected() {
        let snapshot = sample_snapshot();
        let exec = live();
        assert!(matches!(
            rejection(exec.validate(&response_action("INQ404"), &snapshot)),
            RejectionReason::InquiryNotFound { .. }
        ));
        let reason = rejection(exec.validate(&response_action("INQ2"), &snapshot));
        assert!(reason.to_string().contains("already responded"));
    }

    #[test]
    fn alert_and_content_need_existing_target_only() {
        let snapshot = sample_snapshot();
        let exec = live();
        let alert = ProposedAction::new(
            None,
            ActionPayload::Alert {
                priority: "high".into(),
                category: None,
                message: "check lot".into(),
                recommended_action: None,
            },
            "",
            None,
        );
        assert_eq!(exec.validate(&alert, &snapshot), Verdict::Accepted);

        let post = ProposedAction::new(
            Some(EntityRef::Vehicle { vin: "GONE".into() }),
            ActionPayload::ContentGeneration {
                platform: "facebook".into(),
                content: "Deal".into(),
                hashtags: vec![],
            },
            "",
            None,
        );
        assert!(matches!(
            rejection(exec.validate(&post, &snapshot)),
            RejectionReason::VehicleNotFound { .. }
        ));
    }

    #[test]
    fn live_price_change_mutates_store_within_bounds() {
        let mut store = StateStore::in_memory(sample_snapshot());
        let exec = live();
        let out = exec
            .execute(&price_action("VIN001", Some(11_000.0), 10_600.0), &mut store)
            .unwrap();
        assert!(out.applied);
        let v = store.snapshot().vehicle("VIN001").unwrap();
        assert_eq!(v.current_price, 10_600.0);
        assert!(v.current_price >= v.cost * 1.05);

        // Reapplying the same proposal no longer changes anything.
        let again = exec
            .execute(&price_action("VIN001", Some(11_000.0), 10_600.0), &mut store)
            .unwrap();
        assert!(matches!(
            again.verdict,
            Verdict::Rejected(RejectionReason::NoPriceChange { .. })
        ));
        assert!(!again.applied);

        // A different target computed against the old price is stale.
        let stale = exec
            .execute(&price_action("VIN001", Some(11_000.0), 10_700.0), &mut store)
            .unwrap();
        assert!(matches!(
            stale.verdict,
            Verdict::Rejected(RejectionReason::StalePrice { .. })
        ));
        assert_eq!(store.snapshot().vehicle("VIN001").unwrap().current_price, 10_600.0);
    }

    #[test]
    fn second_customer_response_rejected_already_responded() {
        let mut store = StateStore::in_memory(sample_snapshot());
        let exec = live();
        let action = response_action("INQ1");
        let first = exec.execute(&action, &mut store).unwrap();
        assert!(first.applied);
        let second = exec.execute(&action, &mut store).unwrap();
        assert!(!second.applied);
        assert!(second
            .verdict
            .rejection()
            .unwrap()
            .to_string()
            .contains("already responded"));
    }

    #[test]
    fn dry_run_never_mutates() {
        let before = sample_snapshot();
        let mut store = StateStore::in_memory(before.clone());
        let exec = Executor::new(Bounds::default(), ExecutionMode::DryRun);
        for action in [
            price_action("VIN001", Some(11_000.0), 10_600.0),
            response_action("INQ1"),
        ] {
            let out = exec.execute(&action, &mut store).unwrap();
            assert!(out.verdict.is_accepted());
            assert!(!out.applied);
        }
        assert_eq!(store.snapshot(), &before);
    }

    #[test]
    fn live_response_writes_outbox_email() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::new(dir.path(), &PathsConfig::default());
        let snapshot = sample_snapshot();
        write_csv(&layout.inventory(), &snapshot.inventory).unwrap();
        write_csv(&layout.inquiries(), &snapshot.inquiries).unwrap();
        let mut store = StateStore::open(&layout).unwrap();

        let exec = live().with_outbox(Outbox::new(&layout));
        let out = exec.execute(&response_action("INQ1"), &mut store).unwrap();
        let file = out.outbox_file.expect("email written");
        let text = std::fs::read_to_string(file).unwrap();
        assert!(text.starts_with("To: dana@example.com"));

        let reloaded = StateStore::open(&layout).unwrap();
        assert!(reloaded.snapshot().inquiry("INQ1").unwrap().is_responded());
    }

    #[test]
    fn failed_outbox_write_leaves_inquiry_open() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::new(dir.path(), &PathsConfig::default());
        let snapshot = sample_snapshot();
        write_csv(&layout.inventory(), &snapshot.inventory).unwrap();
        write_csv(&layout.inquiries(), &snapshot.inquiries).unwrap();
        let mut store = StateStore::open(&layout).unwrap();

        // A plain file where the outbox directory should be.
        std::fs::create_dir_all(&layout.log_dir).unwrap();
        std::fs::write(layout.log_dir.join("outbox"), b"not a directory").unwrap();

        let exec = live().with_outbox(Outbox::new(&layout));
        let result = exec.execute(&response_action("INQ1"), &mut store);
        assert!(matches!(result, Err(crate::DealerError::Persistence { .. })));

        assert!(!store.snapshot().inquiry("INQ1").unwrap().is_responded());
        let reloaded = StateStore::open(&layout).unwrap();
        assert!(!reloaded.snapshot().inquiry("INQ1").unwrap().is_responded());

        // Once the outbox is writable again the reply goes through.
        std::fs::remove_file(layout.log_dir.join("outbox")).unwrap();
        let out = exec.execute(&response_action("INQ1"), &mut store).unwrap();
        assert!(out.applied);
        assert!(out.outbox_file.unwrap().exists());
    }

    #[test]
    fn rejection_serializes_with_code() {
        let json = serde_json::to_value(RejectionReason::AlreadyResponded {
            inquiry_id: "INQ1".into(),
        })
        .unwrap();
        assert_eq!(json["code"], "already_responded");
        assert_eq!(json["inquiry_id"], "INQ1");
    }
}
