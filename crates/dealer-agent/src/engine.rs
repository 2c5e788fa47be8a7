use std::sync::Arc;

use dealer_core::action::{ActionPayload, EntityRef, ProposedAction};
use dealer_core::config::{Bounds, Config, PromptConfig};
use dealer_core::executor::bound_check;
use dealer_core::prompt::build_prompt;
use dealer_core::response::{parse_decisions, ParsedDecisions};
use dealer_core::store::Snapshot;
use tracing::{info, warn};

use crate::error::DecisionError;
use crate::source::{DecisionRequest, DecisionSource};

/// Turns a store snapshot into an ordered list of proposed actions.
///
/// Never touches the store; the only side effect is the call to the source.
#[derive(Clone)]
pub struct DecisionEngine {
    source: Arc<dyn DecisionSource>,
    bounds: Bounds,
    dealer_name: String,
    prompt: PromptConfig,
}

impl DecisionEngine {
    pub fn new(
        source: Arc<dyn DecisionSource>,
        bounds: Bounds,
        dealer_name: impl Into<String>,
        prompt: PromptConfig,
    ) -> Self {
        Self {
            source,
            bounds,
            dealer_name: dealer_name.into(),
            prompt,
        }
    }

    pub fn from_config(source: Arc<dyn DecisionSource>, config: &Config) -> Self {
        Self::new(
            source,
            config.bounds,
            config.dealer.name.clone(),
            config.prompt.clone(),
        )
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Ask the source for decisions on `snapshot`.
    ///
    /// Input problems fail before any call is made. Unparsable entries are
    /// reported in [`ParsedDecisions::malformed`], not as an error.
    pub async fn decide(&self, snapshot: &Snapshot) -> Result<ParsedDecisions, DecisionError> {
        if snapshot.inventory.is_empty() {
            return Err(DecisionError::InvalidInput(
                "inventory snapshot is empty".into(),
            ));
        }
        self.bounds
            .check()
            .map_err(|e| DecisionError::InvalidInput(e.to_string()))?;

        let request = DecisionRequest {
            prompt: build_prompt(snapshot, &self.dealer_name, &self.bounds, &self.prompt),
            snapshot: snapshot.clone(),
            bounds: self.bounds,
            dealer_name: self.dealer_name.clone(),
            aged_days: self.prompt.aged_days,
        };
        let text = self.source.decide(&request).await?;

        let mut parsed = parse_decisions(&text);
        for entry in &parsed.malformed {
            warn!(
                section = %entry.section,
                index = ?entry.index,
                "discarding malformed entry: {}",
                entry.reason
            );
        }
        parsed.actions = parsed
            .actions
            .into_iter()
            .map(|a| self.annotate(a, snapshot))
            .collect();
        info!(
            source = self.source.name(),
            proposed = parsed.actions.len(),
            malformed = parsed.malformed.len(),
            "decisions received"
        );
        Ok(parsed)
    }

    /// Attach bound metadata to price adjustments whose vehicle is known.
    fn annotate(&self, action: ProposedAction, snapshot: &Snapshot) -> ProposedAction {
        let check = match (action.proposal(), action.target()) {
            (
                ActionPayload::PriceAdjustment {
                    recommended_price, ..
                },
                Some(EntityRef::Vehicle { vin }),
            ) => snapshot
                .vehicle(vin)
                .map(|v| bound_check(&self.bounds, v, *recommended_price)),
            _ => None,
        };
        match check {
            Some(check) => action.with_bound_check(check),
            None => action,
        }
    }
}
