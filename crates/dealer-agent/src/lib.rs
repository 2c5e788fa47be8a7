//! `dealer-agent`: the asynchronous half of the dealership loop.
//!
//! ```text
//! Scheduler ──tick/trigger──▶ CycleRunner
//!                               │ StateStore::open
//!                               ▼
//!                         DecisionEngine ──prompt──▶ DecisionSource
//!                               │ ParsedDecisions
//!                               ▼
//!                         Executor + ActionLog (one action at a time)
//! ```
//!
//! The reasoning service is a [`DecisionSource`]: [`AnthropicSource`] talks
//! to the hosted API, [`RuleBasedSource`] answers offline from the snapshot,
//! and [`ScriptedSource`] replays canned answers for tests. The same source
//! also writes listing copy on demand through [`describe_vehicle`].

pub mod anthropic;
pub mod cycle;
pub mod description;
pub mod engine;
pub mod error;
pub mod rule_based;
pub mod scheduler;
pub mod source;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use dealer_core::config::{ProviderKind, ReasoningConfig};

pub use anthropic::{AnthropicConfig, AnthropicSource};
pub use cycle::CycleRunner;
pub use description::{describe_vehicle, VehicleDescription};
pub use engine::DecisionEngine;
pub use error::{CycleError, DecisionError};
pub use rule_based::RuleBasedSource;
pub use scheduler::{Scheduler, SchedulerHandle, SchedulerState, SchedulerStatus, TriggerOutcome};
pub use source::{DecisionRequest, DecisionSource, DescriptionRequest, ScriptedSource};

/// Build the source named by `reasoning.provider`.
pub fn build_source(cfg: &ReasoningConfig) -> Result<Arc<dyn DecisionSource>, DecisionError> {
    Ok(match cfg.provider {
        ProviderKind::Anthropic => Arc::new(AnthropicSource::new(
            AnthropicConfig::from_reasoning(cfg)?,
        )?),
        ProviderKind::RuleBased => Arc::new(RuleBasedSource::new()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_based_needs_no_key() {
        let cfg = ReasoningConfig {
            provider: ProviderKind::RuleBased,
            api_key_env: "DEALER_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..ReasoningConfig::default()
        };
        assert_eq!(build_source(&cfg).unwrap().name(), "rule_based");
    }

    #[test]
    fn anthropic_without_key_is_a_configuration_error() {
        let cfg = ReasoningConfig {
            provider: ProviderKind::Anthropic,
            api_key_env: "DEALER_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..ReasoningConfig::default()
        };
        let err = build_source(&cfg).err().unwrap();
        assert!(matches!(err, DecisionError::Configuration(_)));
    }
}
