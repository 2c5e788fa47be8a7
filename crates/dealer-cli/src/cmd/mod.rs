pub mod config;
pub mod cycle;
pub mod generate;
pub mod init;
pub mod log;
pub mod run;
pub mod serve;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use dealer_agent::{build_source, DecisionSource};
use dealer_core::config::{Config, ProviderKind, WarnLevel};

/// Load `dealer.yaml` with environment overrides and refuse configs with
/// hard errors.
pub fn load_config(root: &Path) -> anyhow::Result<Config> {
    let mut config = Config::load(root).context("failed to load dealer.yaml")?;
    config.apply_env();
    let errors: Vec<String> = config
        .validate()
        .into_iter()
        .filter(|w| w.level == WarnLevel::Error)
        .map(|w| w.message)
        .collect();
    if !errors.is_empty() {
        anyhow::bail!("invalid configuration: {}", errors.join("; "));
    }
    Ok(config)
}

pub fn source_for(config: &Config, offline: bool) -> anyhow::Result<Arc<dyn DecisionSource>> {
    let mut reasoning = config.reasoning.clone();
    if offline {
        reasoning.provider = ProviderKind::RuleBased;
    }
    build_source(&reasoning).context("failed to set up the reasoning service")
}
