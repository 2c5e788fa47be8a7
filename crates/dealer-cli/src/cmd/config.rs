use std::path::Path;

use anyhow::Context;
use clap::Subcommand;
use dealer_core::config::{Config, WarnLevel};

use crate::output::print_json;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective config (file plus environment overrides)
    Show,

    /// Validate the config for common mistakes
    Validate,
}

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Validate => validate(root, json),
    }
}

fn effective(root: &Path) -> anyhow::Result<Config> {
    let mut config = Config::load(root).context("failed to load config")?;
    config.apply_env();
    Ok(config)
}

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = effective(root)?;
    if json {
        return print_json(&config);
    }
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = effective(root)?;
    let warnings = config.validate();

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}
