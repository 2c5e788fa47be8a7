use crate::error::{DealerError, Result};
use crate::executor::ExecutionMode;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// DealerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealerConfig {
    #[serde(default = "default_dealer_name")]
    pub name: String,
}

fn default_dealer_name() -> String {
    "Premium Auto Sales".to_string()
}

impl Default for DealerConfig {
    fn default() -> Self {
        Self {
            name: default_dealer_name(),
        }
    }
}

// ---------------------------------------------------------------------------
// Bounds
// ---------------------------------------------------------------------------

/// Safety bounds every price adjustment must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Minimum profit margin over cost, as a fraction (0.05 = 5%).
    #[serde(default = "default_min_margin")]
    pub min_margin: f64,
    /// Maximum relative change of a single price adjustment (0.15 = 15%).
    #[serde(default = "default_max_adjustment")]
    pub max_adjustment: f64,
    /// When false, prices may drop below `cost * (1 + min_margin)`.
    #[serde(default = "default_true")]
    pub enforce_min_margin: bool,
}

fn default_min_margin() -> f64 {
    0.05
}

fn default_max_adjustment() -> f64 {
    0.15
}

fn default_true() -> bool {
    true
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min_margin: default_min_margin(),
            max_adjustment: default_max_adjustment(),
            enforce_min_margin: true,
        }
    }
}

impl Bounds {
    /// Both bounds must be fractions in `(0, 1]`.
    pub fn check(&self) -> Result<()> {
        for (name, value) in [
            ("min_margin", self.min_margin),
            ("max_adjustment", self.max_adjustment),
        ] {
            if !value.is_finite() || value <= 0.0 || value > 1.0 {
                return Err(DealerError::InvalidConfig(format!(
                    "bounds.{name} must be a fraction in (0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Lowest price that keeps the configured margin over `cost`.
    pub fn floor_price(&self, cost: f64) -> f64 {
        cost * (1.0 + self.min_margin)
    }
}

// ---------------------------------------------------------------------------
// ScheduleConfig / RunMode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_demo_interval")]
    pub demo_interval_secs: u64,
    #[serde(default = "default_production_interval")]
    pub production_interval_secs: u64,
}

/// Longest cadence the scheduler will wait between cycles (30 days).
pub const MAX_INTERVAL_SECS: u64 = 30 * 24 * 60 * 60;

fn default_demo_interval() -> u64 {
    5 * 60
}

fn default_production_interval() -> u64 {
    60 * 60
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            demo_interval_secs: default_demo_interval(),
            production_interval_secs: default_production_interval(),
        }
    }
}

/// Scheduler mode selector: cadence plus dry-run/live behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Short cadence, dry-run.
    Demo,
    /// Long cadence, dry-run.
    Production,
    /// Long cadence, accepted actions mutate the store.
    Live,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Demo => "demo",
            Self::Production => "production",
            Self::Live => "live",
        }
    }

    pub fn interval(self, schedule: &ScheduleConfig) -> Duration {
        let secs = match self {
            Self::Demo => schedule.demo_interval_secs,
            Self::Production | Self::Live => schedule.production_interval_secs,
        };
        Duration::from_secs(secs.clamp(1, MAX_INTERVAL_SECS))
    }

    pub fn execution_mode(self) -> ExecutionMode {
        match self {
            Self::Live => ExecutionMode::Live,
            Self::Demo | Self::Production => ExecutionMode::DryRun,
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = DealerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "demo" => Ok(Self::Demo),
            "production" => Ok(Self::Production),
            "live" => Ok(Self::Live),
            other => Err(DealerError::InvalidConfig(format!(
                "unknown run mode '{other}' (expected demo, production or live)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ReasoningConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Hosted model over HTTP (Anthropic Messages API shape).
    Anthropic,
    /// Deterministic offline heuristics; no network.
    RuleBased,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> ProviderKind {
    ProviderKind::Anthropic
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ReasoningConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

// ---------------------------------------------------------------------------
// PromptConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Vehicles older than this many days count as aged inventory.
    #[serde(default = "default_aged_days")]
    pub aged_days: u32,
    /// Vehicles younger than this many days count as fresh inventory.
    #[serde(default = "default_fresh_days")]
    pub fresh_days: u32,
    #[serde(default = "default_max_rows")]
    pub max_vehicles: usize,
    #[serde(default = "default_max_rows")]
    pub max_inquiries: usize,
}

fn default_aged_days() -> u32 {
    60
}

fn default_fresh_days() -> u32 {
    30
}

fn default_max_rows() -> usize {
    10
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            aged_days: default_aged_days(),
            fresh_days: default_fresh_days(),
            max_vehicles: default_max_rows(),
            max_inquiries: default_max_rows(),
        }
    }
}

// ---------------------------------------------------------------------------
// PathsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_dir: default_log_dir(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub dealer: DealerConfig,
    #[serde(default)]
    pub bounds: Bounds,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub reasoning: ReasoningConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            dealer: DealerConfig::default(),
            bounds: Bounds::default(),
            schedule: ScheduleConfig::default(),
            reasoning: ReasoningConfig::default(),
            prompt: PromptConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Config {
    /// Load `dealer.yaml` from `root`, falling back to defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn layout(&self, root: &Path) -> paths::Layout {
        paths::Layout::new(root, &self.paths)
    }

    /// Apply the environment overrides the dealership has always honoured.
    ///
    /// `DEALER_NAME`, `MIN_PROFIT_MARGIN`, `MAX_PRICE_ADJUSTMENT` and
    /// `AGENT_RUN_INTERVAL_MINUTES` (production cadence). Unparseable values
    /// are ignored with a warning.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(name) = lookup("DEALER_NAME").filter(|v| !v.trim().is_empty()) {
            self.dealer.name = name.trim().to_string();
        }
        if let Some(v) = parse_override::<f64>(&lookup, "MIN_PROFIT_MARGIN") {
            self.bounds.min_margin = v;
        }
        if let Some(v) = parse_override::<f64>(&lookup, "MAX_PRICE_ADJUSTMENT") {
            self.bounds.max_adjustment = v;
        }
        if let Some(minutes) = parse_override::<u64>(&lookup, "AGENT_RUN_INTERVAL_MINUTES") {
            self.schedule.production_interval_secs = minutes.saturating_mul(60);
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if let Err(e) = self.bounds.check() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: e.to_string(),
            });
        }

        if !self.bounds.enforce_min_margin {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "bounds.enforce_min_margin is false: prices may drop below cost margin"
                    .to_string(),
            });
        }

        if self.schedule.demo_interval_secs == 0 || self.schedule.production_interval_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "schedule intervals must be at least one second".to_string(),
            });
        } else if self.schedule.demo_interval_secs > self.schedule.production_interval_secs {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "demo interval ({}s) is longer than the production interval ({}s)",
                    self.schedule.demo_interval_secs, self.schedule.production_interval_secs
                ),
            });
        }

        if self.reasoning.timeout_secs >= self.schedule.demo_interval_secs {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "reasoning timeout ({}s) is not shorter than the demo interval ({}s); \
                     demo ticks will be skipped while a cycle waits",
                    self.reasoning.timeout_secs, self.schedule.demo_interval_secs
                ),
            });
        }

        if !(0.0..=1.0).contains(&self.reasoning.temperature) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "reasoning.temperature {} is outside [0, 1]",
                    self.reasoning.temperature
                ),
            });
        }

        if self.prompt.fresh_days >= self.prompt.aged_days {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "prompt.fresh_days ({}) should be below prompt.aged_days ({})",
                    self.prompt.fresh_days, self.prompt.aged_days
                ),
            });
        }

        warnings
    }
}

fn parse_override<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("ignoring {key}={raw:?}: not a valid number");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
