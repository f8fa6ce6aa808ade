//! Engine configuration: TOML parsing, environment overrides, and validation.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. Sections:
//!
//! ```toml
//! database_url = "signal_engine.db"
//!
//! [analysis]
//! display_timezone = "America/New_York"
//! evaluate_win_rate = false
//!
//! [polygon]
//! base_url = "https://api.polygon.io"
//! requests_per_minute = 0      # 0 disables throttling
//!
//! [trade_analysis]
//! base_url = "http://localhost:8082"
//!
//! [correlator]
//! max_concurrency = 5
//! lookup_timeout_secs = 60     # 0 disables the per-lookup timeout
//! ```
//!
//! Environment variables win over the file: `DATABASE_URL`, `POLYGON_BASE_URL`,
//! `POLYGON_REQUESTS_PER_MINUTE`, `TRADE_ANALYSIS_API_URL`. The Polygon API key is never read from the file;
//! it comes from `POLYGON_API_KEY` only.

use std::time::Duration;

use anyhow::{Context, bail};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use shared_utils::{ConfigError, env::env_var_opt};

use crate::tz::parse_tz;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EngineConfig {
    /// SQLite path or `sqlite:` URL.
    pub database_url: String,
    pub analysis: AnalysisCfg,
    pub polygon: PolygonCfg,
    pub trade_analysis: TradeAnalysisCfg,
    pub correlator: CorrelatorCfg,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: "signal_engine.db".to_string(),
            analysis: AnalysisCfg::default(),
            polygon: PolygonCfg::default(),
            trade_analysis: TradeAnalysisCfg::default(),
            correlator: CorrelatorCfg::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AnalysisCfg {
    /// IANA zone used for the time of day in signal messages.
    pub display_timezone: String,
    /// Log and return the next-bar win rate of CALL/PUT signals.
    pub evaluate_win_rate: bool,
    pub default_timespan: String,
    pub default_multiplier: u32,
    pub default_requester: String,
}

impl Default for AnalysisCfg {
    fn default() -> Self {
        Self {
            display_timezone: "America/New_York".to_string(),
            evaluate_win_rate: false,
            default_timespan: "minute".to_string(),
            default_multiplier: 5,
            default_requester: "orchestrator".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PolygonCfg {
    pub base_url: String,
    pub requests_per_minute: u32,
}

impl Default for PolygonCfg {
    fn default() -> Self {
        Self {
            base_url: market_data_ingestor::providers::polygon_rest::DEFAULT_BASE_URL.to_string(),
            requests_per_minute: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TradeAnalysisCfg {
    pub base_url: String,
}

impl Default for TradeAnalysisCfg {
    fn default() -> Self {
        Self {
            base_url: market_data_ingestor::providers::trade_analysis::DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CorrelatorCfg {
    /// Flow lookups allowed in flight at once.
    pub max_concurrency: usize,
    pub lookup_timeout_secs: u64,
    pub default_large_trade_threshold: f64,
    pub default_limit: u32,
}

impl Default for CorrelatorCfg {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            lookup_timeout_secs: 60,
            default_large_trade_threshold: 10.0,
            default_limit: 100,
        }
    }
}

impl CorrelatorCfg {
    pub fn lookup_timeout(&self) -> Option<Duration> {
        (self.lookup_timeout_secs > 0).then(|| Duration::from_secs(self.lookup_timeout_secs))
    }
}

impl EngineConfig {
    /// Overrides file values with any set environment variables.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(url) = env_var_opt("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(url) = env_var_opt("POLYGON_BASE_URL") {
            self.polygon.base_url = url;
        }
        if let Some(url) = env_var_opt("TRADE_ANALYSIS_API_URL") {
            self.trade_analysis.base_url = url;
        }
        if let Some(rpm) = shared_utils::env::parse_env_var::<u32>("POLYGON_REQUESTS_PER_MINUTE")? {
            self.polygon.requests_per_minute = rpm;
        }
        Ok(())
    }

    /// Trims string fields and strips trailing slashes from base URLs.
    pub fn normalize(&mut self) {
        self.database_url = self.database_url.trim().to_string();
        self.analysis.display_timezone = self.analysis.display_timezone.trim().to_string();
        self.analysis.default_timespan = self.analysis.default_timespan.trim().to_lowercase();
        self.polygon.base_url = self.polygon.base_url.trim().trim_end_matches('/').to_string();
        self.trade_analysis.base_url = self
            .trade_analysis
            .base_url
            .trim()
            .trim_end_matches('/')
            .to_string();
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database_url.is_empty() {
            bail!("database_url cannot be empty");
        }
        parse_tz(&self.analysis.display_timezone)?;
        if self.analysis.default_multiplier == 0 {
            bail!("analysis.default_multiplier must be at least 1");
        }
        if self.correlator.max_concurrency == 0 {
            bail!("correlator.max_concurrency must be at least 1");
        }
        let threshold = self.correlator.default_large_trade_threshold;
        if !(threshold.is_finite() && threshold > 0.0) {
            bail!("correlator.default_large_trade_threshold must be positive, got {threshold}");
        }
        Ok(())
    }

    pub fn display_tz(&self) -> anyhow::Result<Tz> {
        parse_tz(&self.analysis.display_timezone)
    }
}

/// Parse, normalize, and validate a TOML string. Environment is not consulted.
pub fn load_config_str(toml_str: &str) -> anyhow::Result<EngineConfig> {
    let mut cfg: EngineConfig = toml::from_str(toml_str).context("failed to parse config TOML")?;
    cfg.normalize();
    cfg.validate().context("invalid configuration")?;
    Ok(cfg)
}

/// Load the config file (defaults when `path` is `None`), then apply
/// environment overrides and validate again.
pub fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<EngineConfig> {
    let mut cfg = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("read config file {}", path.display()))?;
            load_config_str(&text)?
        }
        None => EngineConfig::default(),
    };
    cfg.apply_env()?;
    cfg.normalize();
    cfg.validate().context("invalid configuration after environment overrides")?;
    Ok(cfg)
}
