//! Configuration management
//!
//! Handles loading and parsing of JSON configuration files with environment
//! variable support for API credentials and service URLs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::analysis::AnalysisConfig;
use crate::data::{DataConfig, DataProvider};
use crate::error::{SignalError, SignalResult};
use crate::notify::TelegramConfig;
use crate::services::ServicesConfig;
use crate::strategies::Timeframe;
use crate::types::Symbol;
use crate::watch::WatchConfig;

pub const ENV_TWELVEDATA_KEY: &str = "TWELVEDATA_KEY";
pub const ENV_TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_SMC_SERVICE_URL: &str = "SMC_SERVICE_URL";
pub const ENV_AI_SERVICE_URL: &str = "AI_SERVICE_URL";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Intervals analyzed by `watch`, in order
    #[serde(default = "default_timeframes")]
    pub timeframes: Vec<String>,

    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub services: ServicesConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub watch: WatchConfig,
}

fn default_symbol() -> String {
    "XAU/USD".to_string()
}

fn default_timeframes() -> Vec<String> {
    Timeframe::ALL.iter().map(|tf| tf.as_str().to_string()).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            timeframes: default_timeframes(),
            data: DataConfig::default(),
            analysis: AnalysisConfig::default(),
            services: ServicesConfig::default(),
            telegram: TelegramConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from JSON file, then apply `.env` and environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;

        dotenv::dotenv().ok();
        config.apply_overrides(|key| std::env::var(key).ok());

        Ok(config)
    }

    /// Environment values win over the file; empty values are ignored
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_TWELVEDATA_KEY) {
            self.data.api_key = Some(key);
        }
        if let Some(token) = get(ENV_TELEGRAM_BOT_TOKEN) {
            self.telegram.bot_token = Some(token);
        }
        if let Some(url) = get(ENV_SMC_SERVICE_URL) {
            self.services.smc_url = Some(url);
        }
        if let Some(url) = get(ENV_AI_SERVICE_URL) {
            self.services.ai_url = Some(url);
        }
    }

    pub fn symbol(&self) -> Symbol {
        Symbol::new(&self.symbol)
    }

    pub fn timeframes(&self) -> SignalResult<Vec<Timeframe>> {
        self.timeframes
            .iter()
            .map(|s| s.parse::<Timeframe>().map_err(SignalError::Configuration))
            .collect()
    }

    /// Reject configurations that cannot run
    pub fn validate(&self) -> SignalResult<()> {
        if self.symbol.trim().is_empty() {
            return Err(SignalError::Configuration("symbol is empty".to_string()));
        }

        if self.timeframes()?.is_empty() {
            return Err(SignalError::Configuration(
                "at least one timeframe is required".to_string(),
            ));
        }

        if self.data.provider == DataProvider::TwelveData && self.data.api_key.is_none() {
            return Err(SignalError::Configuration(format!(
                "TwelveData API key missing; set {} or data.api_key",
                ENV_TWELVEDATA_KEY
            )));
        }

        if let Some(bounds) = self.data.price_bounds {
            if bounds.min >= bounds.max {
                return Err(SignalError::Configuration(format!(
                    "price bound inverted: min {} >= max {}",
                    bounds.min, bounds.max
                )));
            }
        }

        let risk = &self.analysis.risk;
        if !(0.0..=100.0).contains(&risk.max_risk_allowed) {
            return Err(SignalError::Configuration(format!(
                "max_risk_allowed must be within [0, 100], got {}",
                risk.max_risk_allowed
            )));
        }

        if self.analysis.risk_reward.is_nan() || self.analysis.risk_reward <= 0.0 {
            return Err(SignalError::Configuration(format!(
                "risk_reward must be positive, got {}",
                self.analysis.risk_reward
            )));
        }

        if self.telegram.enabled && self.telegram.bot_token.is_none() {
            return Err(SignalError::Configuration(format!(
                "Telegram enabled but no bot token; set {} or telegram.enabled = false",
                ENV_TELEGRAM_BOT_TOKEN
            )));
        }

        Ok(())
    }
}
