//! Optional SMC and AI collaborators
//!
//! Both services are black boxes reached over HTTP. Any failure, including a
//! timeout, is logged and replaced by an inconclusive NEUTRAL reading so that
//! an analysis cycle never fails because a collaborator is down.

pub mod ai;
pub mod smc;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::error::{SignalError, SignalResult};
use crate::types::Candle;

pub use ai::{AiClient, AiPrediction};
pub use smc::{SmcClient, SmcReport, Zone};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicesConfig {
    /// Base URL of the SMC service (disabled when unset)
    #[serde(default)]
    pub smc_url: Option<String>,

    /// Base URL of the AI service (disabled when unset)
    #[serde(default)]
    pub ai_url: Option<String>,

    /// Per-request timeout in seconds (default: 10)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Minimum AI confidence for confluence (default: 0.85)
    #[serde(default = "default_ai_confidence_threshold")]
    pub ai_confidence_threshold: f64,
}

fn default_timeout_secs() -> u64 {
    10
}
fn default_ai_confidence_threshold() -> f64 {
    0.85
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            smc_url: None,
            ai_url: None,
            timeout_secs: default_timeout_secs(),
            ai_confidence_threshold: default_ai_confidence_threshold(),
        }
    }
}

impl ServicesConfig {
    pub fn is_enabled(&self) -> bool {
        self.smc_url.is_some() || self.ai_url.is_some()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// What the collaborators reported, failures already degraded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceReadout {
    pub smc: SmcReport,
    pub ai: AiPrediction,
}

#[derive(Debug, Clone, Default)]
pub struct Collaborators {
    smc: Option<SmcClient>,
    ai: Option<AiClient>,
}

impl Collaborators {
    pub fn from_config(config: &ServicesConfig) -> SignalResult<Self> {
        let smc = config
            .smc_url
            .as_deref()
            .map(|url| SmcClient::new(url, config.timeout()))
            .transpose()?;
        let ai = config
            .ai_url
            .as_deref()
            .map(|url| AiClient::new(url, config.timeout()))
            .transpose()?;

        Ok(Self { smc, ai })
    }

    pub fn is_empty(&self) -> bool {
        self.smc.is_none() && self.ai.is_none()
    }

    /// Query both services concurrently
    pub async fn consult(&self, candles: &[Candle]) -> ServiceReadout {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

        let smc_call = async {
            match &self.smc {
                Some(client) => Some(client.analyze(candles).await),
                None => None,
            }
        };
        let ai_call = async {
            match &self.ai {
                Some(client) => Some(client.predict(&closes).await),
                None => None,
            }
        };

        let (smc, ai) = tokio::join!(smc_call, ai_call);

        ServiceReadout {
            smc: degrade(smc, || SmcReport::inconclusive("SMC service not configured"), |e| {
                SmcReport::inconclusive(e.to_string())
            }),
            ai: degrade(ai, AiPrediction::inconclusive, |_| AiPrediction::inconclusive()),
        }
    }
}

/// Map a missing or failed call onto its inconclusive stand-in
fn degrade<T>(
    result: Option<SignalResult<T>>,
    disabled: impl FnOnce() -> T,
    failed: impl FnOnce(&SignalError) -> T,
) -> T {
    match result {
        Some(Ok(value)) => value,
        Some(Err(e)) => {
            warn!("{}; treating as inconclusive", e);
            failed(&e)
        }
        None => disabled(),
    }
}
