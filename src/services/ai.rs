//! Client for the AI (confidence prediction) service

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{SignalError, SignalResult};
use crate::types::Signal;

const SERVICE: &str = "AI";

/// The model rejects shorter inputs
pub const MIN_PREDICT_CLOSES: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiPrediction {
    pub signal: String,
    pub confidence: f64,
    #[serde(default)]
    pub raw_prediction: f64,
}

impl AiPrediction {
    pub fn inconclusive() -> Self {
        Self {
            signal: Signal::Neutral.to_string(),
            confidence: 0.0,
            raw_prediction: 0.0,
        }
    }

    pub fn signal(&self) -> Signal {
        self.signal.parse().unwrap_or(Signal::Neutral)
    }

    /// Confidence clamped into [0, 1]
    pub fn confidence(&self) -> f64 {
        if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    closes: &'a [f64],
    normalize: bool,
}

#[derive(Debug, Clone)]
pub struct AiClient {
    client: Client,
    base_url: String,
}

impl AiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> SignalResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SignalError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// POST chronological closes to `/predict`
    pub async fn predict(&self, closes: &[f64]) -> SignalResult<AiPrediction> {
        if closes.len() < MIN_PREDICT_CLOSES {
            return Err(SignalError::external(
                SERVICE,
                format!(
                    "need at least {} closes, got {}",
                    MIN_PREDICT_CLOSES,
                    closes.len()
                ),
            ));
        }

        let url = format!("{}/predict", self.base_url);
        debug!("Requesting AI prediction for {} closes", closes.len());

        let response = self
            .client
            .post(&url)
            .json(&PredictRequest {
                closes,
                normalize: true,
            })
            .send()
            .await
            .map_err(|e| SignalError::external(SERVICE, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SignalError::external(SERVICE, format!("{}: {}", status, body)));
        }

        response
            .json::<AiPrediction>()
            .await
            .map_err(|e| SignalError::external(SERVICE, format!("malformed response: {}", e)))
    }
}
