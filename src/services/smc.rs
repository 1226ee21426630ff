//! Client for the SMC (market structure) service

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{SignalError, SignalResult};
use crate::types::{Candle, Signal};

const SERVICE: &str = "SMC";

/// Order block or fair-value gap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub high: f64,
    pub low: f64,
}

impl Zone {
    /// Bounds are inclusive and tolerate swapped high/low
    pub fn contains(&self, price: f64) -> bool {
        let (low, high) = if self.low <= self.high {
            (self.low, self.high)
        } else {
            (self.high, self.low)
        };
        price >= low && price <= high
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmcReport {
    #[serde(default)]
    pub trend: String,
    #[serde(default)]
    pub bos: serde_json::Value,
    #[serde(default)]
    pub choch: serde_json::Value,
    #[serde(default)]
    pub fvg_zones: Vec<Zone>,
    #[serde(default)]
    pub order_blocks: Vec<Zone>,
    #[serde(default)]
    pub liquidity_swept: bool,
    pub bias: String,
    pub entry: Option<f64>,
    pub sl: Option<f64>,
    pub tp: Option<f64>,
    #[serde(default)]
    pub explanation: String,
}

impl SmcReport {
    /// Stand-in used when the service could not be consulted
    pub fn inconclusive(reason: impl Into<String>) -> Self {
        Self {
            trend: "NEUTRAL".to_string(),
            bos: serde_json::Value::Null,
            choch: serde_json::Value::Null,
            fvg_zones: Vec::new(),
            order_blocks: Vec::new(),
            liquidity_swept: false,
            bias: "NEUTRAL".to_string(),
            entry: None,
            sl: None,
            tp: None,
            explanation: reason.into(),
        }
    }

    /// Bias as a signal; unrecognised labels count as NEUTRAL
    pub fn bias_signal(&self) -> Signal {
        self.bias.parse().unwrap_or(Signal::Neutral)
    }

    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.order_blocks.iter().chain(self.fvg_zones.iter())
    }

    pub fn price_in_zone(&self, price: f64) -> bool {
        self.zones().any(|zone| zone.contains(price))
    }
}

#[derive(Debug, Serialize)]
struct SmcRequest {
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
}

impl From<&[Candle]> for SmcRequest {
    fn from(candles: &[Candle]) -> Self {
        Self {
            open: candles.iter().map(|c| c.open).collect(),
            high: candles.iter().map(|c| c.high).collect(),
            low: candles.iter().map(|c| c.low).collect(),
            close: candles.iter().map(|c| c.close).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmcClient {
    client: Client,
    base_url: String,
}

impl SmcClient {
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

    /// POST the OHLC arrays to `/smc`
    pub async fn analyze(&self, candles: &[Candle]) -> SignalResult<SmcReport> {
        let url = format!("{}/smc", self.base_url);
        debug!("Requesting SMC analysis for {} candles", candles.len());

        let response = self
            .client
            .post(&url)
            .json(&SmcRequest::from(candles))
            .send()
            .await
            .map_err(|e| SignalError::external(SERVICE, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SignalError::external(SERVICE, format!("{}: {}", status, body)));
        }

        response
            .json::<SmcReport>()
            .await
            .map_err(|e| SignalError::external(SERVICE, format!("malformed response: {}", e)))
    }
}
