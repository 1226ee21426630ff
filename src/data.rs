//! Market data loading
//!
//! A [`SeriesLoader`] returns a chronological candle series for one symbol and
//! interval. Two implementations are provided: the TwelveData REST API and a
//! directory of CSV files. Both reject unordered series and, when a sanity
//! bound is configured, any close outside it.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{SignalError, SignalResult};
use crate::strategies::Timeframe;
use crate::types::{Candle, Symbol};

// =============================================================================
// Constants
// =============================================================================

pub const TWELVEDATA_API_BASE: &str = "https://api.twelvedata.com";

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataProvider {
    #[default]
    TwelveData,
    Csv,
}

/// Accepted close range; anything outside is treated as a corrupt feed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBounds {
    pub min: f64,
    pub max: f64,
}

impl PriceBounds {
    pub fn contains(&self, price: f64) -> bool {
        price >= self.min && price <= self.max
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default)]
    pub provider: DataProvider,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Usually supplied through TWELVEDATA_KEY
    #[serde(default)]
    pub api_key: Option<String>,

    /// Candles requested per call (default: 300)
    #[serde(default = "default_outputsize")]
    pub outputsize: usize,

    /// Directory of `{SYMBOL}_{interval}.csv` files for the CSV provider
    #[serde(default = "default_csv_dir")]
    pub csv_dir: PathBuf,

    #[serde(default)]
    pub price_bounds: Option<PriceBounds>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_base() -> String {
    TWELVEDATA_API_BASE.to_string()
}
fn default_outputsize() -> usize {
    300
}
fn default_csv_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_timeout_secs() -> u64 {
    15
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            provider: DataProvider::default(),
            api_base: default_api_base(),
            api_key: None,
            outputsize: default_outputsize(),
            csv_dir: default_csv_dir(),
            price_bounds: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

// =============================================================================
// Loader trait
// =============================================================================

pub trait SeriesLoader: Send + Sync {
    /// Chronological series with at least `minimum` candles
    fn load(
        &self,
        symbol: &Symbol,
        interval: Timeframe,
        minimum: usize,
    ) -> impl Future<Output = SignalResult<Vec<Candle>>> + Send;
}

/// Loader selected by configuration
#[derive(Debug, Clone)]
pub enum DataSource {
    TwelveData(TwelveDataClient),
    Csv(CsvLoader),
}

impl DataSource {
    pub fn from_config(config: &DataConfig) -> SignalResult<Self> {
        match config.provider {
            DataProvider::TwelveData => {
                let api_key = config.api_key.clone().ok_or_else(|| {
                    SignalError::Configuration("TwelveData API key is not set".to_string())
                })?;
                Ok(DataSource::TwelveData(TwelveDataClient::new(
                    &config.api_base,
                    api_key,
                    config.outputsize,
                    Duration::from_secs(config.timeout_secs),
                    config.price_bounds,
                )?))
            }
            DataProvider::Csv => Ok(DataSource::Csv(CsvLoader::new(
                &config.csv_dir,
                config.price_bounds,
            ))),
        }
    }
}

impl SeriesLoader for DataSource {
    async fn load(
        &self,
        symbol: &Symbol,
        interval: Timeframe,
        minimum: usize,
    ) -> SignalResult<Vec<Candle>> {
        match self {
            DataSource::TwelveData(client) => client.load(symbol, interval, minimum).await,
            DataSource::Csv(loader) => loader.load(symbol, interval, minimum).await,
        }
    }
}

// =============================================================================
// Series checks
// =============================================================================

/// Reject series that are unordered or breach the price bound
pub fn validate_series(candles: &[Candle], bounds: Option<PriceBounds>) -> SignalResult<()> {
    if let Some(pair) = candles
        .windows(2)
        .find(|pair| pair[1].datetime <= pair[0].datetime)
    {
        return Err(SignalError::DataUnavailable(format!(
            "timestamps not strictly increasing at {}",
            pair[1].datetime
        )));
    }

    if let Some(bounds) = bounds {
        if let Some(candle) = candles.iter().find(|c| !bounds.contains(c.close)) {
            return Err(SignalError::DataUnavailable(format!(
                "close {} at {} outside sanity bound [{}, {}]",
                candle.close, candle.datetime, bounds.min, bounds.max
            )));
        }
    }

    Ok(())
}

fn ensure_minimum(candles: &[Candle], minimum: usize) -> SignalResult<()> {
    if candles.len() < minimum {
        return Err(SignalError::DataUnavailable(format!(
            "need {} candles, got {}",
            minimum,
            candles.len()
        )));
    }
    Ok(())
}

/// Accepts `2024-01-05 13:45:00`, `2024-01-05` and RFC 3339
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .map(|ndt| ndt.and_utc())
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|ndt| ndt.and_utc())
        })
        .or_else(|| s.parse::<DateTime<Utc>>().ok())
}

// =============================================================================
// TwelveData
// =============================================================================

#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    values: Vec<TimeSeriesValue>,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesValue {
    datetime: String,
    open: String,
    high: String,
    low: String,
    close: String,
    #[serde(default)]
    volume: Option<String>,
}

impl TimeSeriesValue {
    fn to_candle(&self) -> SignalResult<Candle> {
        let datetime = parse_datetime(&self.datetime).ok_or_else(|| {
            SignalError::DataUnavailable(format!("unparseable datetime: {}", self.datetime))
        })?;

        let price = |field: &str, raw: &str| -> SignalResult<f64> {
            raw.trim().parse::<f64>().map_err(|_| {
                SignalError::DataUnavailable(format!("bad {} value '{}' at {}", field, raw, datetime))
            })
        };

        let candle = Candle::new(
            datetime,
            price("open", &self.open)?,
            price("high", &self.high)?,
            price("low", &self.low)?,
            price("close", &self.close)?,
        )
        .map_err(|e| SignalError::DataUnavailable(format!("invalid candle at {}: {}", datetime, e)))?;

        let volume = self
            .volume
            .as_deref()
            .and_then(|v| v.trim().parse::<f64>().ok())
            .unwrap_or(0.0);

        Ok(candle.with_volume(volume))
    }
}

/// Decode a `/time_series` body into chronological candles
pub fn parse_time_series(body: &str) -> SignalResult<Vec<Candle>> {
    let response: TimeSeriesResponse = serde_json::from_str(body)
        .map_err(|e| SignalError::DataUnavailable(format!("malformed time series: {}", e)))?;

    if response.status.as_deref() == Some("error") {
        return Err(SignalError::DataUnavailable(
            response
                .message
                .unwrap_or_else(|| "provider returned an error".to_string()),
        ));
    }

    // Provider returns newest first
    response
        .values
        .iter()
        .rev()
        .map(TimeSeriesValue::to_candle)
        .collect()
}

#[derive(Debug, Clone)]
pub struct TwelveDataClient {
    client: Client,
    api_base: String,
    api_key: String,
    outputsize: usize,
    bounds: Option<PriceBounds>,
}

impl TwelveDataClient {
    pub fn new(
        api_base: &str,
        api_key: impl Into<String>,
        outputsize: usize,
        timeout: Duration,
        bounds: Option<PriceBounds>,
    ) -> SignalResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SignalError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            outputsize,
            bounds,
        })
    }

    pub async fn fetch(&self, symbol: &Symbol, interval: Timeframe) -> SignalResult<Vec<Candle>> {
        let url = format!("{}/time_series", self.api_base);
        let params = [
            ("symbol", symbol.as_str().to_string()),
            ("interval", interval.as_str().to_string()),
            ("outputsize", self.outputsize.to_string()),
            ("apikey", self.api_key.clone()),
        ];

        debug!("Fetching {} {} (outputsize={})", symbol, interval, self.outputsize);

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| SignalError::DataUnavailable(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SignalError::DataUnavailable(format!(
                "TwelveData returned {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SignalError::DataUnavailable(format!("failed to read body: {}", e)))?;

        parse_time_series(&body)
    }
}

impl SeriesLoader for TwelveDataClient {
    async fn load(
        &self,
        symbol: &Symbol,
        interval: Timeframe,
        minimum: usize,
    ) -> SignalResult<Vec<Candle>> {
        let candles = self.fetch(symbol, interval).await?;
        validate_series(&candles, self.bounds)?;
        ensure_minimum(&candles, minimum)?;
        debug!("Loaded {} candles for {} {}", candles.len(), symbol, interval);
        Ok(candles)
    }
}

// =============================================================================
// CSV
// =============================================================================

#[derive(Debug, Deserialize)]
struct CsvRow {
    datetime: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<f64>,
}

/// Read a `datetime,open,high,low,close[,volume]` file, sorted chronologically
pub fn load_csv(path: impl AsRef<Path>) -> SignalResult<Vec<Candle>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path).map_err(|e| {
        SignalError::DataUnavailable(format!("failed to open {}: {}", path.display(), e))
    })?;

    let mut candles = Vec::new();
    for (row_idx, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.map_err(|e| {
            SignalError::DataUnavailable(format!("{} row {}: {}", path.display(), row_idx + 1, e))
        })?;

        let datetime = parse_datetime(&row.datetime).ok_or_else(|| {
            SignalError::DataUnavailable(format!(
                "{} row {}: unparseable datetime '{}'",
                path.display(),
                row_idx + 1,
                row.datetime
            ))
        })?;

        let candle = Candle::new(datetime, row.open, row.high, row.low, row.close).map_err(|e| {
            SignalError::DataUnavailable(format!("{} row {}: {}", path.display(), row_idx + 1, e))
        })?;
        candles.push(candle.with_volume(row.volume.unwrap_or(0.0)));
    }

    candles.sort_by_key(|c| c.datetime);
    Ok(candles)
}

#[derive(Debug, Clone)]
pub struct CsvLoader {
    dir: PathBuf,
    bounds: Option<PriceBounds>,
}

impl CsvLoader {
    pub fn new(dir: impl AsRef<Path>, bounds: Option<PriceBounds>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            bounds,
        }
    }

    pub fn path_for(&self, symbol: &Symbol, interval: Timeframe) -> PathBuf {
        self.dir
            .join(format!("{}_{}.csv", symbol.compact(), interval.as_str()))
    }
}

impl SeriesLoader for CsvLoader {
    async fn load(
        &self,
        symbol: &Symbol,
        interval: Timeframe,
        minimum: usize,
    ) -> SignalResult<Vec<Candle>> {
        let path = self.path_for(symbol, interval);
        let candles = load_csv(&path)?;
        validate_series(&candles, self.bounds)?;
        ensure_minimum(&candles, minimum)?;
        info!("Loaded {} candles from {}", candles.len(), path.display());
        Ok(candles)
    }
}
