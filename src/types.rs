//! Core data types used across the signal engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::patterns::PatternResult;
use crate::strategies::Timeframe;

/// Validation errors for candle data
#[derive(Debug, Error, PartialEq)]
pub enum CandleValidationError {
    #[error("high ({high}) must be >= low ({low})")]
    HighLessThanLow { high: f64, low: f64 },

    #[error("volume ({0}) must be >= 0")]
    NegativeVolume(f64),

    #[error("open ({open}) must be between low ({low}) and high ({high})")]
    OpenOutOfRange { open: f64, low: f64, high: f64 },

    #[error("close ({close}) must be between low ({low}) and high ({high})")]
    CloseOutOfRange { close: f64, low: f64, high: f64 },

    #[error("prices must be positive and finite: open={open}, high={high}, low={low}, close={close}")]
    InvalidPrice {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
}

/// OHLC candlestick; forex feeds usually carry no volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub datetime: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl Candle {
    /// Create a new candle with validation
    pub fn new(
        datetime: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    ) -> Result<Self, CandleValidationError> {
        let candle = Self::new_unchecked(datetime, open, high, low, close);
        candle.validate()?;
        Ok(candle)
    }

    /// Create a candle without validation (for trusted sources or when validation is done separately)
    pub fn new_unchecked(datetime: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            datetime,
            open,
            high,
            low,
            close,
            volume: 0.0,
        }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = volume;
        self
    }

    /// Validate the candle data
    pub fn validate(&self) -> Result<(), CandleValidationError> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(CandleValidationError::InvalidPrice {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }

        if self.high < self.low {
            return Err(CandleValidationError::HighLessThanLow {
                high: self.high,
                low: self.low,
            });
        }

        if self.volume < 0.0 {
            return Err(CandleValidationError::NegativeVolume(self.volume));
        }

        if self.open < self.low || self.open > self.high {
            return Err(CandleValidationError::OpenOutOfRange {
                open: self.open,
                low: self.low,
                high: self.high,
            });
        }

        if self.close < self.low || self.close > self.high {
            return Err(CandleValidationError::CloseOutOfRange {
                close: self.close,
                low: self.low,
                high: self.high,
            });
        }

        Ok(())
    }
}

// The `ta` indicators read bars through these accessor traits.
impl ta::High for Candle {
    fn high(&self) -> f64 {
        self.high
    }
}

impl ta::Low for Candle {
    fn low(&self) -> f64 {
        self.low
    }
}

impl ta::Close for Candle {
    fn close(&self) -> f64 {
        self.close
    }
}

/// Instrument symbol as the data provider names it, e.g. `XAU/USD`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(s: impl Into<String>) -> Self {
        Symbol(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Symbol without separators, usable in file names (`XAU/USD` -> `XAUUSD`)
    pub fn compact(&self) -> String {
        self.0.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trading signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Neutral,
}

impl Signal {
    pub fn is_directional(&self) -> bool {
        !matches!(self, Signal::Neutral)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::Neutral => "NEUTRAL",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" | "BULLISH" => Ok(Signal::Buy),
            "SELL" | "BEARISH" => Ok(Signal::Sell),
            "NEUTRAL" | "" => Ok(Signal::Neutral),
            other => Err(format!("unknown signal: {}", other)),
        }
    }
}

/// EMA-stack trend classification used for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Trend::Bullish => "BULLISH",
            Trend::Bearish => "BEARISH",
            Trend::Neutral => "NEUTRAL",
        };
        f.write_str(s)
    }
}

/// Point-in-time indicator values for one analysis call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub price: f64,
    pub ema20: Option<f64>,
    pub ema50: f64,
    pub ema200: f64,
    pub rsi14: f64,
    pub atr_current: f64,
    pub atr_baseline: f64,
    pub swing_low: Option<f64>,
    pub swing_high: Option<f64>,
}

impl IndicatorSnapshot {
    pub fn trend(&self) -> Trend {
        match self.ema20 {
            Some(ema20) if ema20 > self.ema50 && self.ema50 > self.ema200 => Trend::Bullish,
            Some(ema20) if ema20 < self.ema50 && self.ema50 < self.ema200 => Trend::Bearish,
            _ => Trend::Neutral,
        }
    }

    /// Current ATR relative to its baseline, 1.0 when the baseline is unusable
    pub fn atr_ratio(&self) -> f64 {
        if self.atr_baseline > 0.0 {
            self.atr_current / self.atr_baseline
        } else {
            1.0
        }
    }

    /// Absolute fractional distance of price from EMA200
    pub fn ema200_deviation(&self) -> f64 {
        if self.ema200 > 0.0 {
            (self.price - self.ema200).abs() / self.ema200
        } else {
            0.0
        }
    }
}

/// Outcome of a strategy rule set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDecision {
    pub timeframe: Timeframe,
    pub signal: Signal,
    pub conditions_met: usize,
    pub total_conditions: usize,
    pub buy_met: usize,
    pub sell_met: usize,
    pub reasons: Vec<String>,
    pub probability_percent: u8,
}

/// Full result of one analysis invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub candle_time: DateTime<Utc>,
    pub snapshot: IndicatorSnapshot,
    pub pattern: PatternResult,
    pub decision: SignalDecision,
    pub risk: crate::risk::RiskAssessment,
    pub levels: Option<crate::levels::TradeLevels>,
}
