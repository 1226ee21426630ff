//! Analysis pipeline
//!
//! Candles -> indicator snapshot + pattern -> rule-set decision -> risk
//! assessment -> trade levels. Each call is independent; the only input
//! besides the candles is the random source for display jitter.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SignalError, SignalResult};
use crate::indicators::{
    self, DEFAULT_ATR_PERIOD, DEFAULT_RSI_PERIOD, DEFAULT_SWING_LOOKBACK,
};
use crate::levels::{trade_levels, DEFAULT_RISK_REWARD};
use crate::patterns;
use crate::risk::{self, RiskConfig};
use crate::strategies::Timeframe;
use crate::types::{AnalysisReport, Candle, IndicatorSnapshot, Symbol};

pub const LONG_EMA_PERIOD: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    #[serde(default = "default_atr_period")]
    pub atr_period: usize,

    /// Candles scanned for swing extremes (default: 10)
    #[serde(default = "default_swing_lookback")]
    pub swing_lookback: usize,

    /// Take-profit distance as a multiple of the stop distance (default: 2.0)
    #[serde(default = "default_risk_reward")]
    pub risk_reward: f64,

    #[serde(default)]
    pub risk: RiskConfig,
}

fn default_rsi_period() -> usize {
    DEFAULT_RSI_PERIOD
}
fn default_atr_period() -> usize {
    DEFAULT_ATR_PERIOD
}
fn default_swing_lookback() -> usize {
    DEFAULT_SWING_LOOKBACK
}
fn default_risk_reward() -> f64 {
    DEFAULT_RISK_REWARD
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            rsi_period: default_rsi_period(),
            atr_period: default_atr_period(),
            swing_lookback: default_swing_lookback(),
            risk_reward: default_risk_reward(),
            risk: RiskConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Fewest candles a full analysis can run on
    pub fn min_candles(&self) -> usize {
        LONG_EMA_PERIOD
            .max(self.rsi_period + 1)
            .max(self.atr_period + 1)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Compute every indicator the rule sets and risk scorer read
    pub fn snapshot(&self, candles: &[Candle]) -> SignalResult<IndicatorSnapshot> {
        let price = candles
            .last()
            .map(|c| c.close)
            .ok_or_else(|| SignalError::insufficient("candles", self.config.min_candles(), 0))?;

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

        let ema200 = indicators::ema(&closes, LONG_EMA_PERIOD)?;
        let ema50 = indicators::ema(&closes, 50)?;
        let ema20 = indicators::ema(&closes, 20).ok();
        let rsi14 = indicators::rsi(&closes, self.config.rsi_period)?;

        let atr = indicators::atr_series(candles, self.config.atr_period)?;
        let atr_current = atr.last().copied().unwrap_or_default();
        let atr_baseline = indicators::atr_baseline(&atr, self.config.risk.atr_baseline_lookback);

        let swings = indicators::swing_levels(candles, self.config.swing_lookback);

        Ok(IndicatorSnapshot {
            price,
            ema20,
            ema50,
            ema200,
            rsi14,
            atr_current,
            atr_baseline,
            swing_low: swings.swing_low,
            swing_high: swings.swing_high,
        })
    }

    /// Run the full pipeline on a chronological series
    pub fn analyze<R: Rng>(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        candles: &[Candle],
        rng: &mut R,
    ) -> SignalResult<AnalysisReport> {
        let snapshot = self.snapshot(candles)?;
        let candle_time = candles
            .last()
            .map(|c| c.datetime)
            .ok_or_else(|| SignalError::insufficient("candles", 1, 0))?;

        let pattern = patterns::detect_latest(candles);
        let decision = timeframe.decide(&snapshot, &pattern, rng);
        let risk = risk::assess(&snapshot, &decision, &self.config.risk, rng);

        let swings = indicators::SwingLevels {
            swing_low: snapshot.swing_low,
            swing_high: snapshot.swing_high,
        };
        let levels = trade_levels(
            decision.signal,
            snapshot.price,
            swings,
            risk.safe_trade,
            self.config.risk_reward,
        );

        debug!(
            "{} {}: signal={} met={}/{} risk_score={:.1} safe={}",
            symbol,
            timeframe,
            decision.signal,
            decision.conditions_met,
            decision.total_conditions,
            risk.risk_score,
            risk.safe_trade
        );

        Ok(AnalysisReport {
            symbol: symbol.clone(),
            timeframe,
            candle_time,
            snapshot,
            pattern,
            decision,
            risk,
            levels,
        })
    }
}
