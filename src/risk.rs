//! Risk scoring
//!
//! Two scoring policies turn an indicator snapshot into a 0-100 risk score:
//!
//! - `distance_from_extremes`: penalises RSI beyond the 30/70 bands, ATR
//!   expansion over its baseline, and distance from EMA200.
//! - `mean_reversion`: penalises distance from EMA200 beyond a pullback band,
//!   RSI away from 50, and ATR ratios outside a healthy range.
//!
//! A trade is considered safe when the score does not exceed
//! `max_risk_allowed`. Separately, the risk level shown to users is bucketed
//! from the number of strategy conditions met.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::indicators::DEFAULT_ATR_BASELINE_LOOKBACK;
use crate::types::{IndicatorSnapshot, Signal, SignalDecision};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskPolicy {
    DistanceFromExtremes,
    #[default]
    MeanReversion,
}

/// Risk scoring configuration using builder pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default)]
    pub policy: RiskPolicy,

    /// Highest score still considered a safe trade (default: 40)
    #[serde(default = "default_max_risk_allowed")]
    pub max_risk_allowed: f64,

    /// ATR values averaged into the baseline (default: 10)
    #[serde(default = "default_atr_baseline_lookback")]
    pub atr_baseline_lookback: usize,

    /// Deviation from EMA200 that carries no risk (default: 0.5%)
    #[serde(default = "default_near_band")]
    pub near_band: f64,

    /// Deviation from EMA200 that scores the full 40 points (default: 1.2%)
    #[serde(default = "default_breakout_band")]
    pub breakout_band: f64,

    #[serde(default = "default_low_atr_ratio")]
    pub low_atr_ratio: f64,

    #[serde(default = "default_high_atr_ratio")]
    pub high_atr_ratio: f64,
}

fn default_max_risk_allowed() -> f64 {
    40.0
}
fn default_atr_baseline_lookback() -> usize {
    DEFAULT_ATR_BASELINE_LOOKBACK
}
fn default_near_band() -> f64 {
    0.005
}
fn default_breakout_band() -> f64 {
    0.012
}
fn default_low_atr_ratio() -> f64 {
    0.8
}
fn default_high_atr_ratio() -> f64 {
    1.8
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            policy: RiskPolicy::default(),
            max_risk_allowed: default_max_risk_allowed(),
            atr_baseline_lookback: default_atr_baseline_lookback(),
            near_band: default_near_band(),
            breakout_band: default_breakout_band(),
            low_atr_ratio: default_low_atr_ratio(),
            high_atr_ratio: default_high_atr_ratio(),
        }
    }
}

impl RiskConfig {
    pub fn with_policy(mut self, policy: RiskPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_risk_allowed(mut self, max_risk: f64) -> Self {
        self.max_risk_allowed = max_risk;
        self
    }

    /// Score a snapshot with the configured policy
    pub fn score(&self, snap: &IndicatorSnapshot) -> f64 {
        match self.policy {
            RiskPolicy::DistanceFromExtremes => score_distance_from_extremes(snap),
            RiskPolicy::MeanReversion => score_mean_reversion(snap, self),
        }
    }

    pub fn is_safe(&self, score: f64) -> bool {
        score <= self.max_risk_allowed
    }
}

// =============================================================================
// Scoring Policies
// =============================================================================

/// RSI beyond 30/70 (40 pts), ATR expansion (35 pts), EMA200 distance (25 pts)
pub fn score_distance_from_extremes(snap: &IndicatorSnapshot) -> f64 {
    let rsi_distance = if snap.rsi14 > 70.0 {
        snap.rsi14 - 70.0
    } else if snap.rsi14 < 30.0 {
        30.0 - snap.rsi14
    } else {
        0.0
    };
    let rsi_score = (rsi_distance / 30.0).min(1.0) * 40.0;

    let atr_score = ((snap.atr_ratio() - 1.0).max(0.0) / 1.5).min(1.0) * 35.0;

    let trend_score = (snap.ema200_deviation() / 0.03).min(1.0) * 25.0;

    (rsi_score + atr_score + trend_score).clamp(0.0, 100.0)
}

/// EMA200 pullback distance (40 pts), RSI off-centre (35 pts), ATR out of range (25 pts).
///
/// Rounded to one decimal.
pub fn score_mean_reversion(snap: &IndicatorSnapshot, config: &RiskConfig) -> f64 {
    let deviation = snap.ema200_deviation();
    let deviation_range = (config.breakout_band - config.near_band).max(0.0001);
    let deviation_penalty = (deviation - config.near_band).max(0.0);
    let deviation_score = (deviation_penalty / deviation_range).min(1.0) * 40.0;

    // outside the 40-60 zone adds risk
    let rsi_mid_distance = ((snap.rsi14 - 50.0).abs() - 10.0).max(0.0);
    let rsi_score = (rsi_mid_distance / 40.0).min(1.0) * 35.0;

    let atr_ratio = snap.atr_ratio();
    let atr_score = if atr_ratio < config.low_atr_ratio {
        ((config.low_atr_ratio - atr_ratio) / config.low_atr_ratio).min(1.0) * 25.0
    } else if atr_ratio > config.high_atr_ratio {
        ((atr_ratio - config.high_atr_ratio) / config.high_atr_ratio).min(1.0) * 25.0
    } else {
        0.0
    };

    let raw = (deviation_score + rsi_score + atr_score).clamp(0.0, 100.0);
    (raw * 10.0).round() / 10.0
}

// =============================================================================
// Risk Level Bucketing
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RiskLevel {
    /// Inclusive percent sub-range shown for the bucket
    pub fn percent_range(&self) -> (u8, u8) {
        match self {
            RiskLevel::Low => (10, 25),
            RiskLevel::Medium => (25, 50),
            RiskLevel::High => (50, 80),
            RiskLevel::VeryHigh => (80, 95),
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::VeryHigh => "Very High",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskDirection {
    Buy,
    Sell,
    Undefined,
}

impl fmt::Display for RiskDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskDirection::Buy => "BUY",
            RiskDirection::Sell => "SELL",
            RiskDirection::Undefined => "UNDEFINED",
        };
        f.write_str(s)
    }
}

/// NEUTRAL decisions draw from a wider range before clamping into Very High
const NEUTRAL_PERCENT_RANGE: (u8, u8) = (70, 95);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub risk_direction: RiskDirection,
    pub risk_percent: u8,
    pub safe_trade: bool,
}

/// Bucket a decision by how many conditions its side met
pub fn classify(decision: &SignalDecision) -> (RiskLevel, RiskDirection) {
    if decision.signal == Signal::Neutral {
        return (RiskLevel::VeryHigh, RiskDirection::Undefined);
    }

    let direction = if decision.buy_met > decision.sell_met {
        RiskDirection::Buy
    } else if decision.sell_met > decision.buy_met {
        RiskDirection::Sell
    } else {
        RiskDirection::Undefined
    };

    let met = match direction {
        RiskDirection::Buy => decision.buy_met,
        _ => decision.sell_met,
    };
    let total = decision.total_conditions;

    let level = if met == total || (total == 5 && met == 4) {
        RiskLevel::Low
    } else if total == 5 && met == 3 {
        RiskLevel::Medium
    } else if (total == 4 || total == 5) && (met == 1 || met == 2) {
        RiskLevel::High
    } else {
        RiskLevel::VeryHigh
    };

    (level, direction)
}

/// Combine the policy score with the condition-count bucket
pub fn assess<R: Rng>(
    snap: &IndicatorSnapshot,
    decision: &SignalDecision,
    config: &RiskConfig,
    rng: &mut R,
) -> RiskAssessment {
    let risk_score = config.score(snap);
    let (risk_level, risk_direction) = classify(decision);

    let (low, high) = if decision.signal == Signal::Neutral {
        NEUTRAL_PERCENT_RANGE
    } else {
        risk_level.percent_range()
    };
    let (min, max) = risk_level.percent_range();
    let risk_percent = rng.gen_range(low..=high).clamp(min, max);

    RiskAssessment {
        risk_score,
        risk_level,
        risk_direction,
        risk_percent,
        safe_trade: config.is_safe(risk_score),
    }
}
