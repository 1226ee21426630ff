//! Strategy Rule Sets
//!
//! One rule table per timeframe, dispatched through [`Timeframe`]. Each table
//! holds its BUY and SELL conditions as data; the decision rule is shared.

pub mod rules;
pub mod tables;

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::patterns::PatternResult;
use crate::types::{IndicatorSnapshot, SignalDecision};

pub use rules::{Condition, EmaLine, Evaluation, Predicate, RuleSet};

/// Supported analysis timeframes, named as the data provider names intervals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "3min")]
    ThreeMin,
    #[serde(rename = "15min")]
    FifteenMin,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1day")]
    OneDay,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [
        Timeframe::ThreeMin,
        Timeframe::FifteenMin,
        Timeframe::OneHour,
        Timeframe::OneDay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::ThreeMin => "3min",
            Timeframe::FifteenMin => "15min",
            Timeframe::OneHour => "1h",
            Timeframe::OneDay => "1day",
        }
    }

    pub fn rule_set(&self) -> &'static RuleSet {
        match self {
            Timeframe::ThreeMin => &tables::THREE_MIN,
            Timeframe::FifteenMin => &tables::FIFTEEN_MIN,
            Timeframe::OneHour => &tables::ONE_HOUR,
            Timeframe::OneDay => &tables::ONE_DAY,
        }
    }

    /// Apply this timeframe's rule set
    pub fn decide<R: Rng>(
        &self,
        snap: &IndicatorSnapshot,
        pattern: &PatternResult,
        rng: &mut R,
    ) -> SignalDecision {
        self.rule_set().decide(snap, pattern, rng)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "3min" | "3m" => Ok(Timeframe::ThreeMin),
            "15min" | "15m" => Ok(Timeframe::FifteenMin),
            "1h" | "60min" => Ok(Timeframe::OneHour),
            "1day" | "1d" => Ok(Timeframe::OneDay),
            other => Err(format!("Unknown interval: {}", other)),
        }
    }
}
