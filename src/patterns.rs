//! Candlestick pattern detection

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Pattern {
    #[default]
    None,
    BullishEngulfing,
    BearishEngulfing,
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Pattern::None => "NONE",
            Pattern::BullishEngulfing => "Bullish Engulfing",
            Pattern::BearishEngulfing => "Bearish Engulfing",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PatternResult {
    pub pattern: Pattern,
    pub is_bullish_engulfing: bool,
    pub is_bearish_engulfing: bool,
}

impl From<Pattern> for PatternResult {
    fn from(pattern: Pattern) -> Self {
        Self {
            pattern,
            is_bullish_engulfing: pattern == Pattern::BullishEngulfing,
            is_bearish_engulfing: pattern == Pattern::BearishEngulfing,
        }
    }
}

/// Classify the two most recent candles, given most-recent-first.
///
/// Returns `Pattern::None` when fewer than two candles are supplied.
pub fn detect_engulfing(recent_first: &[Candle]) -> PatternResult {
    match recent_first {
        [current, previous, ..] => classify(current, previous).into(),
        _ => PatternResult::default(),
    }
}

/// Detect the pattern formed by the last two candles of a chronological series
pub fn detect_latest(candles: &[Candle]) -> PatternResult {
    match candles {
        [.., previous, current] => classify(current, previous).into(),
        _ => PatternResult::default(),
    }
}

fn classify(current: &Candle, previous: &Candle) -> Pattern {
    let bullish = current.close > previous.open
        && current.open < previous.close
        && current.close > previous.close
        && current.open < previous.open;

    let bearish = current.close < previous.open
        && current.open > previous.close
        && current.close < previous.close
        && current.open > previous.open;

    // bullish needs current.close > previous.close, bearish the opposite
    if bullish {
        Pattern::BullishEngulfing
    } else if bearish {
        Pattern::BearishEngulfing
    } else {
        Pattern::None
    }
}
