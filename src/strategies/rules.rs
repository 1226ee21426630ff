//! Condition tables and the uniform decision rule

use rand::Rng;

use crate::patterns::{Pattern, PatternResult};
use crate::probability::probability_percent;
use crate::types::{IndicatorSnapshot, Signal, SignalDecision};

use super::Timeframe;

/// EMA line referenced by a predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmaLine {
    Ema20,
    Ema50,
    Ema200,
}

impl EmaLine {
    fn value(self, snap: &IndicatorSnapshot) -> Option<f64> {
        match self {
            EmaLine::Ema20 => snap.ema20,
            EmaLine::Ema50 => Some(snap.ema50),
            EmaLine::Ema200 => Some(snap.ema200),
        }
    }
}

/// Boolean test over a snapshot and the detected pattern
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Predicate {
    EmaAbove(EmaLine, EmaLine),
    EmaBelow(EmaLine, EmaLine),
    RsiBelow(f64),
    RsiAbove(f64),
    /// Inclusive on both ends
    RsiWithin(f64, f64),
    Pattern(Pattern),
    PriceAbove(EmaLine),
    PriceBelow(EmaLine),
}

impl Predicate {
    /// A predicate referencing a missing EMA does not hold
    pub fn holds(&self, snap: &IndicatorSnapshot, pattern: &PatternResult) -> bool {
        match *self {
            Predicate::EmaAbove(a, b) => matches!((a.value(snap), b.value(snap)), (Some(x), Some(y)) if x > y),
            Predicate::EmaBelow(a, b) => matches!((a.value(snap), b.value(snap)), (Some(x), Some(y)) if x < y),
            Predicate::RsiBelow(level) => snap.rsi14 < level,
            Predicate::RsiAbove(level) => snap.rsi14 > level,
            Predicate::RsiWithin(low, high) => snap.rsi14 >= low && snap.rsi14 <= high,
            Predicate::Pattern(Pattern::BullishEngulfing) => pattern.is_bullish_engulfing,
            Predicate::Pattern(Pattern::BearishEngulfing) => pattern.is_bearish_engulfing,
            Predicate::Pattern(Pattern::None) => false,
            Predicate::PriceAbove(line) => line.value(snap).is_some_and(|ema| snap.price > ema),
            Predicate::PriceBelow(line) => line.value(snap).is_some_and(|ema| snap.price < ema),
        }
    }
}

/// Labelled predicate worth one point
#[derive(Debug, Clone, Copy)]
pub struct Condition {
    pub label: &'static str,
    pub predicate: Predicate,
}

/// Per-timeframe BUY and SELL condition lists
#[derive(Debug)]
pub struct RuleSet {
    pub timeframe: Timeframe,
    pub buy: &'static [Condition],
    pub sell: &'static [Condition],
    /// Extra missed conditions the SELL side tolerates beyond the BUY side
    pub sell_slack: usize,
}

/// Satisfied labels on each side
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub buy_reasons: Vec<String>,
    pub sell_reasons: Vec<String>,
}

fn satisfied(conditions: &[Condition], snap: &IndicatorSnapshot, pattern: &PatternResult) -> Vec<String> {
    conditions
        .iter()
        .filter(|c| c.predicate.holds(snap, pattern))
        .map(|c| c.label.to_string())
        .collect()
}

impl RuleSet {
    pub fn total(&self) -> usize {
        self.buy.len()
    }

    pub fn evaluate(&self, snap: &IndicatorSnapshot, pattern: &PatternResult) -> Evaluation {
        Evaluation {
            buy_reasons: satisfied(self.buy, snap, pattern),
            sell_reasons: satisfied(self.sell, snap, pattern),
        }
    }

    /// Signal and conditions-met count, before the probability draw
    pub fn classify(&self, evaluation: &Evaluation) -> (Signal, usize) {
        let total = self.total();
        let buy_met = evaluation.buy_reasons.len();
        let sell_met = evaluation.sell_reasons.len();

        if buy_met + 1 >= total {
            (Signal::Buy, buy_met)
        } else if sell_met + 1 + self.sell_slack >= total {
            (Signal::Sell, sell_met)
        } else {
            (Signal::Neutral, buy_met.max(sell_met))
        }
    }

    pub fn decide<R: Rng>(
        &self,
        snap: &IndicatorSnapshot,
        pattern: &PatternResult,
        rng: &mut R,
    ) -> SignalDecision {
        let evaluation = self.evaluate(snap, pattern);
        let (signal, conditions_met) = self.classify(&evaluation);
        let total = self.total();

        let buy_met = evaluation.buy_reasons.len();
        let sell_met = evaluation.sell_reasons.len();

        let reasons = match signal {
            Signal::Buy => evaluation.buy_reasons,
            Signal::Sell => evaluation.sell_reasons,
            Signal::Neutral => {
                let mut both = evaluation.buy_reasons;
                both.extend(evaluation.sell_reasons);
                both
            }
        };

        SignalDecision {
            timeframe: self.timeframe,
            signal,
            conditions_met,
            total_conditions: total,
            buy_met,
            sell_met,
            reasons,
            probability_percent: probability_percent(signal, conditions_met, total, rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap() -> IndicatorSnapshot {
        IndicatorSnapshot {
            price: 100.0,
            ema20: Some(99.0),
            ema50: 98.0,
            ema200: 97.0,
            rsi14: 45.0,
            atr_current: 1.0,
            atr_baseline: 1.0,
            swing_low: None,
            swing_high: None,
        }
    }

    #[test]
    fn test_missing_ema_never_holds() {
        let mut s = snap();
        s.ema20 = None;
        let pattern = PatternResult::default();
        assert!(!Predicate::EmaAbove(EmaLine::Ema20, EmaLine::Ema50).holds(&s, &pattern));
        assert!(!Predicate::EmaBelow(EmaLine::Ema20, EmaLine::Ema50).holds(&s, &pattern));
        assert!(!Predicate::PriceAbove(EmaLine::Ema20).holds(&s, &pattern));
        assert!(Predicate::PriceAbove(EmaLine::Ema50).holds(&s, &pattern));
    }

    #[test]
    fn test_rsi_within_is_inclusive() {
        let mut s = snap();
        let pattern = PatternResult::default();
        let within = Predicate::RsiWithin(40.0, 55.0);
        s.rsi14 = 40.0;
        assert!(within.holds(&s, &pattern));
        s.rsi14 = 55.0;
        assert!(within.holds(&s, &pattern));
        s.rsi14 = 55.01;
        assert!(!within.holds(&s, &pattern));
    }

    #[test]
    fn test_pattern_predicates() {
        let s = snap();
        let bullish = PatternResult::from(Pattern::BullishEngulfing);
        assert!(Predicate::Pattern(Pattern::BullishEngulfing).holds(&s, &bullish));
        assert!(!Predicate::Pattern(Pattern::BearishEngulfing).holds(&s, &bullish));
        assert!(!Predicate::Pattern(Pattern::None).holds(&s, &PatternResult::default()));
    }
}
