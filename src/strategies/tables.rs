//! Condition tables for the supported timeframes

use crate::patterns::Pattern as Shape;

use super::rules::{Condition, EmaLine::*, Predicate, Predicate::*, RuleSet};
use super::Timeframe;

const fn cond(label: &'static str, predicate: Predicate) -> Condition {
    Condition { label, predicate }
}

pub static THREE_MIN: RuleSet = RuleSet {
    timeframe: Timeframe::ThreeMin,
    buy: &[
        cond("EMA20 > EMA50", EmaAbove(Ema20, Ema50)),
        cond("RSI < 25", RsiBelow(25.0)),
        cond("Bullish Engulfing", Pattern(Shape::BullishEngulfing)),
        cond("Price above EMA20", PriceAbove(Ema20)),
    ],
    sell: &[
        cond("EMA20 < EMA50", EmaBelow(Ema20, Ema50)),
        cond("RSI > 75", RsiAbove(75.0)),
        cond("Bearish Engulfing", Pattern(Shape::BearishEngulfing)),
        cond("Price below EMA20", PriceBelow(Ema20)),
    ],
    sell_slack: 0,
};

pub static FIFTEEN_MIN: RuleSet = RuleSet {
    timeframe: Timeframe::FifteenMin,
    buy: &[
        cond("EMA50 > EMA200", EmaAbove(Ema50, Ema200)),
        cond("EMA20 > EMA50", EmaAbove(Ema20, Ema50)),
        cond("RSI < 30", RsiBelow(30.0)),
        cond("Bullish Engulfing", Pattern(Shape::BullishEngulfing)),
        cond("Price above EMA20", PriceAbove(Ema20)),
    ],
    sell: &[
        cond("EMA50 < EMA200", EmaBelow(Ema50, Ema200)),
        cond("EMA20 < EMA50", EmaBelow(Ema20, Ema50)),
        cond("RSI > 70", RsiAbove(70.0)),
        cond("Bearish Engulfing", Pattern(Shape::BearishEngulfing)),
        cond("Price below EMA20", PriceBelow(Ema20)),
    ],
    // SELL is accepted at 3 of 5 while BUY needs 4 of 5
    sell_slack: 1,
};

pub static ONE_HOUR: RuleSet = RuleSet {
    timeframe: Timeframe::OneHour,
    buy: &[
        cond("EMA20 > EMA50", EmaAbove(Ema20, Ema50)),
        cond("EMA50 > EMA200", EmaAbove(Ema50, Ema200)),
        cond("RSI between 40–55", RsiWithin(40.0, 55.0)),
        cond("Bullish pattern", Pattern(Shape::BullishEngulfing)),
    ],
    sell: &[
        cond("EMA20 < EMA50", EmaBelow(Ema20, Ema50)),
        cond("EMA50 < EMA200", EmaBelow(Ema50, Ema200)),
        cond("RSI between 45–60", RsiWithin(45.0, 60.0)),
        cond("Bearish pattern", Pattern(Shape::BearishEngulfing)),
    ],
    sell_slack: 0,
};

pub static ONE_DAY: RuleSet = RuleSet {
    timeframe: Timeframe::OneDay,
    buy: &[
        cond("EMA50 > EMA200", EmaAbove(Ema50, Ema200)),
        cond("RSI < 40", RsiBelow(40.0)),
        cond("Bullish Engulfing", Pattern(Shape::BullishEngulfing)),
        cond("Price above EMA50", PriceAbove(Ema50)),
    ],
    sell: &[
        cond("EMA50 < EMA200", EmaBelow(Ema50, Ema200)),
        cond("RSI > 60", RsiAbove(60.0)),
        cond("Bearish Engulfing", Pattern(Shape::BearishEngulfing)),
        cond("Price below EMA50", PriceBelow(Ema50)),
    ],
    sell_slack: 0,
};
