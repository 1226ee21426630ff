//! Stop-loss and take-profit derivation

use serde::{Deserialize, Serialize};

use crate::indicators::SwingLevels;
use crate::types::Signal;

pub const DEFAULT_RISK_REWARD: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeLevels {
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

/// Levels for a directional, safe signal anchored on the opposite swing.
///
/// BUY stops at the swing low and targets `risk_reward` times the distance
/// above entry; SELL mirrors this on the swing high. Returns `None` when the
/// trade is unsafe, the signal is NEUTRAL, or the swing sits on the wrong side
/// of price.
pub fn trade_levels(
    signal: Signal,
    price: f64,
    swings: SwingLevels,
    safe_trade: bool,
    risk_reward: f64,
) -> Option<TradeLevels> {
    if !safe_trade {
        return None;
    }

    match signal {
        Signal::Buy => {
            let swing_low = swings.swing_low.filter(|&low| price > low)?;
            let risk = price - swing_low;
            Some(TradeLevels {
                entry: price,
                stop_loss: swing_low,
                take_profit: price + risk * risk_reward,
            })
        }
        Signal::Sell => {
            let swing_high = swings.swing_high.filter(|&high| price < high)?;
            let risk = swing_high - price;
            Some(TradeLevels {
                entry: price,
                stop_loss: swing_high,
                take_profit: price - risk * risk_reward,
            })
        }
        Signal::Neutral => None,
    }
}
