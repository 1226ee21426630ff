//! Technical indicators
//!
//! EMA, RSI and ATR are computed the way the reference bots compute them so
//! that values agree numerically: EMA is seeded with the SMA of the first
//! `period` closes, RSI and ATR use Wilder smoothing seeded with a simple mean.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use ta::indicators::TrueRange;
use ta::Next;

use crate::error::{SignalError, SignalResult};
use crate::types::Candle;

pub const DEFAULT_RSI_PERIOD: usize = 14;
pub const DEFAULT_ATR_PERIOD: usize = 14;
pub const DEFAULT_SWING_LOOKBACK: usize = 10;
pub const DEFAULT_ATR_BASELINE_LOOKBACK: usize = 10;

// =============================================================================
// Moving Averages
// =============================================================================

/// Exponential moving average of `closes`, returning the final value.
///
/// Seeded with the arithmetic mean of the first `period` closes, then
/// `ema = (close - ema) * 2 / (period + 1) + ema` for every later close.
pub fn ema(closes: &[f64], period: usize) -> SignalResult<f64> {
    if period == 0 || closes.len() < period {
        return Err(SignalError::insufficient("EMA", period.max(1), closes.len()));
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let seed = closes[..period].iter().sum::<f64>() / period as f64;

    Ok(closes[period..]
        .iter()
        .fold(seed, |prev, &close| (close - prev) * multiplier + prev))
}

// =============================================================================
// Momentum
// =============================================================================

/// Relative Strength Index with Wilder smoothing
pub fn rsi(closes: &[f64], period: usize) -> SignalResult<f64> {
    if period == 0 || closes.len() <= period {
        return Err(SignalError::insufficient("RSI", period + 1, closes.len()));
    }

    let (gains, losses): (Vec<f64>, Vec<f64>) = closes
        .windows(2)
        .map(|w| {
            let change = w[1] - w[0];
            (change.max(0.0), (-change).max(0.0))
        })
        .unzip();

    let p = period as f64;
    let mut avg_gain = gains[..period].iter().sum::<f64>() / p;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / p;

    for (gain, loss) in gains[period..].iter().zip(&losses[period..]) {
        avg_gain = (avg_gain * (p - 1.0) + gain) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss) / p;
    }

    if avg_loss == 0.0 {
        return Ok(100.0);
    }

    let rs = avg_gain / avg_loss;
    Ok(100.0 - 100.0 / (1.0 + rs))
}

// =============================================================================
// Volatility
// =============================================================================

/// True range for every candle after the first
pub fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    let mut tr = TrueRange::new();
    let mut values = Vec::with_capacity(candles.len().saturating_sub(1));

    for (i, candle) in candles.iter().enumerate() {
        let value = tr.next(candle);
        // The first bar has no previous close and only primes the indicator
        if i > 0 {
            values.push(value);
        }
    }

    values
}

/// Wilder-smoothed ATR series, one value per smoothing step after the seed.
///
/// The returned series has `candles.len() - period` entries.
pub fn atr_series(candles: &[Candle], period: usize) -> SignalResult<Vec<f64>> {
    if period == 0 || candles.len() <= period {
        return Err(SignalError::insufficient("ATR", period + 1, candles.len()));
    }

    let tr = true_ranges(candles);
    let p = period as f64;

    let mut atr = tr[..period].iter().sum::<f64>() / p;
    let mut series = Vec::with_capacity(tr.len() - period + 1);
    series.push(atr);

    for value in &tr[period..] {
        atr = (atr * (p - 1.0) + value) / p;
        series.push(atr);
    }

    Ok(series)
}

/// Mean of the last `lookback` ATR values (all of them if fewer)
pub fn atr_baseline(series: &[f64], lookback: usize) -> f64 {
    if series.is_empty() || lookback == 0 {
        return 0.0;
    }
    let start = series.len().saturating_sub(lookback);
    series[start..].iter().mean()
}

// =============================================================================
// Swing Levels
// =============================================================================

/// Trailing-window extremes used as stop-loss anchors
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SwingLevels {
    pub swing_low: Option<f64>,
    pub swing_high: Option<f64>,
}

/// Minimum low and maximum high over the most recent `lookback` candles.
///
/// Both levels are `None` when fewer than `lookback` candles are available.
pub fn swing_levels(candles: &[Candle], lookback: usize) -> SwingLevels {
    if lookback == 0 || candles.len() < lookback {
        return SwingLevels::default();
    }

    let window = &candles[candles.len() - lookback..];
    let swing_low = window
        .iter()
        .map(|c| c.low)
        .minmax()
        .into_option()
        .map(|(min, _)| min);
    let swing_high = window
        .iter()
        .map(|c| c.high)
        .minmax()
        .into_option()
        .map(|(_, max)| max);

    SwingLevels {
        swing_low,
        swing_high,
    }
}
