//! Integration tests for the forex-signals engine
//!
//! These tests verify that indicators, rule tables, risk scoring, loaders,
//! the store and the watch cycle work together correctly.

use approx::assert_relative_eq;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::Write;
use std::sync::Mutex;

use forex_signals::data::{CsvLoader, SeriesLoader};
use forex_signals::indicators;
use forex_signals::notify::Notifier;
use forex_signals::patterns::{detect_engulfing, Pattern};
use forex_signals::risk::{RiskConfig, RiskLevel};
use forex_signals::store::{SignalStore, SqliteStore};
use forex_signals::watch::{Outcome, Watcher};
use forex_signals::{AnalysisConfig, Analyzer, Candle, Signal, Symbol, Timeframe};

// =============================================================================
// Test Utilities
// =============================================================================

fn start_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

/// Candles from a close path; each opens at the previous close
fn candles_from_closes(closes: &[f64], step_minutes: i64) -> Vec<Candle> {
    let mut previous = closes.first().copied().unwrap_or(100.0);
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = previous;
            previous = close;
            Candle::new_unchecked(
                start_time() + Duration::minutes(step_minutes * i as i64),
                open,
                open.max(close) + 0.01,
                open.min(close) - 0.01,
                close,
            )
        })
        .collect()
}

/// Flat, directionless series
fn generate_flat_candles(count: usize, price: f64) -> Vec<Candle> {
    candles_from_closes(&vec![price; count], 3)
}

/// 3min BUY setup with every condition met.
///
/// An old +40 jump lifts EMA20 just above EMA50, a later -1 drop keeps RSI
/// below 25, and a small final gain closes above EMA20. The last two candles
/// form a bullish engulfing pair.
fn generate_buy_setup() -> Vec<Candle> {
    let n = 300;
    let mut changes = vec![0.0; n];
    changes[n - 1 - 150] = 40.0;
    changes[n - 1 - 60] = -1.0;
    changes[n - 1] = 0.003;

    let mut closes = Vec::with_capacity(n);
    let mut close = 100.0;
    for change in changes {
        close += change;
        closes.push(close);
    }

    let mut candles = candles_from_closes(&closes, 3);

    // Previous candle: bearish body with no net close change
    let prev_close = closes[n - 2];
    let previous = &mut candles[n - 2];
    previous.open = prev_close + 0.001;
    previous.high = previous.open + 0.01;

    // Current candle opens below the previous close and closes above its open
    let current = &mut candles[n - 1];
    current.open = prev_close - 0.001;
    current.low = current.open - 0.01;

    candles
}

fn write_csv(dir: &std::path::Path, name: &str, candles: &[Candle]) {
    let mut file = std::fs::File::create(dir.join(name)).unwrap();
    writeln!(file, "datetime,open,high,low,close").unwrap();
    for c in candles {
        writeln!(
            file,
            "{},{},{},{},{}",
            c.datetime.format("%Y-%m-%d %H:%M:%S"),
            c.open,
            c.high,
            c.low,
            c.close
        )
        .unwrap();
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(i64, String)>>,
}

impl Notifier for RecordingNotifier {
    async fn send(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }
}

// =============================================================================
// Indicator Tests
// =============================================================================

#[test]
fn test_ema_of_constant_series_is_exact() {
    let closes = vec![1987.25; 250];
    for period in [1, 20, 50, 200, 250] {
        assert_eq!(indicators::ema(&closes, period).unwrap(), 1987.25);
    }
    assert!(indicators::ema(&closes, 251).is_err());
}

#[test]
fn test_rsi_of_monotonic_series() {
    let rising: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 0.7).collect();
    let falling: Vec<f64> = rising.iter().rev().copied().collect();

    assert_eq!(indicators::rsi(&rising, 14).unwrap(), 100.0);
    assert_eq!(indicators::rsi(&falling, 14).unwrap(), 0.0);
}

#[test]
fn test_atr_series_length() {
    let candles = generate_buy_setup();
    for period in [5, 14, 50] {
        let atr = indicators::atr_series(&candles, period).unwrap();
        assert_eq!(atr.len(), candles.len() - period);
        assert!(atr.iter().all(|v| *v >= 0.0));
    }
}

#[test]
fn test_swing_levels_within_series_range() {
    let lows = [5.0, 4.0, 6.0, 3.0, 7.0, 5.0, 6.0, 4.0, 5.0, 6.0];
    let mut candles: Vec<Candle> = (0..30)
        .map(|i| {
            Candle::new_unchecked(
                start_time() + Duration::hours(i),
                2.0,
                12.0 + (i % 4) as f64,
                1.0,
                2.0,
            )
        })
        .collect();
    for (candle, low) in candles[20..].iter_mut().zip(lows) {
        candle.low = low;
        candle.open = low + 1.0;
        candle.close = low + 1.0;
        candle.high = low + 2.0;
    }

    let swings = indicators::swing_levels(&candles, 10);
    assert_eq!(swings.swing_low, Some(3.0));
    assert_eq!(swings.swing_high, Some(9.0));

    let global_low = candles.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let global_high = candles.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    for lookback in [1, 5, 10, 30] {
        let s = indicators::swing_levels(&candles, lookback);
        assert!(s.swing_low.unwrap() >= global_low);
        assert!(s.swing_high.unwrap() <= global_high);
    }
}

// =============================================================================
// Pattern Tests
// =============================================================================

#[test]
fn test_engulfing_is_mutually_exclusive() {
    let prices = [98.0, 99.0, 100.0, 101.0, 102.0];
    let t = start_time();
    let mut seen_bullish = false;
    let mut seen_bearish = false;

    for &po in &prices {
        for &pc in &prices {
            for &co in &prices {
                for &cc in &prices {
                    let previous = Candle::new_unchecked(t, po, 110.0, 90.0, pc);
                    let current = Candle::new_unchecked(t, co, 110.0, 90.0, cc);
                    let result = detect_engulfing(&[current, previous]);
                    assert!(!(result.is_bullish_engulfing && result.is_bearish_engulfing));
                    seen_bullish |= result.pattern == Pattern::BullishEngulfing;
                    seen_bearish |= result.pattern == Pattern::BearishEngulfing;
                }
            }
        }
    }

    assert!(seen_bullish && seen_bearish);
}

// =============================================================================
// End-to-End Analysis Tests
// =============================================================================

#[test]
fn test_three_minute_full_buy() {
    let candles = generate_buy_setup();
    let analyzer = Analyzer::default();
    let mut rng = StdRng::seed_from_u64(42);

    let report = analyzer
        .analyze(&Symbol::new("XAU/USD"), Timeframe::ThreeMin, &candles, &mut rng)
        .unwrap();

    let snap = &report.snapshot;
    assert!(snap.rsi14 < 25.0);
    assert!(snap.ema20.unwrap() > snap.ema50);
    assert!(snap.price > snap.ema20.unwrap());
    assert!(report.pattern.is_bullish_engulfing);

    let decision = &report.decision;
    assert_eq!(decision.signal, Signal::Buy);
    assert_eq!(decision.conditions_met, 4);
    assert_eq!(decision.total_conditions, 4);
    assert!((90..=99).contains(&decision.probability_percent));
    assert_eq!(report.risk.risk_level, RiskLevel::Low);
}

#[test]
fn test_flat_series_is_neutral_on_every_timeframe() {
    let candles = generate_flat_candles(260, 2000.0);
    let analyzer = Analyzer::default();
    let mut rng = StdRng::seed_from_u64(3);

    for timeframe in Timeframe::ALL {
        let report = analyzer
            .analyze(&Symbol::new("XAU/USD"), timeframe, &candles, &mut rng)
            .unwrap();
        assert_eq!(report.decision.signal, Signal::Neutral, "{}", timeframe);
        assert_eq!(report.risk.risk_level, RiskLevel::VeryHigh);
        assert!((80..=95).contains(&report.risk.risk_percent));
        assert!(report.decision.probability_percent <= 10);
        assert!(report.levels.is_none());
        // Zero losses pin RSI at 100
        assert_eq!(report.snapshot.rsi14, 100.0);
    }
}

#[test]
fn test_levels_absent_whenever_trade_is_unsafe() {
    let candles = generate_buy_setup();
    let symbol = Symbol::new("XAU/USD");

    let strict = Analyzer::new(AnalysisConfig {
        risk: RiskConfig::default().with_max_risk_allowed(0.0),
        ..Default::default()
    });
    let report = strict
        .analyze(&symbol, Timeframe::ThreeMin, &candles, &mut StdRng::seed_from_u64(1))
        .unwrap();
    assert_eq!(report.decision.signal, Signal::Buy);
    assert!(report.risk.risk_score > 0.0);
    assert!(!report.risk.safe_trade);
    assert!(report.levels.is_none());

    let lenient = Analyzer::new(AnalysisConfig {
        risk: RiskConfig::default().with_max_risk_allowed(100.0),
        ..Default::default()
    });
    let report = lenient
        .analyze(&symbol, Timeframe::ThreeMin, &candles, &mut StdRng::seed_from_u64(1))
        .unwrap();
    assert!(report.risk.safe_trade);
    let levels = report.levels.unwrap();
    assert!(levels.stop_loss < levels.entry);
    assert_relative_eq!(
        levels.take_profit - levels.entry,
        2.0 * (levels.entry - levels.stop_loss),
        epsilon = 1e-9
    );
}

#[test]
fn test_same_seed_same_decision() {
    let candles = generate_buy_setup();
    let analyzer = Analyzer::default();
    let symbol = Symbol::new("XAU/USD");

    for timeframe in Timeframe::ALL {
        let a = analyzer
            .analyze(&symbol, timeframe, &candles, &mut StdRng::seed_from_u64(99))
            .unwrap();
        let b = analyzer
            .analyze(&symbol, timeframe, &candles, &mut StdRng::seed_from_u64(99))
            .unwrap();
        assert_eq!(a.decision, b.decision);
        assert_eq!(a.risk, b.risk);
    }
}

#[test]
fn test_short_series_fails_analysis() {
    let candles = generate_flat_candles(199, 2000.0);
    let result = Analyzer::default().analyze(
        &Symbol::new("XAU/USD"),
        Timeframe::OneDay,
        &candles,
        &mut StdRng::seed_from_u64(0),
    );
    assert!(result.is_err());
}

// =============================================================================
// Loader and Watch Tests
// =============================================================================

#[tokio::test]
async fn test_csv_series_through_analysis() {
    let dir = tempfile::tempdir().unwrap();
    let candles = generate_buy_setup();
    write_csv(dir.path(), "XAUUSD_3min.csv", &candles);

    let loader = CsvLoader::new(dir.path(), None);
    let symbol = Symbol::new("XAU/USD");
    let loaded = loader.load(&symbol, Timeframe::ThreeMin, 200).await.unwrap();
    assert_eq!(loaded.len(), candles.len());

    let report = Analyzer::default()
        .analyze(&symbol, Timeframe::ThreeMin, &loaded, &mut StdRng::seed_from_u64(5))
        .unwrap();
    assert_eq!(report.decision.signal, Signal::Buy);
}

#[tokio::test]
async fn test_watch_cycle_persists_markers() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("signals.db");
    write_csv(dir.path(), "XAUUSD_3min.csv", &generate_buy_setup());
    let symbol = Symbol::new("XAU/USD");

    {
        let store = SqliteStore::open(&db_path).unwrap();
        store.add_subscriber(555).unwrap();

        let watcher = Watcher::new(
            symbol.clone(),
            vec![Timeframe::ThreeMin],
            Analyzer::default(),
            CsvLoader::new(dir.path(), None),
            store,
            RecordingNotifier::default(),
        )
        .with_seed(11);

        let summary = watcher.run_cycle().await.unwrap().unwrap();
        assert!(matches!(
            summary.outcome(Timeframe::ThreeMin),
            Some(Outcome::Alerted {
                signal: Signal::Buy,
                delivered: 1,
                failed: 0
            })
        ));
    }

    // A restarted watcher sees the stored marker
    let notifier = RecordingNotifier::default();
    let watcher = Watcher::new(
        symbol.clone(),
        vec![Timeframe::ThreeMin],
        Analyzer::default(),
        CsvLoader::new(dir.path(), None),
        SqliteStore::open(&db_path).unwrap(),
        notifier,
    );
    let summary = watcher.run_cycle().await.unwrap().unwrap();
    assert_eq!(summary.outcome(Timeframe::ThreeMin), Some(&Outcome::NoNewCandle));
    assert_eq!(
        watcher.store().last_signal(&symbol, Timeframe::ThreeMin).unwrap(),
        Some(Signal::Buy)
    );
}
