//! Periodic watch cycle
//!
//! Each cycle loads every configured timeframe, skips series whose newest
//! candle was already analyzed, and alerts subscribers when a directional
//! signal differs from the last one recorded. Only one cycle runs at a time.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::analysis::Analyzer;
use crate::confluence;
use crate::data::SeriesLoader;
use crate::format::format_report;
use crate::notify::Notifier;
use crate::services::Collaborators;
use crate::store::SignalStore;
use crate::strategies::Timeframe;
use crate::types::{Signal, Symbol};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Seconds between cycles (default: 60)
    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,
}

fn default_poll_secs() -> u64 {
    60
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_secs: default_poll_secs(),
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_secs.max(1))
    }
}

// =============================================================================
// Single-flight guard
// =============================================================================

#[derive(Debug, Default)]
pub struct CycleGuard {
    running: AtomicBool,
}

/// Held for the duration of a cycle; releases the guard on drop
#[derive(Debug)]
pub struct CycleToken<'a> {
    running: &'a AtomicBool,
}

impl CycleGuard {
    pub fn try_acquire(&self) -> Option<CycleToken<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CycleToken {
                running: &self.running,
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for CycleToken<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

// =============================================================================
// Cycle outcomes
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Loader or analysis failure; nothing was recorded or sent
    Skipped(String),
    /// Newest candle already analyzed
    NoNewCandle,
    /// Analyzed and recorded, no alert due
    Recorded(Signal),
    Alerted {
        signal: Signal,
        delivered: usize,
        failed: usize,
    },
}

#[derive(Debug, Clone, Default)]
pub struct CycleSummary {
    pub outcomes: Vec<(Timeframe, Outcome)>,
}

impl CycleSummary {
    pub fn outcome(&self, timeframe: Timeframe) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|(tf, _)| *tf == timeframe)
            .map(|(_, outcome)| outcome)
    }

    pub fn alerts(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, Outcome::Alerted { .. }))
            .count()
    }
}

// =============================================================================
// Watcher
// =============================================================================

pub struct Watcher<L, S, N> {
    symbol: Symbol,
    timeframes: Vec<Timeframe>,
    analyzer: Analyzer,
    loader: L,
    store: S,
    notifier: N,
    collaborators: Collaborators,
    ai_threshold: f64,
    seed: Option<u64>,
    guard: CycleGuard,
}

impl<L, S, N> Watcher<L, S, N>
where
    L: SeriesLoader,
    S: SignalStore,
    N: Notifier,
{
    pub fn new(
        symbol: Symbol,
        timeframes: Vec<Timeframe>,
        analyzer: Analyzer,
        loader: L,
        store: S,
        notifier: N,
    ) -> Self {
        Self {
            symbol,
            timeframes,
            analyzer,
            loader,
            store,
            notifier,
            collaborators: Collaborators::default(),
            ai_threshold: 0.85,
            seed: None,
            guard: CycleGuard::default(),
        }
    }

    pub fn with_collaborators(mut self, collaborators: Collaborators, ai_threshold: f64) -> Self {
        self.collaborators = collaborators;
        self.ai_threshold = ai_threshold;
        self
    }

    /// Fix the random source so repeated runs draw the same percents
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn guard(&self) -> &CycleGuard {
        &self.guard
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one cycle; `None` if the previous cycle is still in flight
    pub async fn run_cycle(&self) -> Option<Result<CycleSummary>> {
        let Some(_token) = self.guard.try_acquire() else {
            warn!("Previous cycle still running, skipping tick");
            return None;
        };

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut summary = CycleSummary::default();
        for &timeframe in &self.timeframes {
            match self.process(timeframe, &mut rng).await {
                Ok(outcome) => summary.outcomes.push((timeframe, outcome)),
                Err(e) => return Some(Err(e)),
            }
        }

        debug!("Cycle finished: {} alert(s)", summary.alerts());
        Some(Ok(summary))
    }

    async fn process(&self, timeframe: Timeframe, rng: &mut StdRng) -> Result<Outcome> {
        let minimum = self.analyzer.config().min_candles();

        let candles = match self.loader.load(&self.symbol, timeframe, minimum).await {
            Ok(candles) => candles,
            Err(e) => {
                warn!("{} {}: {}", self.symbol, timeframe, e);
                return Ok(Outcome::Skipped(e.to_string()));
            }
        };

        let Some(latest) = candles.last().map(|c| c.datetime) else {
            return Ok(Outcome::Skipped("empty series".to_string()));
        };

        if self.store.last_candle_time(&self.symbol, timeframe)? == Some(latest) {
            debug!("{} {}: no new candle since {}", self.symbol, timeframe, latest);
            return Ok(Outcome::NoNewCandle);
        }

        let report = match self.analyzer.analyze(&self.symbol, timeframe, &candles, rng) {
            Ok(report) => report,
            Err(e) => {
                warn!("{} {}: analysis failed: {}", self.symbol, timeframe, e);
                return Ok(Outcome::Skipped(e.to_string()));
            }
        };

        let signal = report.decision.signal;
        let previous = self.store.last_signal(&self.symbol, timeframe)?;

        let outcome = if signal.is_directional() && previous != Some(signal) {
            let confluence = if self.collaborators.is_empty() {
                None
            } else {
                let readout = self.collaborators.consult(&candles).await;
                Some(confluence::evaluate(
                    &readout,
                    report.snapshot.price,
                    self.ai_threshold,
                    report.risk.safe_trade,
                ))
            };

            let message = format_report(&report, confluence.as_ref());
            let (delivered, failed) = self.broadcast(&message).await?;
            info!(
                "{} {}: {} alert sent to {} subscriber(s), {} failed",
                self.symbol, timeframe, signal, delivered, failed
            );

            Outcome::Alerted {
                signal,
                delivered,
                failed,
            }
        } else {
            debug!(
                "{} {}: {} (previous {:?}), no alert",
                self.symbol, timeframe, signal, previous
            );
            Outcome::Recorded(signal)
        };

        // Markers last: a failed cycle leaves the candle unmarked
        self.store.set_last_signal(&self.symbol, timeframe, signal)?;
        self.store
            .set_last_candle_time(&self.symbol, timeframe, latest)?;
        Ok(outcome)
    }

    async fn broadcast(&self, message: &str) -> Result<(usize, usize)> {
        let subscribers = self.store.subscribers()?;
        let mut delivered = 0;
        let mut failed = 0;

        for chat_id in subscribers {
            match self.notifier.send(chat_id, message).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!("Failed to notify chat {}: {:#}", chat_id, e);
                    failed += 1;
                }
            }
        }

        Ok((delivered, failed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SignalError, SignalResult};
    use crate::store::MemoryStore;
    use crate::types::Candle;
    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    use std::sync::Mutex;

    /// Trending series: opens at the previous close, moves `step` each bar
    fn trend(count: usize, start_ts: i64, step: f64) -> Vec<Candle> {
        let start = DateTime::from_timestamp(start_ts, 0).unwrap();
        let mut close = 2000.0;
        (0..count)
            .map(|i| {
                let open = close;
                close += step;
                Candle::new_unchecked(
                    start + ChronoDuration::minutes(15 * i as i64),
                    open,
                    open.max(close) + 0.2,
                    open.min(close) - 0.2,
                    close,
                )
            })
            .collect()
    }

    #[derive(Default)]
    struct ScriptedLoader {
        series: Mutex<Option<Vec<Candle>>>,
    }

    impl ScriptedLoader {
        fn set(&self, candles: Option<Vec<Candle>>) {
            *self.series.lock().unwrap() = candles;
        }
    }

    impl SeriesLoader for ScriptedLoader {
        async fn load(
            &self,
            _symbol: &Symbol,
            _interval: Timeframe,
            minimum: usize,
        ) -> SignalResult<Vec<Candle>> {
            match self.series.lock().unwrap().clone() {
                Some(candles) if candles.len() >= minimum => Ok(candles),
                Some(candles) => Err(SignalError::DataUnavailable(format!(
                    "need {} candles, got {}",
                    minimum,
                    candles.len()
                ))),
                None => Err(SignalError::DataUnavailable("API limit reached".into())),
            }
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(i64, String)>>,
        failing_chat: Option<i64>,
    }

    impl Notifier for RecordingNotifier {
        async fn send(&self, chat_id: i64, text: &str) -> Result<()> {
            if self.failing_chat == Some(chat_id) {
                anyhow::bail!("chat {} blocked the bot", chat_id);
            }
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }
    }

    fn watcher(
        failing_chat: Option<i64>,
    ) -> Watcher<ScriptedLoader, MemoryStore, RecordingNotifier> {
        let store = MemoryStore::new();
        store.add_subscriber(1).unwrap();
        store.add_subscriber(2).unwrap();

        Watcher::new(
            Symbol::new("XAU/USD"),
            vec![Timeframe::FifteenMin],
            Analyzer::default(),
            ScriptedLoader::default(),
            store,
            RecordingNotifier {
                failing_chat,
                ..Default::default()
            },
        )
        .with_seed(7)
    }

    fn sent_count(w: &Watcher<ScriptedLoader, MemoryStore, RecordingNotifier>) -> usize {
        w.notifier.sent.lock().unwrap().len()
    }

    /// Memory store whose subscriber read fails once
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_next_read: AtomicBool,
    }

    impl SignalStore for FlakyStore {
        fn last_candle_time(&self, symbol: &Symbol, interval: Timeframe) -> Result<Option<DateTime<Utc>>> {
            self.inner.last_candle_time(symbol, interval)
        }

        fn set_last_candle_time(&self, symbol: &Symbol, interval: Timeframe, time: DateTime<Utc>) -> Result<()> {
            self.inner.set_last_candle_time(symbol, interval, time)
        }

        fn last_signal(&self, symbol: &Symbol, interval: Timeframe) -> Result<Option<Signal>> {
            self.inner.last_signal(symbol, interval)
        }

        fn set_last_signal(&self, symbol: &Symbol, interval: Timeframe, signal: Signal) -> Result<()> {
            self.inner.set_last_signal(symbol, interval, signal)
        }

        fn subscribers(&self) -> Result<Vec<i64>> {
            if self.fail_next_read.swap(false, Ordering::SeqCst) {
                anyhow::bail!("database is locked");
            }
            self.inner.subscribers()
        }

        fn add_subscriber(&self, chat_id: i64) -> Result<bool> {
            self.inner.add_subscriber(chat_id)
        }

        fn remove_subscriber(&self, chat_id: i64) -> Result<bool> {
            self.inner.remove_subscriber(chat_id)
        }
    }

    #[tokio::test]
    async fn test_alert_then_dedupe() {
        let w = watcher(None);
        let symbol = Symbol::new("XAU/USD");
        let series = trend(250, 1_700_000_000, -0.5);
        w.loader.set(Some(series.clone()));

        let summary = w.run_cycle().await.unwrap().unwrap();
        assert_eq!(
            summary.outcome(Timeframe::FifteenMin),
            Some(&Outcome::Alerted {
                signal: Signal::Sell,
                delivered: 2,
                failed: 0
            })
        );
        assert_eq!(sent_count(&w), 2);
        assert!(w.notifier.sent.lock().unwrap()[0]
            .1
            .starts_with("📊 XAU/USD Signal (15min)"));
        assert_eq!(
            w.store().last_candle_time(&symbol, Timeframe::FifteenMin).unwrap(),
            Some(series[249].datetime)
        );

        // Same newest candle
        let summary = w.run_cycle().await.unwrap().unwrap();
        assert_eq!(summary.outcome(Timeframe::FifteenMin), Some(&Outcome::NoNewCandle));
        assert_eq!(sent_count(&w), 2);

        // New candle, same signal
        w.loader.set(Some(trend(251, 1_700_000_000, -0.5)));
        let summary = w.run_cycle().await.unwrap().unwrap();
        assert_eq!(
            summary.outcome(Timeframe::FifteenMin),
            Some(&Outcome::Recorded(Signal::Sell))
        );
        assert_eq!(sent_count(&w), 2);
    }

    #[tokio::test]
    async fn test_neutral_resets_alerting() {
        let w = watcher(None);
        let symbol = Symbol::new("XAU/USD");

        w.loader.set(Some(trend(250, 1_700_000_000, -0.5)));
        w.run_cycle().await.unwrap().unwrap();
        assert_eq!(sent_count(&w), 2);

        // Uptrend is NEUTRAL on 15min: stored, not sent
        w.loader.set(Some(trend(250, 1_800_000_000, 0.5)));
        let summary = w.run_cycle().await.unwrap().unwrap();
        assert_eq!(
            summary.outcome(Timeframe::FifteenMin),
            Some(&Outcome::Recorded(Signal::Neutral))
        );
        assert_eq!(
            w.store().last_signal(&symbol, Timeframe::FifteenMin).unwrap(),
            Some(Signal::Neutral)
        );

        w.loader.set(Some(trend(250, 1_900_000_000, -0.5)));
        let summary = w.run_cycle().await.unwrap().unwrap();
        assert_eq!(summary.alerts(), 1);
        assert_eq!(sent_count(&w), 4);
    }

    #[tokio::test]
    async fn test_data_unavailable_skips_silently() {
        let w = watcher(None);
        let symbol = Symbol::new("XAU/USD");

        let summary = w.run_cycle().await.unwrap().unwrap();
        assert!(matches!(
            summary.outcome(Timeframe::FifteenMin),
            Some(Outcome::Skipped(reason)) if reason.contains("API limit reached")
        ));

        // Too short for EMA200
        w.loader.set(Some(trend(120, 1_700_000_000, -0.5)));
        let summary = w.run_cycle().await.unwrap().unwrap();
        assert!(matches!(
            summary.outcome(Timeframe::FifteenMin),
            Some(Outcome::Skipped(_))
        ));

        assert_eq!(sent_count(&w), 0);
        assert_eq!(w.store().last_candle_time(&symbol, Timeframe::FifteenMin).unwrap(), None);
        assert_eq!(w.store().last_signal(&symbol, Timeframe::FifteenMin).unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_delivery_does_not_abort() {
        let w = watcher(Some(1));
        w.loader.set(Some(trend(250, 1_700_000_000, -0.5)));

        let summary = w.run_cycle().await.unwrap().unwrap();
        assert_eq!(
            summary.outcome(Timeframe::FifteenMin),
            Some(&Outcome::Alerted {
                signal: Signal::Sell,
                delivered: 1,
                failed: 1
            })
        );
        assert_eq!(w.notifier.sent.lock().unwrap()[0].0, 2);
    }

    #[tokio::test]
    async fn test_overlapping_cycle_is_skipped() {
        let w = watcher(None);
        w.loader.set(Some(trend(250, 1_700_000_000, -0.5)));

        let token = w.guard().try_acquire().unwrap();
        assert!(w.guard().try_acquire().is_none());
        assert!(w.run_cycle().await.is_none());
        assert_eq!(sent_count(&w), 0);

        drop(token);
        assert!(!w.guard().is_running());
        assert!(w.run_cycle().await.is_some());
        assert_eq!(sent_count(&w), 2);
    }

    #[tokio::test]
    async fn test_store_error_leaves_alert_pending() {
        let symbol = Symbol::new("XAU/USD");
        let store = FlakyStore::default();
        store.add_subscriber(1).unwrap();
        store.fail_next_read.store(true, Ordering::SeqCst);

        let w = Watcher::new(
            symbol.clone(),
            vec![Timeframe::FifteenMin],
            Analyzer::default(),
            ScriptedLoader::default(),
            store,
            RecordingNotifier::default(),
        )
        .with_seed(7);
        let series = trend(250, 1_700_000_000, -0.5);
        w.loader.set(Some(series.clone()));

        let err = w.run_cycle().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("database is locked"));
        assert_eq!(w.store().last_candle_time(&symbol, Timeframe::FifteenMin).unwrap(), None);
        assert_eq!(w.store().last_signal(&symbol, Timeframe::FifteenMin).unwrap(), None);
        assert!(w.notifier.sent.lock().unwrap().is_empty());

        // Same candle, store healthy again: the alert goes out
        let summary = w.run_cycle().await.unwrap().unwrap();
        assert_eq!(
            summary.outcome(Timeframe::FifteenMin),
            Some(&Outcome::Alerted {
                signal: Signal::Sell,
                delivered: 1,
                failed: 0
            })
        );
        assert_eq!(w.notifier.sent.lock().unwrap().len(), 1);
        assert_eq!(
            w.store().last_candle_time(&symbol, Timeframe::FifteenMin).unwrap(),
            Some(series[249].datetime)
        );
    }
}
