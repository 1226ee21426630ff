//! Forex Signals
//!
//! Rule-based signal engine for a single forex or commodity instrument:
//! EMA/RSI/ATR indicators, engulfing detection, per-timeframe rule tables,
//! risk scoring, trade levels, optional SMC/AI confluence, and a watch loop
//! that alerts Telegram subscribers when a new signal appears.

pub mod analysis;
pub mod config;
pub mod confluence;
pub mod data;
pub mod error;
pub mod format;
pub mod indicators;
pub mod levels;
pub mod notify;
pub mod patterns;
pub mod probability;
pub mod risk;
pub mod services;
pub mod store;
pub mod strategies;
pub mod types;
pub mod watch;

pub use analysis::{AnalysisConfig, Analyzer};
pub use config::Config;
pub use error::{SignalError, SignalResult};
pub use strategies::Timeframe;
pub use types::*;
