//! Watch command
//!
//! Polls every configured timeframe on a fixed interval and pushes new
//! directional signals to subscribers. Ctrl+C ends the loop gracefully.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use forex_signals::data::DataSource;
use forex_signals::notify::AlertSink;
use forex_signals::services::Collaborators;
use forex_signals::store::{create_store, SignalStore};
use forex_signals::watch::Watcher;
use forex_signals::{Analyzer, Config};

pub fn run(config_path: String, interval_override: Option<u64>, state_db: Option<PathBuf>) -> Result<()> {
    let mut config = Config::from_file(&config_path)?;
    info!("Loaded configuration from: {}", config_path);

    if let Some(secs) = interval_override {
        info!("Overriding poll interval to {}s", secs);
        config.watch.poll_secs = secs;
    }

    config.validate()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(run_async(config, state_db))
}

async fn run_async(config: Config, state_db: Option<PathBuf>) -> Result<()> {
    let symbol = config.symbol();
    let timeframes = config.timeframes()?;

    let loader = DataSource::from_config(&config.data)?;
    let notifier = AlertSink::from_config(&config.telegram)?;
    let store = create_store(state_db.as_deref()).context("Failed to create signal store")?;
    if state_db.is_none() {
        warn!("No --state-db given; dedupe markers and subscribers will not survive a restart");
    }

    for &chat_id in &config.telegram.default_chat_ids {
        if store.add_subscriber(chat_id)? {
            info!("Subscribed default chat {}", chat_id);
        }
    }

    let collaborators = Collaborators::from_config(&config.services)?;
    if !collaborators.is_empty() {
        info!("SMC/AI confluence enabled");
    }

    let watcher = Arc::new(
        Watcher::new(
            symbol.clone(),
            timeframes.clone(),
            Analyzer::new(config.analysis.clone()),
            loader,
            store,
            notifier,
        )
        .with_collaborators(collaborators, config.services.ai_confidence_threshold),
    );

    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let shutdown_flag_clone = shutdown_flag.clone();

    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, initiating shutdown...");
                shutdown_flag_clone.store(true, Ordering::SeqCst);
                let _ = shutdown_tx.send(()).await;
            }
            Err(e) => {
                error!("Error setting up signal handler: {}", e);
            }
        }
    });

    let mut cycle_interval = interval(config.watch.poll_interval());
    cycle_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let names: Vec<&str> = timeframes.iter().map(|tf| tf.as_str()).collect();
    info!(
        "Watching {} on [{}] every {}s",
        symbol,
        names.join(", "),
        config.watch.poll_secs
    );

    loop {
        tokio::select! {
            _ = cycle_interval.tick() => {
                if shutdown_flag.load(Ordering::SeqCst) {
                    break;
                }

                // Overlapping ticks are rejected by the cycle guard
                let watcher = watcher.clone();
                tokio::spawn(async move {
                    match watcher.run_cycle().await {
                        Some(Ok(summary)) => {
                            if summary.alerts() > 0 {
                                info!("Cycle sent {} alert(s)", summary.alerts());
                            }
                        }
                        Some(Err(e)) => error!("Cycle failed: {:#}", e),
                        None => {}
                    }
                });
            }
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    info!("Watch session ended.");
    Ok(())
}
