//! On-demand analysis command

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

use forex_signals::confluence::{self, ConfluenceReport};
use forex_signals::data::{DataProvider, DataSource, SeriesLoader};
use forex_signals::format::{format_failure, format_report};
use forex_signals::services::Collaborators;
use forex_signals::{AnalysisReport, Analyzer, Candle, Config, SignalResult, Symbol, Timeframe};

pub struct AnalyzeArgs {
    pub config: String,
    pub interval: String,
    pub csv: Option<PathBuf>,
    pub seed: Option<u64>,
    pub services: bool,
    pub json: bool,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    report: &'a AnalysisReport,
    confluence: Option<&'a ConfluenceReport>,
}

pub fn run(args: AnalyzeArgs) -> Result<()> {
    let mut config = Config::from_file(&args.config)?;
    info!("Loaded configuration from: {}", args.config);

    if let Some(dir) = &args.csv {
        info!("Reading candles from CSV directory: {}", dir.display());
        config.data.provider = DataProvider::Csv;
        config.data.csv_dir = dir.clone();
    }

    // Output goes to stdout, not Telegram
    config.telegram.enabled = false;
    config.validate()?;

    let timeframe: Timeframe = args
        .interval
        .parse()
        .map_err(anyhow::Error::msg)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(run_async(config, timeframe, args))
}

async fn run_async(config: Config, timeframe: Timeframe, args: AnalyzeArgs) -> Result<()> {
    let loader = DataSource::from_config(&config.data)?;
    let analyzer = Analyzer::new(config.analysis.clone());
    let symbol = config.symbol();

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let outcome = load_and_analyze(&loader, &analyzer, &symbol, timeframe, &mut rng).await;

    let (candles, report) = match outcome {
        Ok(value) => value,
        Err(e) => {
            warn!("Analysis of {} {} failed: {}", symbol, timeframe, e);
            println!("{}", format_failure(timeframe.as_str(), &e.to_string()));
            return Ok(());
        }
    };

    let confluence = if args.services && config.services.is_enabled() {
        let collaborators = Collaborators::from_config(&config.services)?;
        let readout = collaborators.consult(&candles).await;
        Some(confluence::evaluate(
            &readout,
            report.snapshot.price,
            config.services.ai_confidence_threshold,
            report.risk.safe_trade,
        ))
    } else {
        if args.services {
            warn!("--services given but no SMC or AI URL is configured");
        }
        None
    };

    if args.json {
        let output = JsonOutput {
            report: &report,
            confluence: confluence.as_ref(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", format_report(&report, confluence.as_ref()));
    }

    Ok(())
}

async fn load_and_analyze(
    loader: &DataSource,
    analyzer: &Analyzer,
    symbol: &Symbol,
    timeframe: Timeframe,
    rng: &mut StdRng,
) -> SignalResult<(Vec<Candle>, AnalysisReport)> {
    let candles = loader
        .load(symbol, timeframe, analyzer.config().min_candles())
        .await?;
    let report = analyzer.analyze(symbol, timeframe, &candles, rng)?;
    Ok((candles, report))
}
