//! Forex signals - main entry point
//!
//! This binary provides three subcommands:
//! - analyze: Run one on-demand analysis and print the message
//! - watch: Poll the configured timeframes and alert subscribers
//! - subscribers: Manage the chat ids that receive alerts

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "forex-signals")]
#[command(about = "Rule-based forex signals with risk scoring and Telegram alerts", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze one timeframe and print the signal message
    Analyze {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/xauusd.json")]
        config: String,

        /// Timeframe to analyze (3min, 15min, 1h, 1day)
        #[arg(short, long, default_value = "1h")]
        interval: String,

        /// Read candles from this CSV directory instead of the API
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Seed for the probability and risk-percent draws
        #[arg(long)]
        seed: Option<u64>,

        /// Consult the SMC and AI services
        #[arg(long)]
        services: bool,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Watch the configured timeframes and alert subscribers
    Watch {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/xauusd.json")]
        config: String,

        /// Cycle interval in seconds (overrides config)
        #[arg(long)]
        interval: Option<u64>,

        /// State database path (in-memory when omitted)
        #[arg(long)]
        state_db: Option<PathBuf>,
    },

    /// Manage alert subscribers
    Subscribers {
        /// State database path
        #[arg(long, default_value = "state/signals.db")]
        state_db: PathBuf,

        #[command(subcommand)]
        action: SubscriberAction,
    },
}

#[derive(Subcommand, Debug)]
enum SubscriberAction {
    /// List subscribed chat ids
    List,
    /// Subscribe a chat id
    Add { chat_id: i64 },
    /// Unsubscribe a chat id
    Remove { chat_id: i64 },
}

fn setup_logging(verbose: bool, command_name: &str) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    // Set log level - filter out noisy HTTP crates
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        level
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Log file: {}", log_path.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Analyze { .. } => "analyze",
        Commands::Watch { .. } => "watch",
        Commands::Subscribers { .. } => "subscribers",
    };

    setup_logging(cli.verbose, command_name)?;

    match cli.command {
        Commands::Analyze {
            config,
            interval,
            csv,
            seed,
            services,
            json,
        } => commands::analyze::run(commands::analyze::AnalyzeArgs {
            config,
            interval,
            csv,
            seed,
            services,
            json,
        }),

        Commands::Watch {
            config,
            interval,
            state_db,
        } => commands::watch::run(config, interval, state_db),

        Commands::Subscribers { state_db, action } => {
            let action = match action {
                SubscriberAction::List => commands::subscribers::Action::List,
                SubscriberAction::Add { chat_id } => commands::subscribers::Action::Add(chat_id),
                SubscriberAction::Remove { chat_id } => {
                    commands::subscribers::Action::Remove(chat_id)
                }
            };
            commands::subscribers::run(state_db, action)
        }
    }
}
