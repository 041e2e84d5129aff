//! Paper strategies - main entry point
//!
//! This binary provides three subcommands:
//! - backtest: Replay configured strategies over a candle CSV
//! - replay: Stream a candle CSV through the regime-switching evaluator
//! - optimize: Sweep momentum SMA periods in parallel

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "paper-strategies")]
#[command(about = "Indicator-driven paper-trading strategies with backtesting and replay", long_about = None)]
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
    /// Run backtests for every configured strategy
    Backtest {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/default.json")]
        config: PathBuf,

        /// Candle CSV (overrides config file)
        #[arg(long)]
        candles: Option<PathBuf>,

        /// Initial capital for every strategy
        #[arg(long)]
        capital: Option<f64>,

        /// Results directory (overrides config file)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Stream candles through the strategy evaluator
    Replay {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/default.json")]
        config: PathBuf,

        /// Symbol the candles belong to
        #[arg(short, long, default_value = "BTCUSDT")]
        symbol: String,

        /// Candle CSV (overrides config file)
        #[arg(long)]
        candles: Option<PathBuf>,

        /// Market sentiment (bullish, bearish, neutral)
        #[arg(long, default_value = "neutral")]
        sentiment: String,
    },

    /// Optimize momentum SMA periods
    Optimize {
        /// Path to base configuration file
        #[arg(short, long, default_value = "configs/default.json")]
        config: PathBuf,

        /// Candle CSV (overrides config file)
        #[arg(long)]
        candles: Option<PathBuf>,

        /// Sort results by metric (return, drawdown, win_rate, excess)
        #[arg(long, default_value = "return")]
        sort_by: String,

        /// Number of top results to show
        #[arg(short, long, default_value = "10")]
        top: usize,

        /// Run sequentially instead of parallel
        #[arg(long)]
        sequential: bool,
    },
}

/// Default filter when `RUST_LOG` is unset. `--verbose` turns on per-decision
/// and per-trade events from this crate only; dependencies stay at `info`.
fn log_filter(verbose: bool) -> String {
    let crate_level = if verbose { "debug" } else { "info" };
    format!("info,paper_strategies={}", crate_level)
}

fn setup_logging(verbose: bool, command_name: &str, file_only: bool) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    // {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_filter(verbose)));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    if file_only {
        // Keep the console clean for the progress bar
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    } else {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
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
    }

    Ok(())
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let (command_name, file_only) = match &cli.command {
        Commands::Backtest { .. } => ("backtest", false),
        Commands::Replay { .. } => ("replay", false),
        Commands::Optimize { .. } => ("optimize", true),
    };

    setup_logging(cli.verbose, command_name, file_only)?;

    match cli.command {
        Commands::Backtest {
            config,
            candles,
            capital,
            output,
        } => commands::backtest::run(config, candles, capital, output),

        Commands::Replay {
            config,
            symbol,
            candles,
            sentiment,
        } => commands::replay::run(config, symbol, candles, sentiment),

        Commands::Optimize {
            config,
            candles,
            sort_by,
            top,
            sequential,
        } => commands::optimize::run(config, candles, sort_by, top, sequential),
    }
}
