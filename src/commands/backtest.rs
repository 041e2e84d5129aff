//! Backtest command implementation

use anyhow::{Context, Result};
use paper_strategies::{data, Backtester, Config};
use std::path::PathBuf;
use tracing::info;

pub fn run(
    config_path: PathBuf,
    candles_override: Option<PathBuf>,
    capital_override: Option<f64>,
    output_override: Option<PathBuf>,
) -> Result<()> {
    info!("Starting backtest");

    let mut config = Config::from_file(&config_path)?;
    info!("Loaded configuration from: {}", config_path.display());

    if let Some(candles) = candles_override {
        info!("Overriding candles to: {}", candles.display());
        config.data.candles = candles;
    }

    if let Some(capital) = capital_override {
        info!("Overriding initial capital to: ${:.2}", capital);
        config.set_initial_capital(capital);
    }

    if let Some(output) = output_override {
        config.data.results_dir = output;
    }

    if config.strategies.is_empty() {
        anyhow::bail!("No strategies configured in {}", config_path.display());
    }

    let candles = data::load_csv(&config.data.candles)?;
    let backtester = Backtester::new(config.backtest.clone());

    println!("\n{}", "=".repeat(100));
    println!("BACKTEST RESULTS ({} candles)", candles.len());
    println!("{}", "=".repeat(100));
    println!(
        "{:<28} {:>12} {:>10} {:>9} {:>11} {:>8} {:>7}",
        "Strategy", "Final Eq", "Return%", "MaxDD%", "Benchmark%", "WinR%", "Trades"
    );
    println!("{}", "-".repeat(100));

    for strategy in &config.strategies {
        let label = strategy.label();
        let result = backtester
            .run(&candles, strategy)
            .with_context(|| format!("Backtest failed for {}", label))?;

        println!(
            "{:<28} {:>12.2} {:>10.2} {:>9.2} {:>11.2} {:>8.2} {:>7}",
            label,
            result.final_equity,
            result.total_return_percent,
            result.max_drawdown,
            result.benchmark_return_percent,
            result.win_rate,
            result.total_trades
        );

        data::export_result(&result, &label, &config.data.results_dir)?;
    }

    println!("{}", "=".repeat(100));
    println!("Results written to {}", config.data.results_dir.display());

    info!("Backtest completed successfully");

    Ok(())
}
