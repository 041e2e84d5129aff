//! Optimize command implementation

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use paper_strategies::optimizer::{momentum_configs, sort_results, Optimizer};
use paper_strategies::{data, Backtester, Config, StrategyConfig};
use std::path::PathBuf;
use tracing::info;

pub fn run(
    config_path: PathBuf,
    candles_override: Option<PathBuf>,
    sort_by: String,
    top: usize,
    sequential: bool,
) -> Result<()> {
    info!("Starting optimization");

    let mut config = Config::from_file(&config_path)?;
    if let Some(candles) = candles_override {
        config.data.candles = candles;
    }

    let grid = config.grid.clone().unwrap_or_default();
    let configs = momentum_configs(&grid);
    if configs.is_empty() {
        anyhow::bail!("Sweep grid produced no short < long period pairs");
    }

    let candles = data::load_csv(&config.data.candles)?;

    println!("\n{}", "=".repeat(70));
    println!("OPTIMIZATION SUMMARY");
    println!("{}", "=".repeat(70));
    println!("  Candles:       {}", candles.len());
    println!("  Short periods: {:?}", grid.short_period);
    println!("  Long periods:  {:?}", grid.long_period);
    println!("  Total tests:   {}", configs.len());
    println!("  Mode:          {}", if sequential { "sequential" } else { "parallel" });
    println!("{}\n", "=".repeat(70));

    let optimizer = Optimizer::new(Backtester::new(config.backtest.clone()), &candles);

    let mut results = if sequential {
        optimizer.optimize_sequential(&configs)
    } else {
        let pb = ProgressBar::new(configs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("⚡ {percent:>3}%|{bar:40}| {pos}/{len} [{elapsed}<{eta}, {per_sec:.2}]")?
                .progress_chars("█░ "),
        );
        let results = optimizer.optimize_with_progress(&configs, &pb);
        pb.finish();
        results
    };
    println!();

    if results.is_empty() {
        info!("No valid results found.");
        return Ok(());
    }

    sort_results(&mut results, &sort_by);
    info!("Total results: {}, sorted by: {}", results.len(), sort_by);

    let display_count = top.min(results.len());
    println!("\n{}", "=".repeat(80));
    println!("TOP {} OPTIMIZATION RESULTS (sorted by {})", display_count, sort_by);
    println!("{}", "=".repeat(80));
    println!(
        "{:<4} {:>6} {:>6} {:>10} {:>9} {:>8} {:>9} {:>7}",
        "Rank", "Short", "Long", "Return%", "MaxDD%", "WinR%", "Excess%", "Trades"
    );
    println!("{}", "-".repeat(80));

    for (rank, result) in results.iter().take(display_count).enumerate() {
        let (short, long) = match result.config {
            StrategyConfig::Momentum {
                short_period,
                long_period,
                ..
            } => (short_period, long_period),
            _ => continue,
        };
        println!(
            "{:<4} {:>6} {:>6} {:>10.2} {:>9.2} {:>8.2} {:>9.2} {:>7}",
            rank + 1,
            short,
            long,
            result.total_return_percent,
            result.max_drawdown,
            result.win_rate,
            result.excess_return_percent,
            result.total_trades
        );
    }
    println!("{}", "=".repeat(80));

    std::fs::create_dir_all(&config.data.results_dir)?;
    let path = config.data.results_dir.join("optimization_results.json");
    std::fs::write(&path, serde_json::to_string_pretty(&results)?)?;
    info!("Saved optimization results to {}", path.display());

    Ok(())
}
