//! Replay command implementation
//!
//! Feeds a historical candle series to the evaluator one closed kline at a
//! time, the same way a live stream would.

use anyhow::Result;
use paper_strategies::{data, Config, Kline, Sentiment, SignalAction, StrategyEvaluator, Symbol};
use std::path::PathBuf;
use tracing::info;

pub fn run(
    config_path: PathBuf,
    symbol: String,
    candles_override: Option<PathBuf>,
    sentiment: String,
) -> Result<()> {
    info!("Starting replay");

    let mut config = Config::from_file(&config_path)?;
    if let Some(candles) = candles_override {
        config.data.candles = candles;
    }

    let sentiment: Sentiment = sentiment.parse().map_err(anyhow::Error::msg)?;
    let symbol = Symbol::new(symbol);
    let candles = data::load_csv(&config.data.candles)?;

    let mut evaluator = StrategyEvaluator::new(config.evaluator.clone());
    let (mut buys, mut sells, mut holds) = (0usize, 0usize, 0usize);

    for candle in &candles {
        let signal = evaluator.evaluate(&symbol, &Kline::from(*candle), sentiment);

        match signal.action {
            SignalAction::Hold => {
                holds += 1;
                continue;
            }
            SignalAction::Buy => buys += 1,
            SignalAction::Sell => sells += 1,
        }

        println!(
            "{} {:<4} {:<10} @ {:>12.4}  size={:<6} stop={:<12} {}",
            candle.time,
            signal.action,
            signal.strategy,
            signal.price,
            signal
                .size_percent
                .map(|s| format!("{:.2}", s))
                .unwrap_or_else(|| "-".to_string()),
            signal
                .stop_loss
                .map(|s| format!("{:.4}", s))
                .unwrap_or_else(|| "-".to_string()),
            signal.reason
        );
    }

    println!("\n{}", "=".repeat(60));
    println!("REPLAY SUMMARY ({})", symbol);
    println!("{}", "=".repeat(60));
    println!("Candles:            {}", candles.len());
    println!("Buy signals:        {}", buys);
    println!("Sell signals:       {}", sells);
    println!("Holds:              {}", holds);
    println!(
        "Pending ghost orders: {}",
        evaluator.pending_orders(&symbol).len()
    );
    println!("{}", "=".repeat(60));

    info!("Replay completed");

    Ok(())
}
