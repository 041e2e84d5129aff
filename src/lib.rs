//! Paper-trading strategy core
//!
//! Technical indicators, a regime-switching strategy evaluator for streamed
//! candles, and a deterministic bar-by-bar backtest replay with parameter
//! sweeps.

pub mod backtest;
pub mod config;
pub mod data;
pub mod error;
pub mod evaluator;
pub mod feed;
pub mod indicators;
pub mod optimizer;
pub mod strategies;
pub mod types;

pub use backtest::{run_backtest, BacktestResult, BacktestSettings, Backtester, StrategyConfig};
pub use config::Config;
pub use error::{BacktestError, FeedError};
pub use evaluator::StrategyEvaluator;
pub use strategies::{MarketRegime, RegimeConfig};
pub use types::*;
