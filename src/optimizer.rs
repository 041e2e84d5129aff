//! Parameter sweep over backtest configurations
//!
//! Expands a [`SweepGrid`] into momentum configurations and replays each one
//! against the same candle series in parallel.

use indicatif::ProgressBar;
use itertools::iproduct;
use rayon::prelude::*;
use serde::Serialize;

use crate::backtest::{BacktestResult, Backtester, StrategyConfig};
use crate::config::SweepGrid;
use crate::Candle;

/// Outcome of one parameter combination
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationResult {
    pub config: StrategyConfig,
    pub total_return: f64,
    pub total_return_percent: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub total_trades: usize,
    /// Return in excess of buy-and-hold, percent
    pub excess_return_percent: f64,
}

impl OptimizationResult {
    fn from_result(config: StrategyConfig, result: &BacktestResult) -> Self {
        OptimizationResult {
            config,
            total_return: result.total_return,
            total_return_percent: result.total_return_percent,
            max_drawdown: result.max_drawdown,
            win_rate: result.win_rate,
            total_trades: result.total_trades,
            excess_return_percent: result.total_return_percent - result.benchmark_return_percent,
        }
    }
}

/// Momentum configurations for every `short < long` pair of the grid
pub fn momentum_configs(grid: &SweepGrid) -> Vec<StrategyConfig> {
    iproduct!(grid.short_period.iter(), grid.long_period.iter())
        .filter(|(short, long)| short < long)
        .map(|(&short_period, &long_period)| StrategyConfig::Momentum {
            initial_capital: grid.initial_capital,
            short_period,
            long_period,
        })
        .collect()
}

/// Runs configurations against one candle series
pub struct Optimizer<'a> {
    backtester: Backtester,
    candles: &'a [Candle],
}

impl<'a> Optimizer<'a> {
    pub fn new(backtester: Backtester, candles: &'a [Candle]) -> Self {
        Optimizer {
            backtester,
            candles,
        }
    }

    fn evaluate(&self, config: &StrategyConfig) -> Option<OptimizationResult> {
        match self.backtester.run(self.candles, config) {
            Ok(result) => Some(OptimizationResult::from_result(config.clone(), &result)),
            Err(e) => {
                tracing::warn!(strategy = %config.label(), error = %e, "Skipping configuration");
                None
            }
        }
    }

    /// Run in parallel, ticking `progress_bar` once per configuration
    pub fn optimize_with_progress(
        &self,
        configs: &[StrategyConfig],
        progress_bar: &ProgressBar,
    ) -> Vec<OptimizationResult> {
        tracing::info!("Testing {} parameter combinations", configs.len());

        configs
            .par_iter()
            .filter_map(|config| {
                let result = self.evaluate(config);
                progress_bar.inc(1);
                result
            })
            .collect()
    }

    /// Run sequentially (for debugging)
    pub fn optimize_sequential(&self, configs: &[StrategyConfig]) -> Vec<OptimizationResult> {
        tracing::info!(
            "Testing {} parameter combinations sequentially",
            configs.len()
        );

        configs.iter().filter_map(|config| self.evaluate(config)).collect()
    }
}

/// Sort best-first by `sort_by` (`return`, `drawdown`, `win_rate`, `excess`)
pub fn sort_results(results: &mut [OptimizationResult], sort_by: &str) {
    results.sort_by(|a, b| {
        let (va, vb) = match sort_by {
            // Smaller drawdown is better
            "drawdown" => (-a.max_drawdown, -b.max_drawdown),
            "win_rate" => (a.win_rate, b.win_rate),
            "excess" => (a.excess_return_percent, b.excess_return_percent),
            _ => (a.total_return, b.total_return),
        };
        vb.partial_cmp(&va).unwrap_or(std::cmp::Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trending_candles(count: usize) -> Vec<Candle> {
        (0..count)
            .map(|i| {
                let price = 100.0 + (i as f64 * 0.05).sin() * 10.0;
                Candle::new_unchecked(i as i64 * 300_000, price, price + 0.5, price - 0.5, price, 1.0)
            })
            .collect()
    }

    #[test]
    fn test_momentum_configs_skip_inverted_pairs() {
        let grid = SweepGrid {
            short_period: vec![10, 50],
            long_period: vec![20, 50],
            initial_capital: 1000.0,
        };
        let configs = momentum_configs(&grid);

        // (10,20), (10,50); (50,20) and (50,50) are dropped
        assert_eq!(configs.len(), 2);
        assert!(configs.iter().all(|c| c.validate().is_ok()));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let candles = trending_candles(600);
        let grid = SweepGrid {
            short_period: vec![5, 10],
            long_period: vec![20, 40],
            initial_capital: 1000.0,
        };
        let configs = momentum_configs(&grid);
        let optimizer = Optimizer::new(Backtester::default(), &candles);

        // rayon keeps input order on collect
        let parallel = optimizer.optimize_with_progress(&configs, &ProgressBar::hidden());
        let sequential = optimizer.optimize_sequential(&configs);

        assert_eq!(parallel.len(), 4);
        for (p, s) in parallel.iter().zip(&sequential) {
            assert_eq!(p.config, s.config);
            assert_eq!(p.total_return, s.total_return);
        }
    }

    #[test]
    fn test_sort_by_drawdown_is_ascending() {
        let make = |dd: f64| OptimizationResult {
            config: StrategyConfig::Momentum {
                initial_capital: 1.0,
                short_period: 1,
                long_period: 2,
            },
            total_return: 0.0,
            total_return_percent: 0.0,
            max_drawdown: dd,
            win_rate: 0.0,
            total_trades: 0,
            excess_return_percent: 0.0,
        };
        let mut results = vec![make(12.0), make(3.0), make(7.0)];
        sort_results(&mut results, "drawdown");

        let order: Vec<f64> = results.iter().map(|r| r.max_drawdown).collect();
        assert_eq!(order, vec![3.0, 7.0, 12.0]);
    }
}
