//! Configuration management
//!
//! One JSON file drives every command; each section falls back to defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::backtest::{BacktestSettings, StrategyConfig};
use crate::strategies::RegimeConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Live evaluator thresholds
    pub evaluator: RegimeConfig,
    /// Backtest bar-granularity constants
    pub backtest: BacktestSettings,
    /// Strategies run by the `backtest` command
    pub strategies: Vec<StrategyConfig>,
    pub data: DataConfig,
    /// Momentum parameter sweep for the `optimize` command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid: Option<SweepGrid>,
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for strategy in &self.strategies {
            strategy
                .validate()
                .with_context(|| format!("Invalid strategy '{}'", strategy.label()))?;
        }
        Ok(())
    }

    /// Override the starting capital of every configured strategy
    pub fn set_initial_capital(&mut self, capital: f64) {
        for strategy in &mut self.strategies {
            strategy.set_initial_capital(capital);
        }
    }
}

/// Input and output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Candle CSV replayed by `backtest`, `replay` and `optimize`
    pub candles: PathBuf,
    pub results_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            candles: PathBuf::from("data/BTCUSDT_5m.csv"),
            results_dir: PathBuf::from("results"),
        }
    }
}

/// Parameter values swept by the optimizer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepGrid {
    pub short_period: Vec<usize>,
    pub long_period: Vec<usize>,
    pub initial_capital: f64,
}

impl Default for SweepGrid {
    fn default() -> Self {
        SweepGrid {
            short_period: vec![5, 10, 20],
            long_period: vec![50, 100, 200],
            initial_capital: 10_000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{
            "evaluator": { "adx_trend_threshold": 30.0 },
            "strategies": [
                { "type": "momentum", "initial_capital": 10000, "short_period": 20, "long_period": 50 },
                { "type": "dca", "initial_capital": 5000, "buy_amount": 25, "frequency_days": 7 }
            ],
            "grid": { "short_period": [10, 20], "long_period": [50, 100] }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.evaluator.adx_trend_threshold, 30.0);
        assert_eq!(config.evaluator.min_history, 50);
        assert_eq!(config.backtest.bars_per_day, 288);
        assert_eq!(config.strategies.len(), 2);
        assert_eq!(
            config.strategies[1],
            StrategyConfig::Dca {
                initial_capital: 5000.0,
                buy_amount: 25.0,
                frequency_days: 7
            }
        );
        assert_eq!(config.data.results_dir, PathBuf::from("results"));

        let grid = config.grid.unwrap();
        assert_eq!(grid.long_period, vec![50, 100]);
        assert_eq!(grid.initial_capital, 10_000.0);
    }

    #[test]
    fn test_capital_override() {
        let mut config = Config {
            strategies: vec![StrategyConfig::Grid {
                initial_capital: 1000.0,
                lower_bound: 90.0,
                upper_bound: 110.0,
                grids: 10,
            }],
            ..Config::default()
        };
        config.set_initial_capital(2500.0);
        assert_eq!(config.strategies[0].initial_capital(), 2500.0);
    }

    #[test]
    fn test_invalid_strategy_rejected() {
        let config = Config {
            strategies: vec![StrategyConfig::Momentum {
                initial_capital: 1000.0,
                short_period: 50,
                long_period: 20,
            }],
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
