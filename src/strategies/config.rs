//! Regime evaluator configuration
//!
//! Every default below is the constant the live evaluator trades with; JSON
//! config files only need to name the fields they change.

use serde::{Deserialize, Serialize};

use crate::Sentiment;

/// Top-level configuration of the regime-switching evaluator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    /// Maximum candles kept per symbol, oldest evicted first (default: 200)
    pub history_capacity: usize,
    /// Candles required before any analysis (default: 50)
    pub min_history: usize,
    /// ADX period for regime classification (default: 14)
    pub adx_period: usize,
    /// ADX strictly above this is a trending market (default: 25.0)
    pub adx_trend_threshold: f64,
    /// Pending ghost orders older than this many milliseconds are dropped.
    /// `None` keeps them until filled (default: None)
    pub ghost_order_ttl_ms: Option<i64>,
    pub momentum: MomentumConfig,
    pub grid: GridConfig,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        RegimeConfig {
            history_capacity: 200,
            min_history: 50,
            adx_period: 14,
            adx_trend_threshold: 25.0,
            ghost_order_ttl_ms: None,
            momentum: MomentumConfig::default(),
            grid: GridConfig::default(),
        }
    }
}

/// Trend-following breakout parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumConfig {
    /// Bars averaged for the volume baseline, current bar excluded (default: 20)
    pub volume_lookback: usize,
    /// Current volume must exceed baseline times this (default: 2.0)
    pub volume_spike_multiplier: f64,
    /// Donchian channel length, current bar excluded (default: 20)
    pub breakout_lookback: usize,
    /// ATR period for the volatility-expansion check (default: 14)
    pub atr_period: usize,
    /// Win rate assumed by Kelly sizing (default: 0.55)
    pub assumed_win_rate: f64,
    /// Risk:reward assumed by Kelly sizing (default: 2.0)
    pub risk_reward_ratio: f64,
    /// EMA period of the stop-loss reference (default: 20)
    pub stop_ema_period: usize,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        MomentumConfig {
            volume_lookback: 20,
            volume_spike_multiplier: 2.0,
            breakout_lookback: 20,
            atr_period: 14,
            assumed_win_rate: 0.55,
            risk_reward_ratio: 2.0,
            stop_ema_period: 20,
        }
    }
}

/// A staged limit buy placed below the current price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridLayer {
    /// Limit price as a fraction of the entry price
    pub price_factor: f64,
    /// Fraction of capital
    pub size: f64,
}

/// Mean-reversion grid parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// RSI period (default: 14)
    pub rsi_period: usize,
    /// Bollinger period (default: 20)
    pub bollinger_period: usize,
    /// Bollinger band width in standard deviations (default: 2.0)
    pub bollinger_std_dev: f64,
    /// RSI above this exits the grid (default: 50.0)
    pub take_profit_rsi: f64,
    /// Oversold RSI under bullish sentiment (default: 40.0)
    pub oversold_bullish: f64,
    /// Oversold RSI under neutral sentiment (default: 30.0)
    pub oversold_neutral: f64,
    /// Oversold RSI under bearish sentiment (default: 20.0)
    pub oversold_bearish: f64,
    /// Size of the immediate market buy (default: 0.30)
    pub first_layer_size: f64,
    /// Deeper limit layers (default: 0.985 @ 30%, 0.970 @ 40%)
    pub layers: Vec<GridLayer>,
    /// Skip a layer when a pending order sits within this relative distance
    /// of its price (default: 0.005)
    pub dedup_tolerance: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            rsi_period: 14,
            bollinger_period: 20,
            bollinger_std_dev: 2.0,
            take_profit_rsi: 50.0,
            oversold_bullish: 40.0,
            oversold_neutral: 30.0,
            oversold_bearish: 20.0,
            first_layer_size: 0.30,
            layers: vec![
                GridLayer {
                    price_factor: 0.985,
                    size: 0.30,
                },
                GridLayer {
                    price_factor: 0.970,
                    size: 0.40,
                },
            ],
            dedup_tolerance: 0.005,
        }
    }
}

impl GridConfig {
    /// RSI level below which the market counts as oversold
    pub fn oversold_threshold(&self, sentiment: Sentiment) -> f64 {
        match sentiment {
            Sentiment::Bullish => self.oversold_bullish,
            Sentiment::Bearish => self.oversold_bearish,
            Sentiment::Neutral => self.oversold_neutral,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: RegimeConfig =
            serde_json::from_str(r#"{ "adx_trend_threshold": 30.0, "grid": { "rsi_period": 7 } }"#)
                .unwrap();

        assert_eq!(config.adx_trend_threshold, 30.0);
        assert_eq!(config.history_capacity, 200);
        assert_eq!(config.grid.rsi_period, 7);
        assert_eq!(config.grid.layers.len(), 2);
        assert_eq!(config.momentum.assumed_win_rate, 0.55);
        assert!(config.ghost_order_ttl_ms.is_none());
    }

    #[test]
    fn test_oversold_threshold_by_sentiment() {
        let grid = GridConfig::default();
        assert_eq!(grid.oversold_threshold(Sentiment::Bullish), 40.0);
        assert_eq!(grid.oversold_threshold(Sentiment::Neutral), 30.0);
        assert_eq!(grid.oversold_threshold(Sentiment::Bearish), 20.0);
    }
}
