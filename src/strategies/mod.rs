//! Regime-switching sub-strategies
//!
//! The evaluator classifies each update as [`MarketRegime::Trending`] or
//! [`MarketRegime::Ranging`] and hands the same [`StrategyContext`] to the
//! matching sub-strategy:
//! - `momentum`: Donchian breakout confirmed by volume and expanding ATR
//! - `grid`: RSI/Bollinger mean reversion with staged limit layers
//!
//! Sub-strategies are pure functions. Pending-order bookkeeping stays in
//! [`crate::evaluator::StrategyEvaluator`]; a sub-strategy only reports the
//! orders it wants staged.

pub mod config;
pub mod grid;
pub mod momentum;

pub use config::{GridConfig, GridLayer, MomentumConfig, RegimeConfig};

use serde::{Deserialize, Serialize};

use crate::{Candle, GhostOrder, Sentiment, Symbol, TradeSignal};

/// Market regime derived from trend strength
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketRegime {
    /// ADX above threshold - breakout trading
    Trending,
    /// ADX at or below threshold - mean-reversion grid
    Ranging,
}

/// Signature shared by every sub-strategy
pub type SubStrategy = fn(&StrategyContext<'_>, &RegimeConfig) -> Decision;

impl MarketRegime {
    pub fn classify(adx: f64, trend_threshold: f64) -> Self {
        if adx > trend_threshold {
            MarketRegime::Trending
        } else {
            MarketRegime::Ranging
        }
    }

    /// Sub-strategy responsible for this regime
    pub fn strategy(self) -> SubStrategy {
        match self {
            MarketRegime::Trending => momentum::evaluate,
            MarketRegime::Ranging => grid::evaluate,
        }
    }
}

/// Inputs shared by both sub-strategies
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext<'a> {
    pub symbol: &'a Symbol,
    /// Rolling history, oldest first; the last entry is the current bar
    pub candles: &'a [Candle],
    pub sentiment: Sentiment,
    /// Ghost orders already pending for `symbol`
    pub pending_orders: &'a [GhostOrder],
}

impl<'a> StrategyContext<'a> {
    /// Current bar. Callers guarantee a non-empty history.
    pub fn current(&self) -> &'a Candle {
        &self.candles[self.candles.len() - 1]
    }

    /// Bars before the current one
    pub fn previous(&self) -> &'a [Candle] {
        &self.candles[..self.candles.len().saturating_sub(1)]
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }
}

/// Limit buy a sub-strategy wants registered
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StagedOrder {
    pub price: f64,
    pub size: f64,
}

/// Output of a sub-strategy for one update
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub signal: TradeSignal,
    pub staged_orders: Vec<StagedOrder>,
}

impl From<TradeSignal> for Decision {
    fn from(signal: TradeSignal) -> Self {
        Decision {
            signal,
            staged_orders: Vec::new(),
        }
    }
}
