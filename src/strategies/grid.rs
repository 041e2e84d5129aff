//! Mean-reversion grid sub-strategy
//!
//! Exits everything once RSI recovers or price tags the upper band. Enters on
//! oversold closes below the lower band with an immediate market layer and
//! stages deeper limit layers for the evaluator to track.

use crate::indicators::{bollinger_bands, relative_strength_index};
use crate::{GhostOrder, OrderType, StrategyKind, TradeSignal};

use super::{Decision, GridConfig, RegimeConfig, StagedOrder, StrategyContext};

pub const REASON_TAKE_PROFIT: &str = "Grid Take Profit";
pub const REASON_LAYER_ONE: &str = "Grid Layer 1";
pub const REASON_SCANNING: &str = "Grid Scanning";

/// Evaluate the ranging regime for the current bar
pub fn evaluate(ctx: &StrategyContext<'_>, config: &RegimeConfig) -> Decision {
    let cfg = &config.grid;
    let closes = ctx.closes();
    let price = ctx.current().close;

    let rsi = relative_strength_index(&closes, cfg.rsi_period);
    let bands = bollinger_bands(&closes, cfg.bollinger_period, cfg.bollinger_std_dev);

    if rsi > cfg.take_profit_rsi || price >= bands.upper {
        return TradeSignal::sell(REASON_TAKE_PROFIT, price, StrategyKind::Grid)
            .with_order_type(OrderType::Market)
            .into();
    }

    let oversold = rsi < cfg.oversold_threshold(ctx.sentiment);
    if !(oversold && price < bands.lower) {
        let reason = format!("{} (RSI {:.1})", REASON_SCANNING, rsi);
        return TradeSignal::hold(reason, price, StrategyKind::Grid).into();
    }

    let staged_orders = stage_layers(price, cfg, ctx.pending_orders);
    tracing::debug!(
        symbol = %ctx.symbol,
        rsi,
        lower_band = bands.lower,
        staged = staged_orders.len(),
        "Grid entry"
    );

    Decision {
        signal: TradeSignal::buy(REASON_LAYER_ONE, price, StrategyKind::Grid)
            .with_size(cfg.first_layer_size)
            .with_order_type(OrderType::Market),
        staged_orders,
    }
}

/// Limit layers below `price`, skipping any already covered by a pending order
fn stage_layers(price: f64, cfg: &GridConfig, pending: &[GhostOrder]) -> Vec<StagedOrder> {
    let mut staged: Vec<StagedOrder> = Vec::with_capacity(cfg.layers.len());

    for layer in &cfg.layers {
        let target = price * layer.price_factor;
        let covered = pending
            .iter()
            .map(|o| o.price)
            .chain(staged.iter().map(|o| o.price))
            .any(|existing| is_near(existing, target, cfg.dedup_tolerance));

        if !covered {
            staged.push(StagedOrder {
                price: target,
                size: layer.size,
            });
        }
    }

    staged
}

fn is_near(existing: f64, target: f64, tolerance: f64) -> bool {
    if target == 0.0 {
        return existing == 0.0;
    }
    ((existing - target) / target).abs() <= tolerance
}
