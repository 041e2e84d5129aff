//! Momentum breakout sub-strategy
//!
//! Buys a Donchian breakout when volume spikes and volatility expands, sized
//! by a fixed-edge Kelly fraction. It never emits SELL: exits belong to the
//! order manager, driven by the EMA stop reference returned with each BUY.

use crate::indicators::{average_true_range, exponential_moving_average, kelly_criterion};
use crate::{Candle, OrderType, Sentiment, StrategyKind, TradeSignal};

use super::{Decision, RegimeConfig, StrategyContext};

pub const REASON_DEFENSIVE: &str = "Defensive Mode (Bearish Sentiment)";
pub const REASON_KELLY_LOW: &str = "Kelly Low";
pub const REASON_BREAKOUT: &str = "Momentum Breakout";
pub const REASON_SCANNING: &str = "Scanning Momentum";

/// Evaluate the trending regime for the current bar
pub fn evaluate(ctx: &StrategyContext<'_>, config: &RegimeConfig) -> Decision {
    let cfg = &config.momentum;
    let current = ctx.current();
    let price = current.close;

    if ctx.sentiment == Sentiment::Bearish {
        return TradeSignal::hold(REASON_DEFENSIVE, price, StrategyKind::Momentum).into();
    }

    let previous = ctx.previous();

    let baseline = average_volume(previous, cfg.volume_lookback);
    let high_volume = current.volume > baseline * cfg.volume_spike_multiplier;

    let breakout = match donchian_high(previous, cfg.breakout_lookback) {
        Some(channel_high) => price > channel_high,
        None => false,
    };

    let atr_now = average_true_range(ctx.candles, cfg.atr_period);
    let atr_prev = average_true_range(previous, cfg.atr_period);
    let volatility_expanding = atr_now > atr_prev;

    tracing::trace!(
        symbol = %ctx.symbol,
        high_volume,
        breakout,
        atr_now,
        atr_prev,
        "Momentum checks"
    );

    if !(high_volume && breakout && volatility_expanding) {
        return TradeSignal::hold(REASON_SCANNING, price, StrategyKind::Momentum).into();
    }

    let size = kelly_criterion(cfg.assumed_win_rate, cfg.risk_reward_ratio);
    if size <= 0.0 {
        return TradeSignal::hold(REASON_KELLY_LOW, price, StrategyKind::Momentum).into();
    }

    let stop_loss = exponential_moving_average(&ctx.closes(), cfg.stop_ema_period);

    TradeSignal::buy(REASON_BREAKOUT, price, StrategyKind::Momentum)
        .with_stop_loss(stop_loss)
        .with_size(size)
        .with_order_type(OrderType::Market)
        .into()
}

/// Mean volume of the last `lookback` bars, `0.0` for an empty window
fn average_volume(bars: &[Candle], lookback: usize) -> f64 {
    let window = &bars[bars.len().saturating_sub(lookback)..];
    if window.is_empty() {
        return 0.0;
    }
    window.iter().map(|c| c.volume).sum::<f64>() / window.len() as f64
}

/// Highest high of the last `lookback` bars
fn donchian_high(bars: &[Candle], lookback: usize) -> Option<f64> {
    bars[bars.len().saturating_sub(lookback)..]
        .iter()
        .map(|c| c.high)
        .reduce(f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SignalAction, Symbol};
    use approx::assert_relative_eq;

    fn quiet_bars(count: usize) -> Vec<Candle> {
        (0..count)
            .map(|i| Candle::new_unchecked(i as i64 * 60_000, 100.0, 101.0, 99.0, 100.0, 100.0))
            .collect()
    }

    fn with_breakout(mut bars: Vec<Candle>, volume: f64) -> Vec<Candle> {
        let time = bars.len() as i64 * 60_000;
        bars.push(Candle::new_unchecked(time, 100.0, 110.0, 100.0, 109.0, volume));
        bars
    }

    fn run(candles: &[Candle], sentiment: Sentiment) -> Decision {
        let symbol = Symbol::new("BTCUSDT");
        let ctx = StrategyContext {
            symbol: &symbol,
            candles,
            sentiment,
            pending_orders: &[],
        };
        evaluate(&ctx, &RegimeConfig::default())
    }

    #[test]
    fn test_breakout_buy_with_kelly_size_and_ema_stop() {
        let candles = with_breakout(quiet_bars(60), 500.0);
        let decision = run(&candles, Sentiment::Neutral);
        let signal = decision.signal;

        assert_eq!(signal.action, SignalAction::Buy);
        assert_eq!(signal.reason, REASON_BREAKOUT);
        assert_eq!(signal.strategy, StrategyKind::Momentum);
        assert_eq!(signal.price, 109.0);
        assert_relative_eq!(signal.size_percent.unwrap(), 0.325, epsilon = 1e-12);
        assert!(signal.take_profit.is_none());

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        assert_relative_eq!(
            signal.stop_loss.unwrap(),
            exponential_moving_average(&closes, 20)
        );
        assert!(decision.staged_orders.is_empty());
    }

    #[test]
    fn test_bearish_sentiment_is_defensive() {
        let candles = with_breakout(quiet_bars(60), 500.0);
        let signal = run(&candles, Sentiment::Bearish).signal;
        assert_eq!(signal.action, SignalAction::Hold);
        assert_eq!(signal.reason, REASON_DEFENSIVE);
    }

    #[test]
    fn test_breakout_without_volume_keeps_scanning() {
        let candles = with_breakout(quiet_bars(60), 150.0);
        let signal = run(&candles, Sentiment::Bullish).signal;
        assert_eq!(signal.action, SignalAction::Hold);
        assert_eq!(signal.reason, REASON_SCANNING);
    }

    #[test]
    fn test_kelly_low_holds() {
        let candles = with_breakout(quiet_bars(60), 500.0);
        let symbol = Symbol::new("BTCUSDT");
        let ctx = StrategyContext {
            symbol: &symbol,
            candles: &candles,
            sentiment: Sentiment::Neutral,
            pending_orders: &[],
        };
        let mut config = RegimeConfig::default();
        config.momentum.assumed_win_rate = 0.2;

        let signal = evaluate(&ctx, &config).signal;
        assert_eq!(signal.reason, REASON_KELLY_LOW);
    }

    #[test]
    fn test_donchian_excludes_current_bar() {
        let bars = quiet_bars(30);
        assert_eq!(donchian_high(&bars, 20), Some(101.0));
        assert_eq!(donchian_high(&[], 20), None);
        assert_eq!(average_volume(&bars, 20), 100.0);
        assert_eq!(average_volume(&[], 20), 0.0);
    }
}
