//! Regime-switching strategy evaluator
//!
//! Owns the per-symbol rolling candle history and the pending ghost (limit)
//! orders, and turns each streamed candle update into a [`TradeSignal`]:
//!
//! 1. Append the update, or overwrite the last bar when the open time repeats
//! 2. Hold until `min_history` bars are available
//! 3. Fill the first pending ghost order the bar's low traded through
//! 4. Otherwise classify the regime by ADX and delegate to the sub-strategy
//!
//! State lives in the evaluator instance, so independent sessions simply use
//! separate evaluators. One evaluator is single-writer (`&mut self`); share it
//! across threads behind a `Mutex`.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, info};

use crate::indicators::average_directional_index;
use crate::strategies::{MarketRegime, RegimeConfig, StagedOrder, StrategyContext};
use crate::{
    Candle, GhostOrder, GhostOrderType, Kline, OrderType, Sentiment, StrategyKind, Symbol,
    TradeSignal,
};

pub const REASON_GATHERING: &str = "Gathering Data";
pub const REASON_GHOST_FILL: &str = "Ghost Order Filled";

/// History and pending orders of one symbol
#[derive(Debug, Default)]
struct SymbolBook {
    history: VecDeque<Candle>,
    ghost_orders: Vec<GhostOrder>,
}

impl SymbolBook {
    /// Append-or-overwrite by open time, evicting the oldest bars past `capacity`
    fn apply_update(&mut self, candle: Candle, capacity: usize) {
        match self.history.back_mut() {
            Some(last) if last.time == candle.time => *last = candle,
            _ => self.history.push_back(candle),
        }

        while self.history.len() > capacity.max(1) {
            self.history.pop_front();
        }
    }

    /// Drop orders older than `ttl_ms` relative to `now`
    fn expire_orders(&mut self, symbol: &Symbol, now: i64, ttl_ms: i64) {
        self.ghost_orders.retain(|order| {
            let alive = now - order.created_at <= ttl_ms;
            if !alive {
                info!(symbol = %symbol, id = %order.id, price = order.price, "Ghost order expired");
            }
            alive
        });
    }

    /// Remove and return the first order whose price the bar's low reached
    fn take_filled(&mut self, low: f64) -> Option<GhostOrder> {
        let index = self.ghost_orders.iter().position(|o| low <= o.price)?;
        Some(self.ghost_orders.remove(index))
    }
}

/// Stateful evaluator for a trading session
#[derive(Debug)]
pub struct StrategyEvaluator {
    config: RegimeConfig,
    books: HashMap<Symbol, SymbolBook>,
    next_order_id: u64,
}

impl StrategyEvaluator {
    pub fn new(config: RegimeConfig) -> Self {
        StrategyEvaluator {
            config,
            books: HashMap::new(),
            next_order_id: 1,
        }
    }

    /// Evaluate one candle update for `symbol`
    pub fn evaluate(&mut self, symbol: &Symbol, update: &Kline, sentiment: Sentiment) -> TradeSignal {
        let Self {
            config,
            books,
            next_order_id,
        } = self;

        let candle = update.to_candle();
        let book = books.entry(symbol.clone()).or_default();
        book.apply_update(candle, config.history_capacity);

        if book.history.len() < config.min_history {
            debug!(
                symbol = %symbol,
                bars = book.history.len(),
                required = config.min_history,
                "Warming up"
            );
            return TradeSignal::hold(REASON_GATHERING, candle.close, StrategyKind::Momentum);
        }

        if let Some(ttl_ms) = config.ghost_order_ttl_ms {
            book.expire_orders(symbol, candle.time, ttl_ms);
        }

        if let Some(order) = book.take_filled(candle.low) {
            info!(
                symbol = %symbol,
                id = %order.id,
                price = order.price,
                size = order.size,
                "Ghost order filled"
            );
            return TradeSignal::buy(REASON_GHOST_FILL, order.price, StrategyKind::Grid)
                .with_size(order.size)
                .with_order_type(OrderType::Limit);
        }

        let history: &[Candle] = book.history.make_contiguous();
        let adx = average_directional_index(history, config.adx_period);
        let regime = MarketRegime::classify(adx, config.adx_trend_threshold);

        let ctx = StrategyContext {
            symbol,
            candles: history,
            sentiment,
            pending_orders: &book.ghost_orders,
        };
        let decision = (regime.strategy())(&ctx, &*config);

        debug!(
            symbol = %symbol,
            ?regime,
            adx,
            action = %decision.signal.action,
            reason = %decision.signal.reason,
            "Evaluated"
        );

        for staged in decision.staged_orders {
            let order = register(symbol, staged, candle.time, next_order_id);
            info!(
                symbol = %symbol,
                id = %order.id,
                price = order.price,
                size = order.size,
                "Ghost order registered"
            );
            book.ghost_orders.push(order);
        }

        decision.signal
    }

    /// Number of bars currently held for `symbol`
    pub fn history_len(&self, symbol: &Symbol) -> usize {
        self.books.get(symbol).map_or(0, |b| b.history.len())
    }

    /// Pending ghost orders for `symbol`, oldest first
    pub fn pending_orders(&self, symbol: &Symbol) -> &[GhostOrder] {
        self.books
            .get(symbol)
            .map(|b| b.ghost_orders.as_slice())
            .unwrap_or(&[])
    }

    /// Forget history and pending orders for `symbol`
    pub fn reset(&mut self, symbol: &Symbol) {
        self.books.remove(symbol);
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.books.keys()
    }
}

impl Default for StrategyEvaluator {
    fn default() -> Self {
        Self::new(RegimeConfig::default())
    }
}

fn register(symbol: &Symbol, staged: StagedOrder, created_at: i64, next_id: &mut u64) -> GhostOrder {
    let id = format!("{}-ghost-{}", symbol, next_id);
    *next_id += 1;

    GhostOrder {
        id,
        order_type: GhostOrderType::BuyLimit,
        price: staged.price,
        size: staged.size,
        created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SignalAction;

    fn kline(open_time: i64, close: f64) -> Kline {
        Kline {
            open_time,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10.0,
            is_closed: false,
        }
    }

    #[test]
    fn test_same_open_time_overwrites() {
        let mut evaluator = StrategyEvaluator::new(RegimeConfig::default());
        let symbol = Symbol::new("BTCUSDT");

        evaluator.evaluate(&symbol, &kline(1_000, 100.0), Sentiment::Neutral);
        evaluator.evaluate(&symbol, &kline(1_000, 101.0), Sentiment::Neutral);
        assert_eq!(evaluator.history_len(&symbol), 1);

        evaluator.evaluate(&symbol, &kline(2_000, 102.0), Sentiment::Neutral);
        assert_eq!(evaluator.history_len(&symbol), 2);
    }

    #[test]
    fn test_history_is_capped_fifo() {
        let config = RegimeConfig {
            history_capacity: 5,
            min_history: 10,
            ..RegimeConfig::default()
        };
        let mut evaluator = StrategyEvaluator::new(config);
        let symbol = Symbol::new("BTCUSDT");

        for i in 0..8 {
            evaluator.evaluate(&symbol, &kline(i * 1_000, 100.0 + i as f64), Sentiment::Neutral);
        }
        assert_eq!(evaluator.history_len(&symbol), 5);

        let book = &evaluator.books[&symbol];
        assert_eq!(book.history.front().map(|c| c.time), Some(3_000));
        assert_eq!(book.history.back().map(|c| c.close), Some(107.0));
    }

    #[test]
    fn test_cold_start_holds() {
        let mut evaluator = StrategyEvaluator::new(RegimeConfig::default());
        let symbol = Symbol::new("BTCUSDT");

        for i in 0..49 {
            let signal = evaluator.evaluate(&symbol, &kline(i * 1_000, 100.0), Sentiment::Bullish);
            assert_eq!(signal.action, SignalAction::Hold);
            assert_eq!(signal.reason, REASON_GATHERING);
        }
    }

    #[test]
    fn test_symbols_are_isolated() {
        let mut evaluator = StrategyEvaluator::new(RegimeConfig::default());
        let btc = Symbol::new("BTCUSDT");
        let eth = Symbol::new("ETHUSDT");

        evaluator.evaluate(&btc, &kline(0, 100.0), Sentiment::Neutral);
        evaluator.evaluate(&btc, &kline(1_000, 100.0), Sentiment::Neutral);
        evaluator.evaluate(&eth, &kline(0, 10.0), Sentiment::Neutral);

        assert_eq!(evaluator.history_len(&btc), 2);
        assert_eq!(evaluator.history_len(&eth), 1);
        assert_eq!(evaluator.symbols().count(), 2);

        evaluator.reset(&btc);
        assert_eq!(evaluator.history_len(&btc), 0);
        assert!(evaluator.pending_orders(&btc).is_empty());
    }

    #[test]
    fn test_take_filled_pops_first_reached_order() {
        let mut book = SymbolBook::default();
        let mut next_id = 1;
        let symbol = Symbol::new("SOLUSDT");
        for price in [98.0, 97.0] {
            let order = register(&symbol, StagedOrder { price, size: 0.3 }, 0, &mut next_id);
            book.ghost_orders.push(order);
        }

        assert!(book.take_filled(99.0).is_none());
        let filled = book.take_filled(96.5).unwrap();
        assert_eq!(filled.price, 98.0);
        assert_eq!(filled.id, "SOLUSDT-ghost-1");
        assert_eq!(book.ghost_orders.len(), 1);
    }

    #[test]
    fn test_expire_orders_by_age() {
        let mut book = SymbolBook::default();
        let mut next_id = 1;
        let symbol = Symbol::new("SOLUSDT");
        book.ghost_orders
            .push(register(&symbol, StagedOrder { price: 98.0, size: 0.3 }, 0, &mut next_id));
        book.ghost_orders
            .push(register(&symbol, StagedOrder { price: 97.0, size: 0.4 }, 5_000, &mut next_id));

        book.expire_orders(&symbol, 6_000, 2_000);
        assert_eq!(book.ghost_orders.len(), 1);
        assert_eq!(book.ghost_orders[0].price, 97.0);
    }
}
