//! Backtesting engine
//!
//! Deterministic bar-by-bar replay of one candle series against a
//! [`StrategyConfig`]:
//! - **DCA**: fixed-amount buy every `bars_per_day * frequency_days` bars, never sells
//! - **Momentum**: all-in on short SMA above long SMA, all-out on the reverse
//! - **Grid**: continuous rebalance toward a fixed asset allocation. This is
//!   a proxy for a layered grid, not a true one: `lower_bound`, `upper_bound`
//!   and `grids` are validated but do not drive the replay.
//!
//! Bar counts (`bars_per_day = 288`, `equity_sample_stride = 48`) assume
//! 5-minute candles. They are properties of the bar granularity, not of
//! calendar time: feeding hourly candles makes "daily" DCA buy every 12 days.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::BacktestError;
use crate::indicators::simple_moving_average;
use crate::{BacktestTrade, Candle, EquityPoint, Side, TradeStatus};

/// Strategy replayed by the backtester
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StrategyConfig {
    Dca {
        initial_capital: f64,
        buy_amount: f64,
        frequency_days: u32,
    },
    Grid {
        initial_capital: f64,
        lower_bound: f64,
        upper_bound: f64,
        grids: u32,
    },
    Momentum {
        initial_capital: f64,
        short_period: usize,
        long_period: usize,
    },
}

impl StrategyConfig {
    pub fn initial_capital(&self) -> f64 {
        match self {
            StrategyConfig::Dca {
                initial_capital, ..
            }
            | StrategyConfig::Grid {
                initial_capital, ..
            }
            | StrategyConfig::Momentum {
                initial_capital, ..
            } => *initial_capital,
        }
    }

    pub fn set_initial_capital(&mut self, capital: f64) {
        match self {
            StrategyConfig::Dca {
                initial_capital, ..
            }
            | StrategyConfig::Grid {
                initial_capital, ..
            }
            | StrategyConfig::Momentum {
                initial_capital, ..
            } => *initial_capital = capital,
        }
    }

    /// Short identifier used in reports and file names
    pub fn label(&self) -> String {
        match self {
            StrategyConfig::Dca {
                buy_amount,
                frequency_days,
                ..
            } => format!("dca_{}x{}d", buy_amount, frequency_days),
            StrategyConfig::Grid {
                lower_bound,
                upper_bound,
                grids,
                ..
            } => format!("grid_{}-{}x{}", lower_bound, upper_bound, grids),
            StrategyConfig::Momentum {
                short_period,
                long_period,
                ..
            } => format!("momentum_{}-{}", short_period, long_period),
        }
    }

    pub fn validate(&self) -> Result<(), BacktestError> {
        let invalid = |msg: &str| Err(BacktestError::InvalidConfig(msg.to_string()));

        let capital = self.initial_capital();
        if !(capital.is_finite() && capital > 0.0) {
            return invalid("initial_capital must be positive");
        }

        match *self {
            StrategyConfig::Dca {
                buy_amount,
                frequency_days,
                ..
            } => {
                if !(buy_amount.is_finite() && buy_amount > 0.0) {
                    return invalid("buy_amount must be positive");
                }
                if frequency_days == 0 {
                    return invalid("frequency_days must be at least 1");
                }
            }
            StrategyConfig::Grid {
                lower_bound,
                upper_bound,
                grids,
                ..
            } => {
                if !(lower_bound.is_finite() && upper_bound.is_finite()) || lower_bound >= upper_bound
                {
                    return invalid("lower_bound must be below upper_bound");
                }
                if grids == 0 {
                    return invalid("grids must be at least 1");
                }
            }
            StrategyConfig::Momentum {
                short_period,
                long_period,
                ..
            } => {
                if short_period == 0 || long_period == 0 {
                    return invalid("SMA periods must be at least 1");
                }
                if short_period >= long_period {
                    return invalid("short_period must be below long_period");
                }
            }
        }

        Ok(())
    }
}

/// Replay constants tied to the assumed bar granularity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSettings {
    /// Bars in one simulated day (default: 288, i.e. 5-minute bars)
    pub bars_per_day: usize,
    /// Record equity every this many bars (default: 48, ~4h of 5-minute bars)
    pub equity_sample_stride: usize,
    /// Grid target share of equity held in the asset (default: 0.5)
    pub grid_target_allocation: f64,
    /// Grid rebalances when off target by more than this share of equity (default: 0.02)
    pub grid_rebalance_threshold: f64,
    /// Holdings below this quantity are zeroed (default: 1e-7)
    pub dust_threshold: f64,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        BacktestSettings {
            bars_per_day: 288,
            equity_sample_stride: 48,
            grid_target_allocation: 0.5,
            grid_rebalance_threshold: 0.02,
            dust_threshold: 1e-7,
        }
    }
}

impl BacktestSettings {
    fn validate(&self) -> Result<(), BacktestError> {
        if self.bars_per_day == 0 || self.equity_sample_stride == 0 {
            return Err(BacktestError::InvalidConfig(
                "bars_per_day and equity_sample_stride must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.grid_target_allocation) {
            return Err(BacktestError::InvalidConfig(
                "grid_target_allocation must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Summary of one replay
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestResult {
    pub total_return: f64,
    pub total_return_percent: f64,
    /// Peak-to-trough decline of the sampled equity curve, percent (positive)
    pub max_drawdown: f64,
    pub benchmark_return: f64,
    pub benchmark_return_percent: f64,
    /// Share of trades with a realised pnl that made money, percent
    pub win_rate: f64,
    pub final_equity: f64,
    pub total_trades: usize,
    /// Trades in `closed` status, including DCA/grid fills and sell legs
    pub closed_trades: usize,
    pub trades: Vec<BacktestTrade>,
    pub equity_curve: Vec<EquityPoint>,
}

/// Cash, holdings and trade log of a replay
#[derive(Debug)]
struct Portfolio {
    cash: f64,
    holdings: f64,
    trades: Vec<BacktestTrade>,
    open_trade: Option<usize>,
    dust_threshold: f64,
}

impl Portfolio {
    fn new(capital: f64, dust_threshold: f64) -> Self {
        Portfolio {
            cash: capital,
            holdings: 0.0,
            trades: Vec::new(),
            open_trade: None,
            dust_threshold,
        }
    }

    fn equity(&self, price: f64) -> f64 {
        self.cash + self.holdings * price
    }

    /// Spend up to `amount` of cash at `price`; returns the quantity bought
    fn buy(&mut self, price: f64, amount: f64) -> f64 {
        let amount = amount.min(self.cash);
        if amount <= 0.0 || price <= 0.0 {
            return 0.0;
        }

        let quantity = amount / price;
        self.cash = (self.cash - amount).max(0.0);
        self.holdings += quantity;
        quantity
    }

    /// Sell up to `quantity`; returns the quantity sold
    fn sell(&mut self, price: f64, quantity: f64) -> f64 {
        let quantity = quantity.min(self.holdings);
        if quantity <= 0.0 {
            return 0.0;
        }

        self.cash += quantity * price;
        self.holdings -= quantity;
        if self.holdings < self.dust_threshold {
            self.holdings = 0.0;
        }
        quantity
    }

    /// Append a trade and return its index
    fn record(
        &mut self,
        time: i64,
        side: Side,
        price: f64,
        quantity: f64,
        status: TradeStatus,
    ) -> usize {
        let id = self.trades.len() as u64 + 1;
        self.trades.push(BacktestTrade {
            id,
            entry_time: time,
            exit_time: None,
            side,
            price,
            quantity,
            pnl: None,
            pnl_percent: None,
            status,
        });
        debug!(id, ?side, price, quantity, ?status, "Trade recorded");
        self.trades.len() - 1
    }

    /// Close the open momentum entry at `price`
    fn close_open_trade(&mut self, time: i64, price: f64) -> Option<f64> {
        let index = self.open_trade.take()?;
        let trade = &mut self.trades[index];

        let cost_basis = trade.cost_basis();
        let pnl = price * trade.quantity - cost_basis;
        trade.exit_time = Some(time);
        trade.pnl = Some(pnl);
        trade.pnl_percent = Some(if cost_basis > 0.0 {
            pnl / cost_basis * 100.0
        } else {
            0.0
        });
        trade.status = TradeStatus::Closed;
        Some(pnl)
    }
}

/// Backtest engine
#[derive(Debug, Clone, Default)]
pub struct Backtester {
    settings: BacktestSettings,
}

impl Backtester {
    pub fn new(settings: BacktestSettings) -> Self {
        Backtester { settings }
    }

    /// Replay `candles` (chronological) against `config`
    pub fn run(
        &self,
        candles: &[Candle],
        config: &StrategyConfig,
    ) -> Result<BacktestResult, BacktestError> {
        self.settings.validate()?;
        config.validate()?;
        validate_series(candles)?;

        let initial_capital = config.initial_capital();
        let mut portfolio = Portfolio::new(initial_capital, self.settings.dust_threshold);
        let mut equity_curve = Vec::with_capacity(candles.len() / self.settings.equity_sample_stride + 1);
        let mut closes: Vec<f64> = Vec::with_capacity(candles.len());

        for (i, candle) in candles.iter().enumerate() {
            let price = candle.close;

            match *config {
                StrategyConfig::Dca {
                    buy_amount,
                    frequency_days,
                    ..
                } => {
                    let interval = self.settings.bars_per_day * frequency_days as usize;
                    if i % interval == 0 && portfolio.cash >= buy_amount {
                        let quantity = portfolio.buy(price, buy_amount);
                        portfolio.record(candle.time, Side::Buy, price, quantity, TradeStatus::Closed);
                    }
                }
                StrategyConfig::Momentum {
                    short_period,
                    long_period,
                    ..
                } => {
                    closes.push(price);
                    if closes.len() >= long_period {
                        let short = simple_moving_average(&closes, short_period);
                        let long = simple_moving_average(&closes, long_period);
                        self.step_momentum(&mut portfolio, candle, short, long);
                    }
                }
                StrategyConfig::Grid { .. } => self.step_grid(&mut portfolio, candle),
            }

            if i % self.settings.equity_sample_stride == 0 {
                equity_curve.push(EquityPoint {
                    time: candle.time,
                    value: portfolio.equity(price),
                });
            }
        }

        // Force-liquidate at the final close
        let (first, last) = match (candles.first(), candles.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(BacktestError::EmptySeries),
        };
        portfolio.close_open_trade(last.time, last.close);
        let final_equity = portfolio.equity(last.close);
        portfolio.cash = final_equity;
        portfolio.holdings = 0.0;

        let total_return = final_equity - initial_capital;
        let benchmark_equity = initial_capital * (last.close / first.close);
        let benchmark_return = benchmark_equity - initial_capital;

        let result = BacktestResult {
            total_return,
            total_return_percent: total_return / initial_capital * 100.0,
            max_drawdown: max_drawdown(&equity_curve),
            benchmark_return,
            benchmark_return_percent: benchmark_return / initial_capital * 100.0,
            win_rate: win_rate(&portfolio.trades),
            final_equity,
            total_trades: portfolio.trades.len(),
            closed_trades: portfolio
                .trades
                .iter()
                .filter(|t| t.status == TradeStatus::Closed)
                .count(),
            trades: portfolio.trades,
            equity_curve,
        };

        info!(
            strategy = %config.label(),
            bars = candles.len(),
            trades = result.trades.len(),
            total_return_pct = result.total_return_percent,
            max_drawdown_pct = result.max_drawdown,
            "Backtest complete"
        );

        Ok(result)
    }

    fn step_momentum(&self, portfolio: &mut Portfolio, candle: &Candle, short: f64, long: f64) {
        let price = candle.close;

        if short > long && portfolio.open_trade.is_none() {
            let quantity = portfolio.buy(price, portfolio.cash);
            if quantity > 0.0 {
                let index = portfolio.record(candle.time, Side::Buy, price, quantity, TradeStatus::Open);
                portfolio.open_trade = Some(index);
            }
        } else if short < long && portfolio.open_trade.is_some() {
            let quantity = portfolio.sell(price, portfolio.holdings);
            if let Some(pnl) = portfolio.close_open_trade(candle.time, price) {
                debug!(price, pnl, "Momentum exit");
            }
            let index = portfolio.record(candle.time, Side::Sell, price, quantity, TradeStatus::Closed);
            portfolio.trades[index].exit_time = Some(candle.time);
        }
    }

    fn step_grid(&self, portfolio: &mut Portfolio, candle: &Candle) {
        let price = candle.close;
        let equity = portfolio.equity(price);
        let target_value = equity * self.settings.grid_target_allocation;
        let deviation = portfolio.holdings * price - target_value;

        if deviation.abs() <= equity * self.settings.grid_rebalance_threshold {
            return;
        }

        if deviation > 0.0 {
            let quantity = portfolio.sell(price, deviation / price);
            if quantity > 0.0 {
                portfolio.record(candle.time, Side::Sell, price, quantity, TradeStatus::Closed);
            }
        } else {
            let quantity = portfolio.buy(price, -deviation);
            if quantity > 0.0 {
                portfolio.record(candle.time, Side::Buy, price, quantity, TradeStatus::Closed);
            }
        }
    }
}

/// Replay with default settings (5-minute bars)
pub fn run_backtest(
    candles: &[Candle],
    config: &StrategyConfig,
) -> Result<BacktestResult, BacktestError> {
    Backtester::default().run(candles, config)
}

fn validate_series(candles: &[Candle]) -> Result<(), BacktestError> {
    if candles.is_empty() {
        return Err(BacktestError::EmptySeries);
    }

    for (index, candle) in candles.iter().enumerate() {
        if !(candle.close.is_finite() && candle.close > 0.0) {
            return Err(BacktestError::NonPositivePrice {
                index,
                price: candle.close,
            });
        }
    }

    Ok(())
}

/// Largest running-peak drawdown of the curve, percent
pub fn max_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    let mut peak = match equity_curve.first() {
        Some(point) => point.value,
        None => return 0.0,
    };
    let mut max_dd = 0.0_f64;

    for point in equity_curve {
        if point.value > peak {
            peak = point.value;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - point.value) / peak);
        }
    }

    max_dd * 100.0
}

/// Winning share of trades that carry a pnl, percent
pub fn win_rate(trades: &[BacktestTrade]) -> f64 {
    let (wins, total) = trades
        .iter()
        .filter(|t| t.pnl.is_some())
        .fold((0usize, 0usize), |(w, n), t| {
            (w + usize::from(t.is_winner()), n + 1)
        });

    if total == 0 {
        0.0
    } else {
        wins as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn flat(count: usize, price: f64) -> Vec<Candle> {
        (0..count)
            .map(|i| Candle::new_unchecked(i as i64 * 300_000, price, price, price, price, 1.0))
            .collect()
    }

    #[test]
    fn test_portfolio_buy_is_clamped_to_cash() {
        let mut portfolio = Portfolio::new(100.0, 1e-7);
        let quantity = portfolio.buy(10.0, 250.0);

        assert_relative_eq!(quantity, 10.0);
        assert_eq!(portfolio.cash, 0.0);
        assert_eq!(portfolio.buy(10.0, 50.0), 0.0);
        assert!(portfolio.cash >= 0.0);
    }

    #[test]
    fn test_portfolio_sell_zeroes_dust() {
        let mut portfolio = Portfolio::new(100.0, 1e-7);
        portfolio.buy(10.0, 100.0);
        portfolio.sell(10.0, 10.0 - 5e-8);

        assert_eq!(portfolio.holdings, 0.0);
        assert_eq!(portfolio.sell(10.0, 1.0), 0.0);
    }

    #[test]
    fn test_empty_series_rejected() {
        let config = StrategyConfig::Dca {
            initial_capital: 1000.0,
            buy_amount: 10.0,
            frequency_days: 1,
        };
        assert_eq!(run_backtest(&[], &config), Err(BacktestError::EmptySeries));
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let candles = flat(10, 100.0);
        let configs = [
            StrategyConfig::Momentum {
                initial_capital: 1000.0,
                short_period: 20,
                long_period: 5,
            },
            StrategyConfig::Grid {
                initial_capital: 1000.0,
                lower_bound: 110.0,
                upper_bound: 90.0,
                grids: 5,
            },
            StrategyConfig::Dca {
                initial_capital: 0.0,
                buy_amount: 10.0,
                frequency_days: 1,
            },
        ];

        for config in &configs {
            assert!(matches!(
                run_backtest(&candles, config),
                Err(BacktestError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_non_positive_close_rejected() {
        let mut candles = flat(10, 100.0);
        candles[3].close = 0.0;
        let config = StrategyConfig::Grid {
            initial_capital: 1000.0,
            lower_bound: 90.0,
            upper_bound: 110.0,
            grids: 5,
        };
        assert_eq!(
            run_backtest(&candles, &config),
            Err(BacktestError::NonPositivePrice {
                index: 3,
                price: 0.0
            })
        );
    }

    #[test]
    fn test_grid_rebalances_to_half_allocation() {
        let candles = flat(10, 100.0);
        let config = StrategyConfig::Grid {
            initial_capital: 1000.0,
            lower_bound: 90.0,
            upper_bound: 110.0,
            grids: 5,
        };
        let result = run_backtest(&candles, &config).unwrap();

        // One initial buy of half the equity, then within tolerance
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].side, Side::Buy);
        assert_relative_eq!(result.trades[0].quantity, 5.0);
        assert_relative_eq!(result.final_equity, 1000.0);
        assert_eq!(result.win_rate, 0.0);
        assert_eq!(result.total_trades, 1);
        assert_eq!(result.closed_trades, 1);
    }

    #[test]
    fn test_max_drawdown() {
        let curve: Vec<EquityPoint> = [100.0, 120.0, 90.0, 130.0, 117.0]
            .iter()
            .enumerate()
            .map(|(i, &value)| EquityPoint {
                time: i as i64,
                value,
            })
            .collect();

        assert_relative_eq!(max_drawdown(&curve), 25.0, epsilon = 1e-9);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn test_win_rate_ignores_trades_without_pnl() {
        let mut portfolio = Portfolio::new(1000.0, 1e-7);
        portfolio.record(0, Side::Buy, 10.0, 1.0, TradeStatus::Closed);
        for (entry, exit) in [(10.0, 12.0), (10.0, 8.0), (10.0, 11.0)] {
            let index = portfolio.record(0, Side::Buy, entry, 1.0, TradeStatus::Open);
            portfolio.open_trade = Some(index);
            portfolio.close_open_trade(1, exit);
        }

        assert_relative_eq!(win_rate(&portfolio.trades), 200.0 / 3.0, epsilon = 1e-9);
        assert_eq!(win_rate(&[]), 0.0);
    }

    #[test]
    fn test_settings_coupling_to_bar_granularity() {
        // Hourly bars: a "day" is 24 bars
        let candles = flat(24 * 10, 50.0);
        let backtester = Backtester::new(BacktestSettings {
            bars_per_day: 24,
            equity_sample_stride: 4,
            ..BacktestSettings::default()
        });
        let config = StrategyConfig::Dca {
            initial_capital: 1000.0,
            buy_amount: 10.0,
            frequency_days: 2,
        };

        let result = backtester.run(&candles, &config).unwrap();
        assert_eq!(result.trades.len(), 5);
        assert_eq!(result.equity_curve.len(), 60);
    }
}
