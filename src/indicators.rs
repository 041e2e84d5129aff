//! Technical indicators
//!
//! Pure, stateless indicator functions evaluated over a full series in one
//! call. Every function answers "not enough data" with a neutral value
//! instead of an error:
//!
//! | Indicator | Neutral value |
//! |-----------|---------------|
//! | ATR, ADX, SMA | `0.0` |
//! | RSI | `50.0` |
//! | EMA | last supplied price |
//! | Bollinger Bands | all bands `0.0` |
//!
//! Moving averages are backed by the `ta` crate; the Wilder-smoothed
//! indicators (ATR, ADX, RSI) are computed by hand because `ta` smooths them
//! with an EMA instead.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use ta::indicators::{ExponentialMovingAverage, SimpleMovingAverage};
use ta::{Close, High, Low, Next};

use crate::{Candle, Ohlc};

// =============================================================================
// Bar accessors
// =============================================================================

impl High for Candle {
    fn high(&self) -> f64 {
        self.high
    }
}

impl Low for Candle {
    fn low(&self) -> f64 {
        self.low
    }
}

impl Close for Candle {
    fn close(&self) -> f64 {
        self.close
    }
}

impl High for Ohlc {
    fn high(&self) -> f64 {
        self.high
    }
}

impl Low for Ohlc {
    fn low(&self) -> f64 {
        self.low
    }
}

impl Close for Ohlc {
    fn close(&self) -> f64 {
        self.close
    }
}

/// Wilder's recurrence: `(prev * (period - 1) + value) / period`
fn wilder_step(prev: f64, value: f64, period: usize) -> f64 {
    (prev * (period - 1) as f64 + value) / period as f64
}

// =============================================================================
// Volatility
// =============================================================================

/// True Range of a bar given the previous close
pub fn true_range(high: f64, low: f64, prev_close: f64) -> f64 {
    let hl = high - low;
    let hc = (high - prev_close).abs();
    let lc = (low - prev_close).abs();
    hl.max(hc).max(lc)
}

/// Average True Range with Wilder's smoothing
///
/// Seeds with the simple average of the first `period` true ranges, then
/// applies `atr = (atr * (period - 1) + tr) / period` over the rest of the
/// series. Returns `0.0` when fewer than `period + 1` bars are supplied.
///
/// No state is kept between calls: a "previous ATR" is obtained by calling
/// again on a truncated slice.
pub fn average_true_range<T: High + Low + Close>(bars: &[T], period: usize) -> f64 {
    if period == 0 || bars.len() <= period {
        return 0.0;
    }

    let ranges: Vec<f64> = bars
        .windows(2)
        .map(|w| true_range(w[1].high(), w[1].low(), w[0].close()))
        .collect();

    let seed = ranges[..period].iter().sum::<f64>() / period as f64;
    ranges[period..]
        .iter()
        .fold(seed, |atr, &tr| wilder_step(atr, tr, period))
}

/// Upper, middle and lower Bollinger band values for the latest bar
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BollingerBands {
    pub lower: f64,
    pub mid: f64,
    pub upper: f64,
}

/// Bollinger Bands over the trailing `period` prices
///
/// `mid` is the trailing SMA and the bands sit `std_dev_multiplier`
/// population standard deviations away from it. All-zero when the series is
/// shorter than `period`.
pub fn bollinger_bands(prices: &[f64], period: usize, std_dev_multiplier: f64) -> BollingerBands {
    if period == 0 || prices.len() < period {
        return BollingerBands::default();
    }

    let window = &prices[prices.len() - period..];
    let mid = simple_moving_average(prices, period);
    let std_dev = window.population_std_dev();
    let std_dev = if std_dev.is_finite() { std_dev } else { 0.0 };

    BollingerBands {
        lower: mid - std_dev_multiplier * std_dev,
        mid,
        upper: mid + std_dev_multiplier * std_dev,
    }
}

// =============================================================================
// Trend Strength
// =============================================================================

/// Average Directional Index with Wilder's smoothing
///
/// Per transition the directional movements are
/// `+DM = high[i] - high[i-1]` when it beats `low[i-1] - low[i]` and is
/// positive (symmetric for `-DM`). `+DM`, `-DM` and TR are smoothed
/// independently (seed = sum of the first `period` values, then Wilder's
/// recurrence), giving `+DI`, `-DI` and
/// `DX = 100 * |+DI - -DI| / (+DI + -DI)`. ADX is DX smoothed again, seeded
/// with the average of the first `period` DX values.
///
/// Returns `0.0` below `2 * period` bars. If fewer than `period` DX values
/// exist the last DX is returned unsmoothed.
pub fn average_directional_index<T: High + Low + Close>(bars: &[T], period: usize) -> f64 {
    if period == 0 || bars.len() / 2 < period {
        return 0.0;
    }

    let mut plus_dm = Vec::with_capacity(bars.len() - 1);
    let mut minus_dm = Vec::with_capacity(bars.len() - 1);
    let mut ranges = Vec::with_capacity(bars.len() - 1);

    for w in bars.windows(2) {
        let (prev, cur) = (&w[0], &w[1]);
        let up_move = cur.high() - prev.high();
        let down_move = prev.low() - cur.low();

        plus_dm.push(if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        });
        minus_dm.push(if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        });
        ranges.push(true_range(cur.high(), cur.low(), prev.close()));
    }

    let mut smooth_plus: f64 = plus_dm[..period].iter().sum();
    let mut smooth_minus: f64 = minus_dm[..period].iter().sum();
    let mut smooth_tr: f64 = ranges[..period].iter().sum();

    let mut dx_values = Vec::with_capacity(ranges.len() - period + 1);
    dx_values.push(directional_index(smooth_plus, smooth_minus, smooth_tr));

    for i in period..ranges.len() {
        smooth_plus = wilder_step(smooth_plus, plus_dm[i], period);
        smooth_minus = wilder_step(smooth_minus, minus_dm[i], period);
        smooth_tr = wilder_step(smooth_tr, ranges[i], period);
        dx_values.push(directional_index(smooth_plus, smooth_minus, smooth_tr));
    }

    if dx_values.len() < period {
        return dx_values.last().copied().unwrap_or(0.0);
    }

    let seed = dx_values[..period].iter().sum::<f64>() / period as f64;
    dx_values[period..]
        .iter()
        .fold(seed, |adx, &dx| wilder_step(adx, dx, period))
}

/// DX from smoothed directional movement and true range
fn directional_index(smooth_plus: f64, smooth_minus: f64, smooth_tr: f64) -> f64 {
    if smooth_tr == 0.0 {
        return 0.0;
    }

    let plus_di = 100.0 * smooth_plus / smooth_tr;
    let minus_di = 100.0 * smooth_minus / smooth_tr;
    let sum = plus_di + minus_di;

    if sum == 0.0 {
        0.0
    } else {
        100.0 * (plus_di - minus_di).abs() / sum
    }
}

// =============================================================================
// Momentum
// =============================================================================

/// Relative Strength Index with Wilder's smoothing, in `[0, 100]`
///
/// Average gain/loss are seeded over the first `period` deltas (the
/// `period - 1` available ones when exactly `period` prices are supplied),
/// then follow `avg = (avg * (period - 1) + x) / period`. Returns `50.0`
/// below `period` prices and `100.0` when there are no losses.
pub fn relative_strength_index(prices: &[f64], period: usize) -> f64 {
    if period == 0 || prices.len() < period || prices.len() < 2 {
        return 50.0;
    }

    let deltas: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
    let seed_len = period.min(deltas.len());

    let (gain_sum, loss_sum) = deltas[..seed_len]
        .iter()
        .fold((0.0, 0.0), |(g, l), &d| {
            if d > 0.0 {
                (g + d, l)
            } else {
                (g, l - d)
            }
        });

    let mut avg_gain = gain_sum / period as f64;
    let mut avg_loss = loss_sum / period as f64;

    for &delta in &deltas[seed_len..] {
        avg_gain = wilder_step(avg_gain, delta.max(0.0), period);
        avg_loss = wilder_step(avg_loss, (-delta).max(0.0), period);
    }

    if avg_loss == 0.0 {
        return 100.0;
    }

    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

// =============================================================================
// Moving Averages
// =============================================================================

/// Exponential Moving Average over the entire supplied series
///
/// Seeded with `prices[0]` and multiplier `k = 2 / (period + 1)`, so the
/// result depends on how much history is passed in. Returns the last price
/// (or `0.0` for an empty slice) when fewer than `period` prices exist.
pub fn exponential_moving_average(prices: &[f64], period: usize) -> f64 {
    let last = prices.last().copied().unwrap_or(0.0);
    if prices.len() < period {
        return last;
    }

    let mut indicator = match ExponentialMovingAverage::new(period) {
        Ok(i) => i,
        Err(_) => return last,
    };

    prices
        .iter()
        .fold(last, |_, &price| indicator.next(price))
}

/// Simple Moving Average of the trailing `period` prices, `0.0` when short
pub fn simple_moving_average(prices: &[f64], period: usize) -> f64 {
    if period == 0 || prices.len() < period {
        return 0.0;
    }

    let mut indicator = match SimpleMovingAverage::new(period) {
        Ok(i) => i,
        Err(_) => return 0.0,
    };

    prices[prices.len() - period..]
        .iter()
        .fold(0.0, |_, &price| indicator.next(price))
}

// =============================================================================
// Position Sizing
// =============================================================================

/// Kelly Criterion fraction of capital to risk
///
/// `f = (win_rate * (rr + 1) - 1) / rr`, floored at `0.0`. Returns `0.0`
/// when `risk_reward_ratio` is zero. Not capped above: extreme inputs can
/// exceed `1.0`.
pub fn kelly_criterion(win_rate: f64, risk_reward_ratio: f64) -> f64 {
    if risk_reward_ratio == 0.0 {
        return 0.0;
    }

    let fraction = (win_rate * (risk_reward_ratio + 1.0) - 1.0) / risk_reward_ratio;
    fraction.max(0.0)
}

// =============================================================================
// Tests
// =============================================================================
