//! Core data types used across the simulator

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for candle data
#[derive(Debug, Error, PartialEq)]
pub enum CandleValidationError {
    #[error("high ({high}) must be >= low ({low})")]
    HighLessThanLow { high: f64, low: f64 },

    #[error("volume ({0}) must be >= 0")]
    NegativeVolume(f64),

    #[error("open ({open}) must be between low ({low}) and high ({high})")]
    OpenOutOfRange { open: f64, low: f64, high: f64 },

    #[error("close ({close}) must be between low ({low}) and high ({high})")]
    CloseOutOfRange { close: f64, low: f64, high: f64 },

    #[error("prices must be positive: open={open}, high={high}, low={low}, close={close}")]
    NonPositivePrice {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
}

/// OHLCV candlestick data
///
/// `time` is the bar open time in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Create a new candle with validation
    pub fn new(
        time: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, CandleValidationError> {
        let candle = Self::new_unchecked(time, open, high, low, close, volume);
        candle.validate()?;
        Ok(candle)
    }

    /// Create a candle without validation. Indicators tolerate malformed bars.
    pub fn new_unchecked(time: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Check `high >= max(open, close) >= min(open, close) >= low`, positive prices
    /// and non-negative volume.
    pub fn validate(&self) -> Result<(), CandleValidationError> {
        if self.open <= 0.0 || self.high <= 0.0 || self.low <= 0.0 || self.close <= 0.0 {
            return Err(CandleValidationError::NonPositivePrice {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }

        if self.high < self.low {
            return Err(CandleValidationError::HighLessThanLow {
                high: self.high,
                low: self.low,
            });
        }

        if self.volume < 0.0 {
            return Err(CandleValidationError::NegativeVolume(self.volume));
        }

        if self.open < self.low || self.open > self.high {
            return Err(CandleValidationError::OpenOutOfRange {
                open: self.open,
                low: self.low,
                high: self.high,
            });
        }

        if self.close < self.low || self.close > self.high {
            return Err(CandleValidationError::CloseOutOfRange {
                close: self.close,
                low: self.low,
                high: self.high,
            });
        }

        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Project onto the high/low/close subset used by trend indicators
    pub fn ohlc(&self) -> Ohlc {
        Ohlc {
            high: self.high,
            low: self.low,
            close: self.close,
        }
    }
}

/// High/low/close subset consumed by ATR and ADX
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ohlc {
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl From<&Candle> for Ohlc {
    fn from(candle: &Candle) -> Self {
        candle.ohlc()
    }
}

/// Streaming candle update as delivered by a market-data feed.
///
/// Numeric fields are already parsed; see [`crate::feed`] for the string-typed
/// exchange payloads and their validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kline {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub is_closed: bool,
}

impl Kline {
    pub fn to_candle(&self) -> Candle {
        Candle::new_unchecked(
            self.open_time,
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
        )
    }
}

impl From<Candle> for Kline {
    /// A historical candle replayed as a closed kline
    fn from(candle: Candle) -> Self {
        Kline {
            open_time: candle.time,
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            volume: candle.volume,
            is_closed: true,
        }
    }
}

/// Trading pair symbol
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(s: impl Into<String>) -> Self {
        Symbol(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol::new(s)
    }
}

/// Fundamental market mood supplied alongside price updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sentiment {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

impl std::str::FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bullish" => Ok(Sentiment::Bullish),
            "bearish" => Ok(Sentiment::Bearish),
            "neutral" => Ok(Sentiment::Neutral),
            other => Err(format!(
                "unknown sentiment '{}', expected bullish, bearish or neutral",
                other
            )),
        }
    }
}

/// Action carried by a [`TradeSignal`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
}

impl std::fmt::Display for SignalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SignalAction::Buy => "BUY",
            SignalAction::Sell => "SELL",
            SignalAction::Hold => "HOLD",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Market,
    Limit,
}

/// Sub-strategy that produced a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Momentum,
    Grid,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Momentum => f.pad("momentum"),
            StrategyKind::Grid => f.pad("grid"),
        }
    }
}

/// Decision emitted by the strategy evaluator for one candle update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeSignal {
    pub action: SignalAction,
    pub reason: String,
    pub price: f64,
    pub strategy: StrategyKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    /// Fraction of capital in `[0, 1]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_type: Option<OrderType>,
}

impl TradeSignal {
    pub fn hold(reason: impl Into<String>, price: f64, strategy: StrategyKind) -> Self {
        Self {
            action: SignalAction::Hold,
            reason: reason.into(),
            price,
            strategy,
            stop_loss: None,
            take_profit: None,
            size_percent: None,
            order_type: None,
        }
    }

    pub fn buy(reason: impl Into<String>, price: f64, strategy: StrategyKind) -> Self {
        Self {
            action: SignalAction::Buy,
            ..Self::hold(reason, price, strategy)
        }
    }

    pub fn sell(reason: impl Into<String>, price: f64, strategy: StrategyKind) -> Self {
        Self {
            action: SignalAction::Sell,
            ..Self::hold(reason, price, strategy)
        }
    }

    pub fn with_size(mut self, size_percent: f64) -> Self {
        self.size_percent = Some(size_percent);
        self
    }

    pub fn with_stop_loss(mut self, stop_loss: f64) -> Self {
        self.stop_loss = Some(stop_loss);
        self
    }

    pub fn with_order_type(mut self, order_type: OrderType) -> Self {
        self.order_type = Some(order_type);
        self
    }

    pub fn is_hold(&self) -> bool {
        self.action == SignalAction::Hold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GhostOrderType {
    BuyLimit,
}

/// Pending limit order simulated client-side by the grid strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GhostOrder {
    pub id: String,
    #[serde(rename = "type")]
    pub order_type: GhostOrderType,
    pub price: f64,
    /// Fraction of capital in `[0, 1]`
    pub size: f64,
    /// Open time of the candle that registered the order
    pub created_at: i64,
}

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    Closed,
}

/// Trade recorded by the backtest replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestTrade {
    pub id: u64,
    pub entry_time: i64,
    pub exit_time: Option<i64>,
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
    pub pnl: Option<f64>,
    pub pnl_percent: Option<f64>,
    pub status: TradeStatus,
}

impl BacktestTrade {
    pub fn cost_basis(&self) -> f64 {
        self.price * self.quantity
    }

    pub fn is_winner(&self) -> bool {
        self.pnl.is_some_and(|pnl| pnl > 0.0)
    }
}

/// One sample of the equity curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub time: i64,
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candle_validation() {
        assert!(Candle::new(0, 100.0, 105.0, 95.0, 102.0, 10.0).is_ok());

        let err = Candle::new(0, 100.0, 95.0, 105.0, 100.0, 10.0).unwrap_err();
        assert!(matches!(
            err,
            CandleValidationError::NonPositivePrice { .. }
                | CandleValidationError::HighLessThanLow { .. }
                | CandleValidationError::OpenOutOfRange { .. }
        ));

        assert_eq!(
            Candle::new(0, 100.0, 105.0, 95.0, 102.0, -1.0).unwrap_err(),
            CandleValidationError::NegativeVolume(-1.0)
        );
        assert!(!Candle::new_unchecked(0, 0.0, 1.0, 0.0, 1.0, 1.0).is_valid());
    }

    #[test]
    fn test_sentiment_parse() {
        assert_eq!("BULLISH".parse::<Sentiment>().unwrap(), Sentiment::Bullish);
        assert_eq!("bearish".parse::<Sentiment>().unwrap(), Sentiment::Bearish);
        assert!("sideways".parse::<Sentiment>().is_err());
        assert_eq!(Sentiment::default(), Sentiment::Neutral);
    }

    #[test]
    fn test_signal_serialization_shape() {
        let signal = TradeSignal::buy("Grid Layer 1", 100.0, StrategyKind::Grid).with_size(0.3);
        let json = serde_json::to_value(&signal).unwrap();

        assert_eq!(json["action"], "BUY");
        assert_eq!(json["strategy"], "grid");
        assert_eq!(json["sizePercent"], 0.3);
        assert!(json.get("stopLoss").is_none());
    }

    #[test]
    fn test_kline_round_trips_candle_fields() {
        let candle = Candle::new_unchecked(1_000, 1.0, 2.0, 0.5, 1.5, 7.0);
        let kline = Kline::from(candle);
        assert!(kline.is_closed);
        assert_eq!(kline.to_candle(), candle);
    }
}
