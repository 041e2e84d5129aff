//! Library error types
//!
//! The numeric core signals "not enough data" through neutral values, so the
//! only hard failures are invalid backtest preconditions and malformed feed
//! payloads rejected at the ingestion boundary.

use thiserror::Error;

/// Precondition failures of the backtest replay
#[derive(Debug, Error, PartialEq)]
pub enum BacktestError {
    #[error("backtest requires at least one candle")]
    EmptySeries,

    #[error("invalid strategy config: {0}")]
    InvalidConfig(String),

    #[error("candle {index} has non-positive close ({price})")]
    NonPositivePrice { index: usize, price: f64 },
}

/// Market-data payloads that cannot be turned into a [`crate::Kline`]
#[derive(Debug, Error, PartialEq)]
pub enum FeedError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("field '{field}' is not a number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("field '{field}' is not finite")]
    NonFinite { field: &'static str },
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedPayload(err.to_string())
    }
}
