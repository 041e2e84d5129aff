//! Binance-shaped kline payloads
//!
//! REST `/klines` rows arrive as arrays of mixed numbers and numeric strings;
//! WebSocket streams push `kline` events with single-letter keys. Both are
//! parsed into [`Kline`] here, and anything unparseable or non-finite is
//! rejected so the indicator code only ever sees real numbers.

use serde::Deserialize;
use serde_json::Value;

use crate::error::FeedError;
use crate::{Kline, Symbol};

/// Minimum columns of a REST kline row: `[open_time, o, h, l, c, v, close_time, ...]`
const MIN_ROW_LEN: usize = 6;

impl Kline {
    /// Parse one REST kline row. Rows from the history endpoint are always closed.
    pub fn from_binance_row(row: &[Value]) -> Result<Self, FeedError> {
        if row.len() < MIN_ROW_LEN {
            return Err(FeedError::MalformedPayload(format!(
                "kline row has {} columns, expected at least {}",
                row.len(),
                MIN_ROW_LEN
            )));
        }

        let open_time = row[0]
            .as_i64()
            .ok_or_else(|| FeedError::InvalidNumber {
                field: "open_time",
                value: row[0].to_string(),
            })?;

        Ok(Kline {
            open_time,
            open: number_value("open", &row[1])?,
            high: number_value("high", &row[2])?,
            low: number_value("low", &row[3])?,
            close: number_value("close", &row[4])?,
            volume: number_value("volume", &row[5])?,
            is_closed: true,
        })
    }
}

/// Parse a full REST `/klines` response body
pub fn parse_binance_rows(body: &str) -> Result<Vec<Kline>, FeedError> {
    let rows: Vec<Vec<Value>> = serde_json::from_str(body)?;
    rows.iter().map(|row| Kline::from_binance_row(row)).collect()
}

/// WebSocket `<symbol>@kline_<interval>` event
#[derive(Debug, Clone, Deserialize)]
pub struct BinanceKlineEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "k")]
    pub kline: BinanceKlinePayload,
}

/// Inner `k` object; prices and volume are decimal strings
#[derive(Debug, Clone, Deserialize)]
pub struct BinanceKlinePayload {
    #[serde(rename = "t")]
    pub open_time: i64,
    #[serde(rename = "T")]
    pub close_time: i64,
    #[serde(rename = "i", default)]
    pub interval: String,
    #[serde(rename = "o")]
    pub open: String,
    #[serde(rename = "h")]
    pub high: String,
    #[serde(rename = "l")]
    pub low: String,
    #[serde(rename = "c")]
    pub close: String,
    #[serde(rename = "v")]
    pub volume: String,
    #[serde(rename = "x")]
    pub is_closed: bool,
}

impl BinanceKlineEvent {
    pub fn parse(json: &str) -> Result<Self, FeedError> {
        let event: BinanceKlineEvent = serde_json::from_str(json)?;
        if event.event_type != "kline" {
            return Err(FeedError::MalformedPayload(format!(
                "unexpected event type '{}'",
                event.event_type
            )));
        }
        Ok(event)
    }

    pub fn symbol(&self) -> Symbol {
        Symbol::new(self.symbol.as_str())
    }

    pub fn to_kline(&self) -> Result<Kline, FeedError> {
        let k = &self.kline;
        Ok(Kline {
            open_time: k.open_time,
            open: parse_number("open", &k.open)?,
            high: parse_number("high", &k.high)?,
            low: parse_number("low", &k.low)?,
            close: parse_number("close", &k.close)?,
            volume: parse_number("volume", &k.volume)?,
            is_closed: k.is_closed,
        })
    }
}

fn number_value(field: &'static str, value: &Value) -> Result<f64, FeedError> {
    match value {
        Value::String(s) => parse_number(field, s),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| FeedError::InvalidNumber {
                field,
                value: n.to_string(),
            })
            .and_then(|v| finite(field, v)),
        other => Err(FeedError::InvalidNumber {
            field,
            value: other.to_string(),
        }),
    }
}

fn parse_number(field: &'static str, raw: &str) -> Result<f64, FeedError> {
    let value: f64 = raw.trim().parse().map_err(|_| FeedError::InvalidNumber {
        field,
        value: raw.to_string(),
    })?;
    finite(field, value)
}

fn finite(field: &'static str, value: f64) -> Result<f64, FeedError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FeedError::NonFinite { field })
    }
}
