//! Candle series loading and backtest result export
//!
//! CSV layout is `time,open,high,low,close,volume`, where `time` is either a
//! millisecond epoch or a date-time (RFC 3339, or `%Y-%m-%d %H:%M:%S` taken as UTC).

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::backtest::BacktestResult;
use crate::{BacktestTrade, Candle};

// =============================================================================
// CSV Data Loading
// =============================================================================

/// Load an OHLCV series from a CSV file
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Candle>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

    let mut candles = Vec::new();
    let mut invalid = 0usize;

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;

        let time_str = record.get(0).context("Missing time column")?;
        let time = parse_time(time_str)?;

        let field = |idx: usize, name: &str| -> Result<f64> {
            record
                .get(idx)
                .with_context(|| format!("Missing {} column", name))?
                .trim()
                .parse()
                .with_context(|| format!("Failed to parse {} on row {}", name, row_idx + 1))
        };

        let candle = Candle::new_unchecked(
            time,
            field(1, "open")?,
            field(2, "high")?,
            field(3, "low")?,
            field(4, "close")?,
            field(5, "volume")?,
        );

        if let Err(e) = candle.validate() {
            invalid += 1;
            warn!(row = row_idx + 1, error = %e, "Inconsistent candle");
        }

        candles.push(candle);
    }

    if !is_chronological(&candles) {
        warn!(path = %path.display(), "Candle times are not chronological");
    }

    info!(
        path = %path.display(),
        candles = candles.len(),
        invalid,
        "Loaded candle series"
    );
    Ok(candles)
}

/// Millisecond epoch, RFC 3339, or naive `%Y-%m-%d %H:%M:%S` (UTC)
fn parse_time(raw: &str) -> Result<i64> {
    let raw = raw.trim();
    if let Ok(ms) = raw.parse::<i64>() {
        return Ok(ms);
    }

    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
        })
        .map(|dt| dt.timestamp_millis())
        .with_context(|| format!("Failed to parse time: {}", raw))
}

fn is_chronological(candles: &[Candle]) -> bool {
    candles.windows(2).all(|w| w[0].time <= w[1].time)
}

/// Write a candle series in the layout [`load_csv`] reads
pub fn save_csv(candles: &[Candle], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    for candle in candles {
        writer.serialize(candle)?;
    }
    writer.flush()?;

    info!("Saved {} candles to {}", candles.len(), path.display());
    Ok(())
}

// =============================================================================
// Result Export
// =============================================================================

/// Flat CSV row of a [`BacktestTrade`]
#[derive(Debug, Serialize)]
struct TradeRow<'a> {
    id: u64,
    entry_time: String,
    exit_time: String,
    side: &'a str,
    price: f64,
    quantity: f64,
    pnl: Option<f64>,
    pnl_percent: Option<f64>,
    status: &'a str,
}

impl<'a> From<&'a BacktestTrade> for TradeRow<'a> {
    fn from(trade: &'a BacktestTrade) -> Self {
        TradeRow {
            id: trade.id,
            entry_time: format_time(trade.entry_time),
            exit_time: trade.exit_time.map(format_time).unwrap_or_default(),
            side: match trade.side {
                crate::Side::Buy => "buy",
                crate::Side::Sell => "sell",
            },
            price: trade.price,
            quantity: trade.quantity,
            pnl: trade.pnl,
            pnl_percent: trade.pnl_percent,
            status: match trade.status {
                crate::TradeStatus::Open => "open",
                crate::TradeStatus::Closed => "closed",
            },
        }
    }
}

fn format_time(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

/// Write the trade log as CSV
pub fn write_trades_csv(trades: &[BacktestTrade], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    for trade in trades {
        writer.serialize(TradeRow::from(trade))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the full result (metrics, trades, equity curve) as pretty JSON
pub fn write_result_json(result: &BacktestResult, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), result)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Write `{label}_result.json` and `{label}_trades.csv` under `dir`
pub fn export_result(
    result: &BacktestResult,
    label: &str,
    dir: impl AsRef<Path>,
) -> Result<(PathBuf, PathBuf)> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let json_path = dir.join(format!("{}_result.json", label));
    let csv_path = dir.join(format!("{}_trades.csv", label));
    write_result_json(result, &json_path)?;
    write_trades_csv(&result.trades, &csv_path)?;

    info!(
        json = %json_path.display(),
        trades = %csv_path.display(),
        "Exported backtest result"
    );
    Ok((json_path, csv_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("paper_strategies_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_parse_time_formats() {
        assert_eq!(parse_time("1700000000000").unwrap(), 1_700_000_000_000);
        assert_eq!(parse_time("2023-11-14T22:13:20Z").unwrap(), 1_700_000_000_000);
        assert_eq!(parse_time("2023-11-14 22:13:20").unwrap(), 1_700_000_000_000);
        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn test_load_csv_keeps_inconsistent_rows() {
        let path = temp_path("load.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "time,open,high,low,close,volume").unwrap();
        writeln!(file, "0,100,101,99,100.5,10").unwrap();
        writeln!(file, "2023-11-14 22:13:20,100,99,101,100,10").unwrap();
        drop(file);

        let candles = load_csv(&path).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].close, 100.5);
        assert_eq!(candles[1].time, 1_700_000_000_000);
        assert!(!candles[1].is_valid());

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_save_and_load_csv() {
        let path = temp_path("save.csv");
        let candles = vec![
            Candle::new_unchecked(0, 1.0, 2.0, 0.5, 1.5, 10.0),
            Candle::new_unchecked(300_000, 1.5, 2.5, 1.0, 2.0, 20.0),
        ];

        save_csv(&candles, &path).unwrap();
        assert_eq!(load_csv(&path).unwrap(), candles);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_chronology_check() {
        let a = Candle::new_unchecked(0, 1.0, 1.0, 1.0, 1.0, 1.0);
        let b = Candle::new_unchecked(10, 1.0, 1.0, 1.0, 1.0, 1.0);
        assert!(is_chronological(&[a, b]));
        assert!(!is_chronological(&[b, a]));
    }
}
