//! CSV bar loading.
//!
//! One file per symbol with columns `timestamp,open,high,low,close,volume`.
//! Timestamps may be epoch seconds or RFC 3339; rows must be chronological
//! (the engine enforces ordering again at ingest — a violation there is a
//! fatal data gap, not a loader concern).

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tapelab_core::data::VecSource;
use tapelab_core::domain::{Bar, Interval};

#[derive(Debug, Deserialize)]
struct CsvBarRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(epoch) = raw.parse::<i64>() {
        return DateTime::from_timestamp(epoch, 0)
            .with_context(|| format!("epoch timestamp out of range: {raw}"));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("unparseable timestamp: {raw}"))
}

/// Load one symbol's bars from a CSV file.
pub fn load_symbol(path: &Path, symbol: &str, interval: Interval) -> Result<Vec<Bar>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open bar file {}", path.display()))?;

    let mut bars = Vec::new();
    for (line, row) in reader.deserialize::<CsvBarRow>().enumerate() {
        let row = row.with_context(|| format!("{}:{}: bad row", path.display(), line + 2))?;
        let bar = Bar::new(
            symbol,
            interval,
            parse_timestamp(&row.timestamp)?,
            row.open,
            row.high,
            row.low,
            row.close,
            row.volume,
        );
        bar.validate()
            .with_context(|| format!("{}:{}: invalid bar", path.display(), line + 2))?;
        bars.push(bar);
    }
    Ok(bars)
}

/// Load every configured symbol and merge into one chronological source.
pub fn load_source(
    paths: &[(String, std::path::PathBuf)],
    interval: Interval,
) -> Result<VecSource> {
    let mut series = Vec::with_capacity(paths.len());
    for (symbol, path) in paths {
        series.push(load_symbol(path, symbol, interval)?);
    }
    Ok(VecSource::merged(series))
}
