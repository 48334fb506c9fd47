//! Per-(symbol, interval) append-only bar history.
//!
//! The store is mutated only by the backtest loop; every other component
//! reads from it. Because bars are appended strictly in admission order,
//! anything a reader sees is at or before the current tick — the store is
//! one half of the engine's look-ahead guarantee (the other half is the
//! execution handler's schedule-for-next-open rule).

use std::collections::HashMap;

use crate::domain::{Bar, Interval};
use crate::error::EngineError;

#[derive(Debug, Default)]
pub struct BarStore {
    series: HashMap<(String, Interval), Vec<Bar>>,
}

impl BarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a bar, enforcing per-series timestamp monotonicity.
    ///
    /// A duplicate or decreasing timestamp is a `DataGap`: ordering is the
    /// core invariant and the run must abort rather than silently reorder.
    pub fn append(&mut self, bar: Bar) -> Result<(), EngineError> {
        bar.validate()?;
        let series = self
            .series
            .entry((bar.symbol.clone(), bar.interval))
            .or_default();
        if let Some(last) = series.last() {
            if bar.timestamp <= last.timestamp {
                return Err(EngineError::DataGap {
                    symbol: bar.symbol.clone(),
                    timestamp: bar.timestamp,
                    detail: format!(
                        "non-increasing timestamp (previous bar at {})",
                        last.timestamp
                    ),
                });
            }
        }
        series.push(bar);
        Ok(())
    }

    /// Latest bar for a series, if any.
    pub fn latest(&self, symbol: &str, interval: Interval) -> Option<&Bar> {
        self.series
            .get(&(symbol.to_string(), interval))
            .and_then(|s| s.last())
    }

    /// Last `n` bars, oldest first. Returns fewer if the history is shorter.
    pub fn last_n(&self, symbol: &str, interval: Interval, n: usize) -> &[Bar] {
        match self.series.get(&(symbol.to_string(), interval)) {
            Some(s) => {
                let start = s.len().saturating_sub(n);
                &s[start..]
            }
            None => &[],
        }
    }

    /// Full history for a series, oldest first.
    pub fn all(&self, symbol: &str, interval: Interval) -> &[Bar] {
        self.last_n(symbol, interval, usize::MAX)
    }

    pub fn len(&self, symbol: &str, interval: Interval) -> usize {
        self.series
            .get(&(symbol.to_string(), interval))
            .map_or(0, |s| s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(|s| s.is_empty())
    }
}
