//! Single (symbol, target-interval) resampler.
//!
//! Folds base-interval closes into a building bar and finalizes it when the
//! target interval closes: on an epoch-aligned timestamp for sub-daily
//! targets, on the last bar of the trading day for daily targets.

use crate::domain::{Bar, Interval};

#[derive(Debug, Clone)]
struct BuildingBar {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    bars_merged: usize,
}

#[derive(Debug)]
pub struct BarAggregator {
    symbol: String,
    interval: Interval,
    building: Option<BuildingBar>,
    /// Set once the first finalize boundary has passed; the partial interval
    /// before it is discarded rather than emitted.
    saw_boundary: bool,
}

impl BarAggregator {
    pub fn new(symbol: impl Into<String>, interval: Interval) -> Self {
        Self { symbol: symbol.into(), interval, building: None, saw_boundary: false }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    /// Fold one base-interval bar; returns the finalized target-interval bar
    /// when this base close also closes the target interval.
    ///
    /// The very first bars may form a partial interval (the stream rarely
    /// starts exactly on a boundary); that partial interval is dropped.
    pub fn on_base_bar(&mut self, bar: &Bar, is_day_close: bool) -> Option<Bar> {
        match &mut self.building {
            Some(b) => {
                b.high = b.high.max(bar.high);
                b.low = b.low.min(bar.low);
                b.close = bar.close;
                b.volume += bar.volume;
                b.bars_merged += 1;
            }
            None => {
                self.building = Some(BuildingBar {
                    open: bar.open,
                    high: bar.high,
                    low: bar.low,
                    close: bar.close,
                    volume: bar.volume,
                    bars_merged: 1,
                });
            }
        }

        if !self.closes_interval(bar, is_day_close) {
            return None;
        }

        let built = self.building.take().expect("building bar exists after merge");
        if !self.saw_boundary {
            // Partial interval from before the first boundary: discard. A
            // lone first-ever bar never closes an interval.
            self.saw_boundary = true;
            if built.bars_merged < self.expected_span(bar) || built.bars_merged == 1 {
                return None;
            }
        }
        Some(Bar::new(
            self.symbol.clone(),
            self.interval,
            bar.timestamp,
            built.open,
            built.high,
            built.low,
            built.close,
            built.volume,
        ))
    }

    fn closes_interval(&self, bar: &Bar, is_day_close: bool) -> bool {
        if self.interval.is_intraday() {
            bar.timestamp.timestamp() % self.interval.seconds() == 0
        } else {
            is_day_close
        }
    }

    /// Base bars per target interval, for detecting a partial first interval.
    /// For daily targets the day length is calendar-dependent, so the first
    /// day is always treated as complete.
    fn expected_span(&self, bar: &Bar) -> usize {
        if self.interval.is_intraday() {
            (self.interval.seconds() / bar.interval.seconds()).max(1) as usize
        } else {
            1
        }
    }
}
