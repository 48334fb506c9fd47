//! BarManager: fans one base-frequency stream out to every subscribed
//! higher frequency.
//!
//! The manager owns one [`BarAggregator`] per (symbol, target interval) and
//! appends finalized bars to the store, so subscribers read resampled
//! history through the same `BarStore` API as base history. Series
//! bookkeeping lives here; dispatch of closed intervals to subscribers
//! (strategies, sizer updaters) is driven by the loop so that ownership of
//! those components stays with it.

use std::collections::BTreeMap;

use crate::aggregate::BarAggregator;
use crate::data::BarStore;
use crate::domain::{Bar, Interval};
use crate::error::EngineError;

#[derive(Debug)]
pub struct BarManager {
    base: Interval,
    aggregators: BTreeMap<(String, Interval), BarAggregator>,
}

impl BarManager {
    pub fn new(base: Interval) -> Self {
        Self { base, aggregators: BTreeMap::new() }
    }

    pub fn base_interval(&self) -> Interval {
        self.base
    }

    /// Ensure a resampled series exists for (symbol, interval). Subscribing
    /// at the base interval needs no aggregator.
    pub fn subscribe(&mut self, symbol: &str, interval: Interval) -> Result<(), EngineError> {
        if interval == self.base {
            return Ok(());
        }
        if interval < self.base {
            return Err(EngineError::Config(format!(
                "cannot aggregate {} bars from coarser base {}",
                interval, self.base
            )));
        }
        self.aggregators
            .entry((symbol.to_string(), interval))
            .or_insert_with(|| BarAggregator::new(symbol, interval));
        Ok(())
    }

    /// Fold one admitted base bar into every aggregator for its symbol.
    ///
    /// Returns the (symbol, interval) pairs that closed on this bar — the
    /// base interval always, plus any finalized higher frequency in
    /// ascending interval order. Finalized bars are appended to `store`.
    pub fn on_base_bar(
        &mut self,
        bar: &Bar,
        is_day_close: bool,
        store: &mut BarStore,
    ) -> Result<Vec<(String, Interval)>, EngineError> {
        let mut closed = vec![(bar.symbol.clone(), self.base)];

        let lo = (bar.symbol.clone(), Interval::Min1);
        let hi = (bar.symbol.clone(), Interval::Day1);
        for (key, agg) in self.aggregators.range_mut(lo..=hi) {
            if let Some(resampled) = agg.on_base_bar(bar, is_day_close) {
                store.append(resampled)?;
                closed.push(key.clone());
            }
        }
        Ok(closed)
    }
}
