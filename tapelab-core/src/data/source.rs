//! Bar source contract: an iterator-like producer of base-interval bars in
//! non-decreasing timestamp order. EOF terminates the backtest cleanly.

use crate::domain::Bar;
use crate::error::EngineError;

pub trait BarSource {
    /// Next bar, or `Ok(None)` at end of data.
    fn next_bar(&mut self) -> Result<Option<Bar>, EngineError>;
}

/// In-memory source over a pre-sorted vector; the workhorse for tests and
/// for runners that load a whole dataset up front.
#[derive(Debug)]
pub struct VecSource {
    bars: std::vec::IntoIter<Bar>,
}

impl VecSource {
    /// Build from bars sorted by (timestamp, symbol). Sorting is the caller's
    /// responsibility; ordering violations surface as `DataGap` in the loop.
    pub fn new(bars: Vec<Bar>) -> Self {
        Self { bars: bars.into_iter() }
    }

    /// Build from per-symbol series, merging into (timestamp, symbol) order.
    pub fn merged(mut series: Vec<Vec<Bar>>) -> Self {
        let mut all: Vec<Bar> = series.drain(..).flatten().collect();
        all.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        Self::new(all)
    }
}

impl BarSource for VecSource {
    fn next_bar(&mut self) -> Result<Option<Bar>, EngineError> {
        Ok(self.bars.next())
    }
}
