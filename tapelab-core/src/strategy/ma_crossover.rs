use std::collections::BTreeMap;

use crate::data::BarStore;
use crate::domain::{Bar, Interval, SignalDirection, SignalEvent};
use crate::error::EngineError;
use crate::strategy::{signal, Strategy};

/// Classic dual moving-average crossover.
///
/// Bullish when the short SMA of closes crosses above the long SMA, bearish
/// when it crosses below. Emits only on a change of side, so a persistent
/// trend produces one signal, not one per bar. Closed bars only: the bar
/// delivered to `on_interval_close` is already final, so the averages may
/// include it without peeking ahead.
#[derive(Debug)]
pub struct MovingAverageCrossover {
    symbols: Vec<String>,
    interval: Interval,
    short_window: usize,
    long_window: usize,
    /// Last emitted side per symbol: +1 long, -1 short.
    last_side: BTreeMap<String, i8>,
}

impl MovingAverageCrossover {
    pub fn new(
        symbols: Vec<String>,
        interval: Interval,
        short_window: usize,
        long_window: usize,
    ) -> Result<Self, EngineError> {
        if short_window == 0 || long_window == 0 || short_window >= long_window {
            return Err(EngineError::Config(format!(
                "ma_crossover windows must satisfy 0 < short < long, got {short_window}/{long_window}"
            )));
        }
        Ok(Self {
            symbols,
            interval,
            short_window,
            long_window,
            last_side: BTreeMap::new(),
        })
    }

    fn sma(bars: &[Bar], window: usize) -> f64 {
        let slice = &bars[bars.len() - window..];
        slice.iter().map(|b| b.close).sum::<f64>() / window as f64
    }
}

impl Strategy for MovingAverageCrossover {
    fn name(&self) -> &str {
        "MovingAverageCrossover"
    }

    fn subscriptions(&self) -> Vec<(String, Interval)> {
        self.symbols.iter().map(|s| (s.clone(), self.interval)).collect()
    }

    fn on_interval_close(
        &mut self,
        symbol: &str,
        interval: Interval,
        bar: &Bar,
        store: &BarStore,
    ) -> Option<SignalEvent> {
        let bars = store.last_n(symbol, interval, self.long_window);
        if bars.len() < self.long_window {
            return None;
        }

        let short_avg = Self::sma(bars, self.short_window);
        let long_avg = Self::sma(bars, self.long_window);

        let side = if short_avg > long_avg {
            1
        } else if short_avg < long_avg {
            -1
        } else {
            return None;
        };

        if self.last_side.get(symbol) == Some(&side) {
            return None;
        }
        self.last_side.insert(symbol.to_string(), side);

        let direction = if side > 0 { SignalDirection::Bullish } else { SignalDirection::Bearish };
        Some(signal(symbol, direction, bar.timestamp))
    }
}
