use std::collections::BTreeSet;

use crate::data::BarStore;
use crate::domain::{Bar, Interval, SignalDirection, SignalEvent};
use crate::strategy::{signal, Strategy};

/// Goes long each symbol on its first closed bar and stays put. Mostly a
/// benchmark and a fixture for engine tests.
#[derive(Debug)]
pub struct BuyAndHold {
    symbols: Vec<String>,
    interval: Interval,
    bought: BTreeSet<String>,
}

impl BuyAndHold {
    pub fn new(symbols: Vec<String>, interval: Interval) -> Self {
        Self { symbols, interval, bought: BTreeSet::new() }
    }
}

impl Strategy for BuyAndHold {
    fn name(&self) -> &str {
        "BuyAndHold"
    }

    fn subscriptions(&self) -> Vec<(String, Interval)> {
        self.symbols.iter().map(|s| (s.clone(), self.interval)).collect()
    }

    fn on_interval_close(
        &mut self,
        symbol: &str,
        _interval: Interval,
        bar: &Bar,
        _store: &BarStore,
    ) -> Option<SignalEvent> {
        if self.bought.insert(symbol.to_string()) {
            Some(signal(symbol, SignalDirection::Bullish, bar.timestamp))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(day: i64) -> Bar {
        Bar::new(
            "SPY",
            Interval::Day1,
            Utc.timestamp_opt(day * 86_400, 0).unwrap(),
            100.0,
            100.0,
            100.0,
            100.0,
            1_000.0,
        )
    }

    #[test]
    fn signals_once_per_symbol() {
        let mut strategy = BuyAndHold::new(vec!["SPY".into()], Interval::Day1);
        let store = BarStore::new();

        let first = strategy.on_interval_close("SPY", Interval::Day1, &bar(1), &store);
        assert!(matches!(
            first,
            Some(SignalEvent { direction: SignalDirection::Bullish, .. })
        ));
        assert!(strategy
            .on_interval_close("SPY", Interval::Day1, &bar(2), &store)
            .is_none());
    }
}
