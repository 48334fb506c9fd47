//! ATR risk sizer with Wilder smoothing.
//!
//! True Range of bar i: `max(high-low, |high-prev_close|, |low-prev_close|)`.
//! The first N true ranges seed the ATR with their simple mean; afterwards
//! `ATR = ((N-1)·ATR_prev + TR) / N`. Size is the classic risk budget:
//!
//! ```text
//! quantity = floor(risk_per_trade · equity / (atr_multiplier · ATR))
//! ```

use std::collections::BTreeMap;

use crate::config::SizerConfig;
use crate::domain::{Bar, Interval};
use crate::sizers::{floor_to_decimals, Sizer};

#[derive(Debug, Clone, Default)]
struct AtrState {
    prev_close: Option<f64>,
    /// True ranges collected during warm-up.
    warmup: Vec<f64>,
    atr: Option<f64>,
}

#[derive(Debug)]
pub struct AtrSizer {
    config: SizerConfig,
    interval: Interval,
    state: BTreeMap<String, AtrState>,
}

impl AtrSizer {
    pub fn new(config: SizerConfig, base_interval: Interval) -> Self {
        let interval = config.interval.unwrap_or(base_interval);
        Self { config, interval, state: BTreeMap::new() }
    }

    pub fn atr(&self, symbol: &str) -> Option<f64> {
        self.state.get(symbol).and_then(|s| s.atr)
    }
}

impl Sizer for AtrSizer {
    fn name(&self) -> &str {
        "AtrSizer"
    }

    fn interval(&self) -> Interval {
        self.interval
    }

    fn initial_size(&self) -> f64 {
        self.config.initial_position_size
    }

    fn update(&mut self, symbol: &str, bar: &Bar) {
        let state = self.state.entry(symbol.to_string()).or_default();
        let tr = bar.true_range(state.prev_close);
        state.prev_close = Some(bar.close);

        match state.atr {
            Some(prev) => {
                let n = self.config.period as f64;
                state.atr = Some(((n - 1.0) * prev + tr) / n);
            }
            None => {
                state.warmup.push(tr);
                if state.warmup.len() >= self.config.period {
                    let mean = state.warmup.iter().sum::<f64>() / state.warmup.len() as f64;
                    state.atr = Some(mean);
                    state.warmup.clear();
                }
            }
        }
    }

    fn size(&self, symbol: &str, equity: f64) -> Option<f64> {
        let atr = self.atr(symbol)?;
        if atr <= 0.0 || equity <= 0.0 {
            return None;
        }
        let capital_to_risk = self.config.risk_per_trade * equity;
        let stop_distance = atr * self.config.atr_multiplier;
        Some(floor_to_decimals(
            capital_to_risk / stop_distance,
            self.config.decimal_places,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn config(period: usize) -> SizerConfig {
        SizerConfig {
            period,
            atr_multiplier: 2.0,
            risk_per_trade: 0.01,
            initial_position_size: 100.0,
            decimal_places: 0,
            ..SizerConfig::default()
        }
    }

    /// Bar with a fixed 2.0 range around a flat close, so TR = 2.0 always.
    fn constant_tr_bar(day: i64) -> Bar {
        Bar::new(
            "SPY",
            Interval::Day1,
            Utc.timestamp_opt(day * 86_400, 0).unwrap(),
            100.0,
            101.0,
            99.0,
            100.0,
            1_000.0,
        )
    }

    #[test]
    fn warm_up_returns_none_then_exact_atr() {
        let mut sizer = AtrSizer::new(config(14), Interval::Day1);

        for day in 1..14 {
            sizer.update("SPY", &constant_tr_bar(day));
            assert!(sizer.size("SPY", 100_000.0).is_none(), "day {day} should be warming up");
        }

        sizer.update("SPY", &constant_tr_bar(14));
        // Constant TR = 2.0: simple mean seed and every Wilder step equal 2.0.
        assert_eq!(sizer.atr("SPY"), Some(2.0));

        for day in 15..30 {
            sizer.update("SPY", &constant_tr_bar(day));
            assert_eq!(sizer.atr("SPY"), Some(2.0), "Wilder ATR drifted on day {day}");
        }
    }

    #[test]
    fn size_is_risk_budget_over_stop_distance() {
        let mut sizer = AtrSizer::new(config(3), Interval::Day1);
        for day in 1..=3 {
            sizer.update("SPY", &constant_tr_bar(day));
        }
        // risk = 1% of 100k = 1000; stop = 2 * 2.0 = 4.0 → 250 shares
        assert_eq!(sizer.size("SPY", 100_000.0), Some(250.0));
    }

    #[test]
    fn size_floors_to_decimal_places() {
        let mut cfg = config(3);
        cfg.decimal_places = 1;
        let mut sizer = AtrSizer::new(cfg, Interval::Day1);
        for day in 1..=3 {
            sizer.update("SPY", &constant_tr_bar(day));
        }
        // 1% of 12345 / 4.0 = 30.8625 → 30.8
        assert_eq!(sizer.size("SPY", 12_345.0), Some(30.8));
    }

    #[test]
    fn non_positive_equity_gives_no_size() {
        let mut sizer = AtrSizer::new(config(1), Interval::Day1);
        sizer.update("SPY", &constant_tr_bar(1));
        assert!(sizer.size("SPY", 0.0).is_none());
        assert!(sizer.size("SPY", -10.0).is_none());
    }

    #[test]
    fn symbols_warm_up_independently() {
        let mut sizer = AtrSizer::new(config(2), Interval::Day1);
        sizer.update("SPY", &constant_tr_bar(1));
        sizer.update("SPY", &constant_tr_bar(2));
        assert!(sizer.size("SPY", 100_000.0).is_some());
        assert!(sizer.size("QQQ", 100_000.0).is_none());
    }
}
