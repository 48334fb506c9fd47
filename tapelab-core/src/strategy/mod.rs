//! Strategy interface and the reference strategies shipped with the engine.
//!
//! A strategy subscribes to (symbol, interval) pairs and is called once per
//! close of each subscription with the finalized bar. It returns at most one
//! directional signal; quantities are the sizer's job, never the strategy's.
//! Strategies own whatever state they need — the engine never introspects
//! them.

mod buy_and_hold;
mod ma_crossover;

pub use buy_and_hold::BuyAndHold;
pub use ma_crossover::MovingAverageCrossover;

use crate::config::StrategyConfig;
use crate::data::BarStore;
use crate::domain::{Bar, Interval, SignalDirection, SignalEvent};
use crate::error::EngineError;

pub trait Strategy {
    fn name(&self) -> &str;

    /// (symbol, interval) pairs this strategy wants closes for.
    fn subscriptions(&self) -> Vec<(String, Interval)>;

    /// Called on each close of a subscribed (symbol, interval). History,
    /// including `bar`, is readable through `store`.
    fn on_interval_close(
        &mut self,
        symbol: &str,
        interval: Interval,
        bar: &Bar,
        store: &BarStore,
    ) -> Option<SignalEvent>;
}

/// Build a strategy from its config entry. Unknown names are a config error.
pub fn from_config(
    config: &StrategyConfig,
    symbols: &[String],
    base_interval: Interval,
) -> Result<Box<dyn Strategy>, EngineError> {
    let interval = config.frequencies.first().copied().unwrap_or(base_interval);
    match config.name.as_str() {
        "ma_crossover" => {
            let short = config.params.get("short_window").copied().unwrap_or(40.0) as usize;
            let long = config.params.get("long_window").copied().unwrap_or(100.0) as usize;
            Ok(Box::new(MovingAverageCrossover::new(
                symbols.to_vec(),
                interval,
                short,
                long,
            )?))
        }
        "buy_and_hold" => Ok(Box::new(BuyAndHold::new(symbols.to_vec(), interval))),
        other => Err(EngineError::Config(format!("unknown strategy: {other}"))),
    }
}

pub(crate) fn signal(
    symbol: &str,
    direction: SignalDirection,
    timestamp: chrono::DateTime<chrono::Utc>,
) -> SignalEvent {
    SignalEvent {
        symbol: symbol.to_string(),
        direction,
        strength: 1.0,
        target_holding: None,
        timestamp,
    }
}
