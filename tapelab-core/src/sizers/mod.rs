//! Position sizers: turn a directional signal into a target share count.
//!
//! A sizer is updated once per close of its subscribed interval and queried
//! when a signal arrives. `size` returns `None` while warming up; the
//! portfolio then reuses its last known size for the symbol (the configured
//! initial size before any sizing call has succeeded).

mod atr;
mod fixed;

pub use atr::AtrSizer;
pub use fixed::FixedSizer;

use crate::domain::{Bar, Interval};

pub trait Sizer {
    fn name(&self) -> &str;

    /// Interval whose closes feed [`update`](Self::update).
    fn interval(&self) -> Interval;

    /// Size used until the first successful sizing call.
    fn initial_size(&self) -> f64;

    /// Fold one closed bar of the subscribed interval into sizer state.
    fn update(&mut self, symbol: &str, bar: &Bar);

    /// Target quantity for a full position at current equity, or `None`
    /// while warming up.
    fn size(&self, symbol: &str, equity: f64) -> Option<f64>;
}

/// Floor to `decimal_places` (0 = whole shares).
pub(crate) fn floor_to_decimals(value: f64, decimal_places: u32) -> f64 {
    let scale = 10f64.powi(decimal_places as i32);
    (value * scale).floor() / scale
}
