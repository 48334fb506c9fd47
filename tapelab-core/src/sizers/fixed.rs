use crate::config::SizerConfig;
use crate::domain::{Bar, Interval};
use crate::sizers::Sizer;

/// Constant-size sizer; never warms up, never changes.
#[derive(Debug, Clone)]
pub struct FixedSizer {
    size: f64,
    interval: Interval,
}

impl FixedSizer {
    pub fn new(config: &SizerConfig, base_interval: Interval) -> Self {
        Self {
            size: config.initial_position_size,
            interval: config.interval.unwrap_or(base_interval),
        }
    }

    pub fn with_size(size: f64, interval: Interval) -> Self {
        Self { size, interval }
    }
}

impl Sizer for FixedSizer {
    fn name(&self) -> &str {
        "FixedSizer"
    }

    fn interval(&self) -> Interval {
        self.interval
    }

    fn initial_size(&self) -> f64 {
        self.size
    }

    fn update(&mut self, _symbol: &str, _bar: &Bar) {}

    fn size(&self, _symbol: &str, _equity: f64) -> Option<f64> {
        Some(self.size)
    }
}
