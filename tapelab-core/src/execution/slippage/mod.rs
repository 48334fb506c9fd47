//! Slippage models: fractional execution cost per fill.
//!
//! A model returns the *unsigned* slippage fraction; the execution handler
//! applies the sign (buys pay `+frac · ref_price`, sells receive
//! `-frac · ref_price`). Models own any randomness they use so the rest of
//! the engine stays deterministic.

mod edge;
mod multi_factor;

pub use edge::edge_spread;
pub use multi_factor::MultiFactorSlippage;

use crate::data::BarStore;
use crate::domain::Direction;
use crate::engine::Diagnostic;

pub trait SlippageModel {
    /// Fractional slippage for a prospective fill, based on history in the
    /// store at call time.
    fn estimate(
        &mut self,
        symbol: &str,
        direction: Direction,
        quantity: f64,
        store: &BarStore,
    ) -> f64;

    /// Name of this model.
    fn name(&self) -> &str;

    /// Warnings accumulated since the last drain (numerical fallbacks).
    fn drain_diagnostics(&mut self) -> Vec<Diagnostic> {
        Vec::new()
    }
}

/// Frictionless fills.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSlippage;

impl SlippageModel for NoSlippage {
    fn estimate(&mut self, _: &str, _: Direction, _: f64, _: &BarStore) -> f64 {
        0.0
    }

    fn name(&self) -> &str {
        "NoSlippage"
    }
}
