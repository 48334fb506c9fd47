//! Bar storage and bar sources.

mod source;
mod store;

pub use source::{BarSource, VecSource};
pub use store::BarStore;
