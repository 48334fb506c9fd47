//! Engine error kinds and their recovery policies.
//!
//! `Config` and `DataGap` are fatal: the run never starts, or aborts, because
//! chronological ordering is the core invariant. `InsufficientCash` is fatal
//! unless `continue_on_negative_cash` is set, in which case it is downgraded
//! to a [`Diagnostic`](crate::engine::Diagnostic) record. Everything else
//! (warm-up, risk rejections, slippage fallbacks) is ordinary control flow
//! and never surfaces as an error.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("data gap for {symbol} at {timestamp}: {detail}")]
    DataGap {
        symbol: String,
        timestamp: DateTime<Utc>,
        detail: String,
    },

    #[error("usable cash is negative ({usable:.2}) at {timestamp}")]
    InsufficientCash {
        usable: f64,
        timestamp: DateTime<Utc>,
    },

    #[error(transparent)]
    Bar(#[from] crate::domain::BarError),
}
