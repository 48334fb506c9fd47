//! tapelab core engine.
//!
//! Replays historical bars in strict chronological order, resamples the base
//! frequency for subscribed strategies, sizes and risk-checks the resulting
//! signals, simulates execution with commissions and multi-factor slippage,
//! and maintains a mark-to-market portfolio with margin accounting for
//! shorts.

pub mod aggregate;
pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod execution;
pub mod portfolio;
pub mod risk;
pub mod rng;
pub mod sizers;
pub mod strategy;
