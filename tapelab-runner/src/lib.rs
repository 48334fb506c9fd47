//! tapelab runner: loads config and data, drives the core engine, computes
//! post-run metrics, and writes the artifact set (equity CSV, trade CSV,
//! metrics JSON).

pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod runner;
