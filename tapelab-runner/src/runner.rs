//! Run orchestration: config file → data → engine → metrics → artifacts.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use tapelab_core::engine::{self, BacktestContext, BacktestResult, CancelToken};
use tapelab_core::error::EngineError;

use crate::config::RunConfig;
use crate::data_loader;
use crate::export;
use crate::metrics::PerformanceSummary;

/// Process exit codes for the CLI.
pub const EXIT_OK: i32 = 0;
pub const EXIT_INSUFFICIENT_CASH: i32 = 2;
pub const EXIT_BAD_CONFIG: i32 = 3;
pub const EXIT_DATA_GAP: i32 = 4;

#[derive(Debug)]
pub struct RunSummary {
    pub result: BacktestResult,
    pub metrics: PerformanceSummary,
    pub artifacts: Vec<PathBuf>,
}

/// Execute a backtest described by a TOML config file and write artifacts.
pub fn run_from_file(config_path: &Path, cancel: &CancelToken) -> Result<RunSummary> {
    let config = RunConfig::from_file(config_path)
        .map_err(|e| anyhow::Error::new(EngineError::Config(e.to_string())))?;
    run_config(config, cancel)
}

pub fn run_config(config: RunConfig, cancel: &CancelToken) -> Result<RunSummary> {
    let ctx = BacktestContext::new(config.backtest.clone())?;

    let mut paths = Vec::new();
    for symbol in &ctx.config.symbols {
        let path = config
            .data_path(symbol)
            .map_err(|e| anyhow::Error::new(EngineError::Config(e.to_string())))?;
        paths.push((symbol.clone(), path));
    }
    let mut source = data_loader::load_source(&paths, ctx.config.base_interval)?;

    info!(
        symbols = ?ctx.config.symbols,
        base_interval = %ctx.config.base_interval,
        seed = ctx.config.rng_seed,
        "starting backtest"
    );

    let result = engine::run(&mut source, &ctx, cancel)?;
    let metrics = PerformanceSummary::compute(&result, ctx.config.annualization_factor());

    info!(
        final_equity = metrics.final_equity,
        trades = metrics.trade_count,
        rejections = metrics.rejection_count,
        "backtest complete"
    );

    let artifacts = export::save_artifacts(&config.output.dir, &result, &metrics)
        .context("failed to write artifacts")?;

    Ok(RunSummary { result, metrics, artifacts })
}

/// Map a run failure to the documented process exit code.
pub fn exit_code(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<EngineError>() {
        Some(EngineError::Config(_)) => EXIT_BAD_CONFIG,
        Some(EngineError::DataGap { .. }) => EXIT_DATA_GAP,
        Some(EngineError::InsufficientCash { .. }) => EXIT_INSUFFICIENT_CASH,
        Some(EngineError::Bar(_)) => EXIT_DATA_GAP,
        None => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn exit_codes_map_error_kinds() {
        let config_err = anyhow::Error::new(EngineError::Config("bad".into()));
        assert_eq!(exit_code(&config_err), EXIT_BAD_CONFIG);

        let gap = anyhow::Error::new(EngineError::DataGap {
            symbol: "SPY".into(),
            timestamp: Utc.timestamp_opt(0, 0).unwrap(),
            detail: "gap".into(),
        });
        assert_eq!(exit_code(&gap), EXIT_DATA_GAP);

        let cash = anyhow::Error::new(EngineError::InsufficientCash {
            usable: -1.0,
            timestamp: Utc.timestamp_opt(0, 0).unwrap(),
        });
        assert_eq!(exit_code(&cash), EXIT_INSUFFICIENT_CASH);

        let other = anyhow::anyhow!("something else");
        assert_eq!(exit_code(&other), 1);
    }
}
