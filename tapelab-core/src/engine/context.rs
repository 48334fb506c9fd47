//! Backtest context: validated config plus the seed source, injected into
//! every component at construction. There are no process-wide singletons —
//! two contexts in one process cannot observe each other.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{BacktestConfig, SizerMethod, SlippageModelKind};
use crate::error::EngineError;
use crate::execution::slippage::{MultiFactorSlippage, NoSlippage, SlippageModel};
use crate::execution::{CommissionModel, SimulatedExecutionHandler};
use crate::rng::SeedSource;
use crate::sizers::{AtrSizer, FixedSizer, Sizer};
use crate::strategy::{self, Strategy};

#[derive(Debug, Clone)]
pub struct BacktestContext {
    pub config: BacktestConfig,
    seeds: SeedSource,
}

impl BacktestContext {
    /// Validate the config and freeze it into a context.
    pub fn new(config: BacktestConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let seeds = SeedSource::new(config.rng_seed);
        Ok(Self { config, seeds })
    }

    pub fn seeds(&self) -> &SeedSource {
        &self.seeds
    }

    pub fn build_sizer(&self) -> Box<dyn Sizer> {
        match self.config.position_sizer.method {
            SizerMethod::Atr => Box::new(AtrSizer::new(
                self.config.position_sizer.clone(),
                self.config.base_interval,
            )),
            SizerMethod::Fixed => Box::new(FixedSizer::new(
                &self.config.position_sizer,
                self.config.base_interval,
            )),
        }
    }

    pub fn build_slippage(&self) -> Box<dyn SlippageModel> {
        match self.config.slippage.model {
            SlippageModelKind::None => Box::new(NoSlippage),
            SlippageModelKind::MultiFactor => Box::new(MultiFactorSlippage::new(
                self.config.slippage.clone(),
                self.config.annualization_factor(),
                self.config.base_interval,
                self.seeds.rng_for("slippage"),
            )),
        }
    }

    pub fn build_execution(&self) -> SimulatedExecutionHandler {
        SimulatedExecutionHandler::new(
            self.config.base_interval,
            CommissionModel::new(self.config.commissions.clone()),
            self.build_slippage(),
        )
    }

    pub fn build_strategies(&self) -> Result<Vec<Box<dyn Strategy>>, EngineError> {
        self.config
            .strategies
            .iter()
            .map(|sc| strategy::from_config(sc, &self.config.symbols, self.config.base_interval))
            .collect()
    }
}

/// Cooperative cancellation: when signalled, the loop finishes the current
/// tick, emits the equity curve so far, and returns.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// A surfaced, non-fatal condition (negative usable cash under the
/// continue flag, slippage numerical fallbacks).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub timestamp: DateTime<Utc>,
    pub kind: DiagnosticKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    NegativeUsableCash,
    SlippageFallback,
}
