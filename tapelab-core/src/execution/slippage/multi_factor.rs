//! Multi-factor slippage estimator.
//!
//! Per fill:
//!
//! ```text
//! slippage = (spread/2 + market_impact + momentum_cost · liquidity_cost) · noise
//! ```
//!
//! where the spread comes from the EDGE estimator over rolling OHLC history,
//! market impact follows a 3/5 power law in participation damped by turnover
//! stability, momentum cost is positive when trading *with* the market, and
//! noise is lognormal with a deterministic seed. The result is clamped into
//! `[floor, cap]` and signed by the execution handler.
//!
//! Bar-level features are cached per (symbol, bar); only the
//! participation-dependent terms are recomputed per fill. Default windows
//! are calibrated for daily bars — config validation refuses sub-daily base
//! intervals without an explicit annualization factor.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::LogNormal;
use tracing::warn;

use crate::config::SlippageConfig;
use crate::data::BarStore;
use crate::domain::{Bar, Direction, Interval};
use crate::engine::{Diagnostic, DiagnosticKind};
use crate::execution::slippage::{edge_spread, SlippageModel};

/// Rolling per-bar features feeding the composite estimate.
#[derive(Debug, Clone, Default)]
pub struct BarFeatures {
    /// EDGE fractional spread.
    pub spread: f64,
    /// Log close-return of the bar.
    pub ret: f64,
    /// Annualized sample std-dev of log returns over the three windows.
    pub vol_short: f64,
    pub vol_med: f64,
    pub vol_long: f64,
    /// Today's volume over its long moving average, clamped to [0, 5].
    pub volume_surge: f64,
    /// Amihud illiquidity: |return| per dollar traded.
    pub amihud: f64,
    /// Coefficient of variation of volume over the medium window.
    pub turnover_cv: f64,
    /// Change in close-to-close move, normalized by close.
    pub price_accel: f64,
    /// Monotone blend of Amihud and turnover instability.
    pub liquidity_cost: f64,
    pub volume: f64,
    /// Set when inputs were unusable (zero volume, non-finite terms); the
    /// estimate degrades to spread-only.
    pub degenerate: bool,
}

pub struct MultiFactorSlippage {
    config: SlippageConfig,
    annualization: f64,
    base_interval: Interval,
    rng: ChaCha8Rng,
    noise: Option<LogNormal<f64>>,
    cache: HashMap<(String, DateTime<Utc>), BarFeatures>,
    diagnostics: Vec<Diagnostic>,
}

impl MultiFactorSlippage {
    pub fn new(
        config: SlippageConfig,
        annualization: f64,
        base_interval: Interval,
        rng: ChaCha8Rng,
    ) -> Self {
        let noise = (config.noise_sigma > 0.0)
            .then(|| LogNormal::new(0.0, config.noise_sigma).expect("sigma validated at startup"));
        Self {
            config,
            annualization,
            base_interval,
            rng,
            noise,
            cache: HashMap::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Feature record for the latest bar of `symbol`, computed once per
    /// (symbol, bar) and cached.
    pub fn features(&mut self, symbol: &str, store: &BarStore) -> BarFeatures {
        let lookback = self
            .config
            .long_window
            .max(self.config.bidask_window)
            .max(self.config.med_window)
            + 2;
        let bars = store.last_n(symbol, self.base_interval, lookback);
        let Some(last) = bars.last() else {
            return BarFeatures { degenerate: true, ..BarFeatures::default() };
        };

        let key = (symbol.to_string(), last.timestamp);
        if let Some(cached) = self.cache.get(&key) {
            return cached.clone();
        }
        let features = compute_features(bars, &self.config, self.annualization);
        self.cache.insert(key, features.clone());
        features
    }

    fn clamp(&self, frac: f64) -> f64 {
        frac.clamp(self.config.floor, self.config.cap)
    }
}

impl SlippageModel for MultiFactorSlippage {
    fn estimate(
        &mut self,
        symbol: &str,
        direction: Direction,
        quantity: f64,
        store: &BarStore,
    ) -> f64 {
        let f = self.features(symbol, store);

        if f.degenerate || f.volume <= 0.0 {
            warn!(symbol, "slippage inputs degenerate, falling back to spread-only");
            self.diagnostics.push(Diagnostic {
                timestamp: store
                    .latest(symbol, self.base_interval)
                    .map(|b| b.timestamp)
                    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
                kind: DiagnosticKind::SlippageFallback,
                message: format!("{symbol}: spread-only slippage fallback"),
            });
            return self.clamp(f.spread / 2.0);
        }

        let participation = quantity / f.volume;
        let market_impact = self.config.impact_factor
            * f.vol_med
            * participation.powf(0.6)
            * (-f.turnover_cv).exp();
        // Positive when the trade chases the market's move.
        let momentum_cost = direction.sign() * f.ret;

        let mut frac = f.spread / 2.0 + market_impact + momentum_cost * f.liquidity_cost;
        if let Some(noise) = &self.noise {
            frac *= self.rng.sample(noise);
        }

        if !frac.is_finite() {
            warn!(symbol, "slippage estimate non-finite, falling back to spread-only");
            self.diagnostics.push(Diagnostic {
                timestamp: store
                    .latest(symbol, self.base_interval)
                    .map(|b| b.timestamp)
                    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
                kind: DiagnosticKind::SlippageFallback,
                message: format!("{symbol}: non-finite slippage estimate"),
            });
            return self.clamp(f.spread / 2.0);
        }
        self.clamp(frac)
    }

    fn name(&self) -> &str {
        "MultiFactorSlippage"
    }

    fn drain_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

fn compute_features(bars: &[Bar], config: &SlippageConfig, annualization: f64) -> BarFeatures {
    let n = bars.len();
    let last = &bars[n - 1];

    // Log close-returns, aligned so returns[i] belongs to bars[i + 1].
    let returns: Vec<f64> = bars
        .windows(2)
        .map(|w| {
            if w[0].close > 0.0 && w[1].close > 0.0 {
                (w[1].close / w[0].close).ln()
            } else {
                f64::NAN
            }
        })
        .collect();
    let ret = returns.last().copied().unwrap_or(0.0);

    let vol = |window: usize| -> f64 {
        if returns.len() < window || window < 2 {
            return 0.0;
        }
        sample_std(&returns[returns.len() - window..]) * annualization.sqrt()
    };
    let vol_short = vol(config.short_window);
    let vol_med = vol(config.med_window);
    let vol_long = vol(config.long_window);

    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let ma = |window: usize| -> f64 {
        if volumes.is_empty() {
            return 0.0;
        }
        let w = window.min(volumes.len());
        volumes[volumes.len() - w..].iter().sum::<f64>() / w as f64
    };
    let ma_long = ma(config.long_window);
    let volume_surge = if ma_long > 0.0 {
        (last.volume / ma_long).clamp(0.0, 5.0)
    } else {
        0.0
    };

    let dollar_volume = last.close * last.volume;
    let amihud = if dollar_volume > 0.0 { ret.abs() / dollar_volume } else { f64::NAN };

    let turnover_cv = {
        let w = config.med_window.min(volumes.len());
        if w < 2 {
            0.0
        } else {
            let slice = &volumes[volumes.len() - w..];
            let mean = slice.iter().sum::<f64>() / w as f64;
            if mean > 0.0 { sample_std(slice) / mean } else { f64::NAN }
        }
    };

    let price_accel = if n >= 3 && last.close > 0.0 {
        let d_today = bars[n - 1].close - bars[n - 2].close;
        let d_prev = bars[n - 2].close - bars[n - 3].close;
        (d_today - d_prev) / last.close
    } else {
        0.0
    };

    let spread = {
        let w = config.bidask_window.min(n.saturating_sub(1));
        edge_spread(&bars[n - 1 - w..]).unwrap_or(0.0)
    };

    let liquidity_cost = if amihud.is_finite() && turnover_cv.is_finite() {
        config.liquidity_factor
            * amihud.clamp(1e-8, f64::MAX).powf(config.liquidity_exponent)
            * (1.0 + turnover_cv)
    } else {
        f64::NAN
    };

    let degenerate = last.volume <= 0.0
        || !ret.is_finite()
        || !amihud.is_finite()
        || !turnover_cv.is_finite()
        || !liquidity_cost.is_finite();

    BarFeatures {
        spread,
        ret: if ret.is_finite() { ret } else { 0.0 },
        vol_short,
        vol_med,
        vol_long,
        volume_surge,
        amihud: if amihud.is_finite() { amihud } else { 0.0 },
        turnover_cv: if turnover_cv.is_finite() { turnover_cv } else { 0.0 },
        price_accel,
        liquidity_cost: if liquidity_cost.is_finite() { liquidity_cost } else { 0.0 },
        volume: last.volume,
        degenerate,
    }
}

fn sample_std(xs: &[f64]) -> f64 {
    let n = xs.len();
    if n < 2 {
        return 0.0;
    }
    let mean = xs.iter().sum::<f64>() / n as f64;
    let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    var.sqrt()
}
