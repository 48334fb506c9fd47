//! Typed backtest configuration.
//!
//! The runner deserializes these from TOML; tests construct them directly.
//! `validate` is the single startup gate: anything it rejects maps to the
//! bad-configuration exit path, nothing past it may fail on config grounds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::Interval;
use crate::error::EngineError;

/// Sentinel meaning "check disabled" for risk caps.
pub const DISABLED: f64 = -1.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub base_interval: Interval,
    pub symbols: Vec<String>,
    pub initial_capital: f64,
    #[serde(default)]
    pub strategies: Vec<StrategyConfig>,
    #[serde(default)]
    pub position_sizer: SizerConfig,
    #[serde(default)]
    pub slippage: SlippageConfig,
    #[serde(default)]
    pub commissions: CommissionConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub shorting: ShortingConfig,
    #[serde(default)]
    pub continue_on_negative_cash: bool,
    #[serde(default = "default_seed")]
    pub rng_seed: u64,
}

fn default_seed() -> u64 {
    42
}

/// One strategy instance: name resolved by the factory, free-form numeric
/// params, and the frequencies it subscribes to (base interval if empty).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
    #[serde(default)]
    pub frequencies: Vec<Interval>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizerMethod {
    Atr,
    Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SizerConfig {
    pub method: SizerMethod,
    /// ATR lookback period (Wilder smoothing).
    pub period: usize,
    /// Stop distance as a multiple of ATR.
    pub atr_multiplier: f64,
    /// Fraction of total equity risked per trade.
    pub risk_per_trade: f64,
    /// Size used until the sizer has warmed up.
    pub initial_position_size: f64,
    /// Share-count rounding: 0 = whole shares.
    pub decimal_places: u32,
    /// Interval the ATR updater subscribes to; `None` = base interval.
    #[serde(default)]
    pub interval: Option<Interval>,
}

impl Default for SizerConfig {
    fn default() -> Self {
        Self {
            method: SizerMethod::Atr,
            period: 14,
            atr_multiplier: 2.0,
            risk_per_trade: 0.01,
            initial_position_size: 100.0,
            decimal_places: 0,
            interval: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlippageModelKind {
    None,
    MultiFactor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlippageConfig {
    pub model: SlippageModelKind,
    /// Rolling windows for volatility and volume features, in bars.
    pub short_window: usize,
    pub med_window: usize,
    pub long_window: usize,
    /// Rolling OHLC window for the EDGE spread estimator.
    pub bidask_window: usize,
    /// Sigma of the lognormal noise factor; 0 disables noise.
    pub noise_sigma: f64,
    /// Clamp bounds on the fractional slippage.
    pub floor: f64,
    pub cap: f64,
    /// Periods per year. Defaults for daily data; must be set explicitly when
    /// the base interval is sub-daily.
    #[serde(default)]
    pub annualization_factor: Option<f64>,
    /// Market-impact scale `k`.
    pub impact_factor: f64,
    /// Liquidity-cost power-law scale and exponent over the Amihud measure.
    pub liquidity_factor: f64,
    pub liquidity_exponent: f64,
    /// Haircut added to the estimated cost of in-flight buys.
    pub slippage_guard: f64,
}

impl Default for SlippageConfig {
    fn default() -> Self {
        Self {
            model: SlippageModelKind::None,
            short_window: 5,
            med_window: 21,
            long_window: 63,
            bidask_window: 21,
            noise_sigma: 0.25,
            floor: 0.0,
            cap: 0.05,
            annualization_factor: None,
            impact_factor: 0.1,
            liquidity_factor: 1.0,
            liquidity_exponent: 0.25,
            slippage_guard: 0.02,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CommissionConfig {
    #[serde(default)]
    pub per_share: f64,
    #[serde(default)]
    pub per_trade: f64,
    #[serde(default)]
    pub bps: f64,
}

/// Risk caps; `-1` disables a check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub max_order_quantity: f64,
    pub max_notional: f64,
    /// Daily equity decline (fraction) beyond which only reducing orders pass.
    pub max_daily_drawdown: f64,
    pub max_gross_exposure: f64,
    pub max_net_exposure: f64,
    /// Order quantity as a fraction of the last bar's volume.
    pub pov_cap: f64,
    /// Max orders within the sliding window.
    pub max_order_rate: f64,
    /// Sliding window for the order-rate check, in seconds.
    #[serde(default = "default_rate_window")]
    pub order_rate_window_secs: i64,
}

fn default_rate_window() -> i64 {
    86_400
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_order_quantity: DISABLED,
            max_notional: DISABLED,
            max_daily_drawdown: DISABLED,
            max_gross_exposure: DISABLED,
            max_net_exposure: DISABLED,
            pov_cap: DISABLED,
            max_order_rate: DISABLED,
            order_rate_window_secs: default_rate_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortingConfig {
    /// Annualized stock-borrow rate.
    pub annual_borrow_rate: f64,
    /// Multiplier on short notional held out of usable cash.
    pub maintenance_margin_multiplier: f64,
    #[serde(default = "default_trading_days")]
    pub trading_days_per_year: f64,
}

fn default_trading_days() -> f64 {
    252.0
}

impl Default for ShortingConfig {
    fn default() -> Self {
        Self {
            annual_borrow_rate: 0.01,
            maintenance_margin_multiplier: 1.5,
            trading_days_per_year: default_trading_days(),
        }
    }
}

impl BacktestConfig {
    /// Minimal config for tests: one interval, a symbol list, starting cash.
    pub fn minimal(
        base_interval: Interval,
        symbols: Vec<String>,
        initial_capital: f64,
    ) -> Self {
        Self {
            base_interval,
            symbols,
            initial_capital,
            strategies: Vec::new(),
            position_sizer: SizerConfig::default(),
            slippage: SlippageConfig::default(),
            commissions: CommissionConfig::default(),
            risk: RiskConfig::default(),
            shorting: ShortingConfig::default(),
            continue_on_negative_cash: false,
            rng_seed: default_seed(),
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.symbols.is_empty() {
            return Err(EngineError::Config("symbols must not be empty".into()));
        }
        if self.initial_capital <= 0.0 {
            return Err(EngineError::Config(format!(
                "initial_capital must be positive, got {}",
                self.initial_capital
            )));
        }
        if !(0.0..1.0).contains(&self.position_sizer.risk_per_trade) {
            return Err(EngineError::Config(format!(
                "position_sizer.risk_per_trade must be in [0, 1), got {}",
                self.position_sizer.risk_per_trade
            )));
        }
        if self.position_sizer.method == SizerMethod::Atr && self.position_sizer.period == 0 {
            return Err(EngineError::Config("position_sizer.period must be > 0".into()));
        }
        if self.slippage.cap < self.slippage.floor {
            return Err(EngineError::Config(format!(
                "slippage.cap ({}) below slippage.floor ({})",
                self.slippage.cap, self.slippage.floor
            )));
        }
        if !self.slippage.noise_sigma.is_finite() || self.slippage.noise_sigma < 0.0 {
            return Err(EngineError::Config(format!(
                "slippage.noise_sigma must be finite and non-negative, got {}",
                self.slippage.noise_sigma
            )));
        }
        // The multi-factor model's default calibration assumes daily bars.
        // Sub-daily runs must say what a year is rather than inherit it.
        if self.slippage.model == SlippageModelKind::MultiFactor
            && self.base_interval.is_intraday()
            && self.slippage.annualization_factor.is_none()
        {
            return Err(EngineError::Config(format!(
                "multi-factor slippage with base_interval {} requires an explicit \
                 slippage.annualization_factor",
                self.base_interval
            )));
        }
        for (name, cap) in [
            ("max_order_quantity", self.risk.max_order_quantity),
            ("max_notional", self.risk.max_notional),
            ("max_daily_drawdown", self.risk.max_daily_drawdown),
            ("max_gross_exposure", self.risk.max_gross_exposure),
            ("max_net_exposure", self.risk.max_net_exposure),
            ("pov_cap", self.risk.pov_cap),
            ("max_order_rate", self.risk.max_order_rate),
        ] {
            if cap != DISABLED && cap < 0.0 {
                return Err(EngineError::Config(format!(
                    "risk.{name} must be -1 (disabled) or non-negative, got {cap}"
                )));
            }
        }
        for strat in &self.strategies {
            for freq in &strat.frequencies {
                if *freq < self.base_interval {
                    return Err(EngineError::Config(format!(
                        "strategy {} subscribes to {} which is finer than base interval {}",
                        strat.name, freq, self.base_interval
                    )));
                }
            }
        }
        Ok(())
    }

    /// Effective periods-per-year for annualization.
    pub fn annualization_factor(&self) -> f64 {
        self.slippage.annualization_factor.unwrap_or(252.0)
    }
}
