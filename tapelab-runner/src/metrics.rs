//! Post-run performance metrics — pure functions over the equity curve and
//! trade log, nothing here touches the engine.

use serde::{Deserialize, Serialize};
use tapelab_core::engine::{BacktestResult, TradeLogEntry};
use tapelab_core::portfolio::EquityPoint;

/// Aggregate statistics for one backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub initial_capital: f64,
    pub final_equity: f64,
    pub total_return: f64,
    pub cagr: f64,
    pub sharpe: f64,
    /// Largest peak-to-trough decline as a negative fraction.
    pub max_drawdown: f64,
    /// Largest peak-to-trough decline in currency.
    pub max_drawdown_value: f64,
    /// Longest time underwater, in trading intervals.
    pub max_drawdown_duration: usize,
    /// Total traded notional over average equity.
    pub turnover: f64,
    /// Wins over closing fills with non-zero realized PnL.
    pub win_rate: f64,
    pub trade_count: usize,
    pub rejection_count: usize,
    pub commissions_paid: f64,
}

impl PerformanceSummary {
    pub fn compute(result: &BacktestResult, annualization_factor: f64) -> Self {
        let equity: Vec<f64> = std::iter::once(result.initial_capital)
            .chain(result.equity_curve.iter().map(|p| p.equity))
            .collect();
        let fills: Vec<&TradeLogEntry> = result.fills().collect();
        let (dd, dd_value, dd_duration) = max_drawdown(&equity);

        Self {
            initial_capital: result.initial_capital,
            final_equity: result.final_equity(),
            total_return: total_return(&equity),
            cagr: cagr(&equity, annualization_factor),
            sharpe: sharpe_ratio(&equity, annualization_factor),
            max_drawdown: dd,
            max_drawdown_value: dd_value,
            max_drawdown_duration: dd_duration,
            turnover: turnover(&fills, &result.equity_curve, result.initial_capital),
            win_rate: win_rate(&fills),
            trade_count: fills.len(),
            rejection_count: result.trade_log.len() - fills.len(),
            commissions_paid: fills.iter().map(|f| f.commission).sum(),
        }
    }
}

/// Per-interval simple returns of the equity curve.
pub fn interval_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .map(|w| if w[0] != 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

/// (final - initial) / initial; zero for degenerate curves.
pub fn total_return(equity: &[f64]) -> f64 {
    match (equity.first(), equity.last()) {
        (Some(&initial), Some(&last)) if initial > 0.0 => (last - initial) / initial,
        _ => 0.0,
    }
}

/// Compound growth rate annualized by `periods_per_year`.
pub fn cagr(equity: &[f64], periods_per_year: f64) -> f64 {
    if equity.len() < 2 {
        return 0.0;
    }
    let initial = equity[0];
    let last = *equity.last().expect("non-empty");
    if initial <= 0.0 || last <= 0.0 || periods_per_year <= 0.0 {
        return 0.0;
    }
    let years = (equity.len() - 1) as f64 / periods_per_year;
    if years <= 0.0 {
        return 0.0;
    }
    (last / initial).powf(1.0 / years) - 1.0
}

/// Annualized Sharpe over per-interval returns (zero risk-free rate).
pub fn sharpe_ratio(equity: &[f64], periods_per_year: f64) -> f64 {
    let returns = interval_returns(equity);
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>()
        / (returns.len() - 1) as f64;
    let std = var.sqrt();
    if std < 1e-15 {
        return 0.0;
    }
    mean / std * periods_per_year.sqrt()
}

/// High-water-mark walk: returns (largest drawdown as a negative fraction,
/// largest drawdown in currency, longest underwater stretch in intervals).
pub fn max_drawdown(equity: &[f64]) -> (f64, f64, usize) {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    let mut max_dd_value = 0.0_f64;
    let mut duration = 0usize;
    let mut max_duration = 0usize;

    for &eq in equity {
        if eq >= peak {
            peak = eq;
            duration = 0;
        } else {
            duration += 1;
            max_duration = max_duration.max(duration);
            max_dd_value = max_dd_value.max(peak - eq);
            if peak > 0.0 {
                let dd = (eq - peak) / peak;
                if dd < max_dd {
                    max_dd = dd;
                }
            }
        }
    }
    (max_dd, max_dd_value, max_duration)
}

/// Total traded notional over average marked equity.
pub fn turnover(fills: &[&TradeLogEntry], curve: &[EquityPoint], initial: f64) -> f64 {
    let notional: f64 = fills.iter().map(|f| f.quantity * f.price).sum();
    let avg_equity = if curve.is_empty() {
        initial
    } else {
        curve.iter().map(|p| p.equity).sum::<f64>() / curve.len() as f64
    };
    if avg_equity <= 0.0 {
        return 0.0;
    }
    notional / avg_equity
}

/// Fraction of profitable closing fills among those that realized PnL.
pub fn win_rate(fills: &[&TradeLogEntry]) -> f64 {
    let wins = fills.iter().filter(|f| f.realized_pnl > 0.0).count();
    let losses = fills.iter().filter(|f| f.realized_pnl < 0.0).count();
    let closed = wins + losses;
    if closed == 0 {
        return 0.0;
    }
    wins as f64 / closed as f64
}
