//! Mark-to-market portfolio with margin accounting for shorts.
//!
//! Cash is a single pot with two earmarked partitions: `reserved_cash`
//! (estimated cost of in-flight buy orders) and `margin_locked` (maintenance
//! margin against short notional). The canonical equity identity is
//!
//! ```text
//! equity = cash + Σ quantity · close
//! usable_cash = cash - reserved_cash - margin_locked
//! ```
//!
//! Worked example: own 1 AAPL, $0 cash, sell 2 AAPL at $10 with a 1.5x
//! maintenance multiplier → cash = $20, position = -1, margin_locked = $15,
//! usable_cash = $5, equity = $10. (The engine's upstream documents disagree
//! on the equity formula in places; this identity is the one the whole crate
//! is written against.)

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{BacktestConfig, ShortingConfig};
use crate::data::BarStore;
use crate::domain::{
    Direction, FillEvent, Interval, OrderEvent, OrderId, OrderType, Position, SignalEvent,
};
use crate::engine::{Diagnostic, DiagnosticKind};
use crate::error::EngineError;

/// One row of the equity ledger, appended at every base-interval close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub cash: f64,
    pub reserved_cash: f64,
    pub margin_locked: f64,
    pub position_value: f64,
    pub equity: f64,
}

#[derive(Debug)]
pub struct Portfolio {
    initial_capital: f64,
    cash: f64,
    reserved_cash: f64,
    margin_locked: f64,
    positions: BTreeMap<String, Position>,
    /// Reserved amount per in-flight order (zero for sells). Removed whole
    /// on fill; the fill itself is the authoritative cash movement.
    in_flight: BTreeMap<OrderId, f64>,
    /// Last sizer output per symbol, reused while the sizer warms up.
    sizes: BTreeMap<String, f64>,
    equity_history: Vec<EquityPoint>,
    realized_pnl: f64,
    commissions_paid: f64,
    borrow_costs_paid: f64,
    shorting: ShortingConfig,
    slippage_guard: f64,
    base_interval: Interval,
}

impl Portfolio {
    pub fn new(config: &BacktestConfig) -> Self {
        Self {
            initial_capital: config.initial_capital,
            cash: config.initial_capital,
            reserved_cash: 0.0,
            margin_locked: 0.0,
            positions: BTreeMap::new(),
            in_flight: BTreeMap::new(),
            sizes: BTreeMap::new(),
            equity_history: Vec::new(),
            realized_pnl: 0.0,
            commissions_paid: 0.0,
            borrow_costs_paid: 0.0,
            shorting: config.shorting.clone(),
            slippage_guard: config.slippage.slippage_guard,
            base_interval: config.base_interval,
        }
    }

    // ─── Accessors ──────────────────────────────────────────────────

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn reserved_cash(&self) -> f64 {
        self.reserved_cash
    }

    pub fn margin_locked(&self) -> f64 {
        self.margin_locked
    }

    pub fn usable_cash(&self) -> f64 {
        self.cash - self.reserved_cash - self.margin_locked
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn commissions_paid(&self) -> f64 {
        self.commissions_paid
    }

    pub fn borrow_costs_paid(&self) -> f64 {
        self.borrow_costs_paid
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn signed_quantity(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).map_or(0.0, |p| p.quantity)
    }

    pub fn in_flight_reserved(&self) -> f64 {
        self.in_flight.values().sum()
    }

    pub fn equity_history(&self) -> &[EquityPoint] {
        &self.equity_history
    }

    /// Last sizer output for a symbol, falling back to `initial` before the
    /// first successful sizing call.
    pub fn position_size(&self, symbol: &str, initial: f64) -> f64 {
        self.sizes.get(symbol).copied().unwrap_or(initial)
    }

    pub fn set_position_size(&mut self, symbol: &str, size: f64) {
        self.sizes.insert(symbol.to_string(), size);
    }

    // ─── Signal → order ─────────────────────────────────────────────

    /// Build the order that moves `symbol` to `target_holding`, or `None`
    /// when already there. No state is touched: reservation happens in
    /// [`reserve`](Self::reserve) only after the risk manager passes the
    /// order, so a rejection leaves the portfolio untouched.
    pub fn build_order(
        &self,
        signal: &SignalEvent,
        target_holding: f64,
        last_close: f64,
        id: OrderId,
        order_type: OrderType,
    ) -> Option<OrderEvent> {
        let delta = target_holding - self.signed_quantity(&signal.symbol);
        if delta.abs() < f64::EPSILON {
            return None;
        }
        let direction = if delta > 0.0 { Direction::Buy } else { Direction::Sell };
        let quantity = delta.abs();
        let estimated_cost = match direction {
            Direction::Buy => quantity * last_close * (1.0 + self.slippage_guard),
            Direction::Sell => 0.0,
        };
        Some(OrderEvent {
            id,
            symbol: signal.symbol.clone(),
            order_type,
            direction,
            quantity,
            estimated_cost,
            timestamp: signal.timestamp,
        })
    }

    /// Earmark the estimated cost of an accepted order until its fill.
    pub fn reserve(&mut self, order: &OrderEvent) {
        self.reserved_cash += order.estimated_cost;
        self.in_flight.insert(order.id, order.estimated_cost);
    }

    // ─── Fill handling ──────────────────────────────────────────────

    /// Book a fill: move cash, update the position (weighted-average cost on
    /// adds, realized PnL on reduces), release the whole reservation for the
    /// order. Returns the realized PnL of the fill.
    pub fn on_fill(&mut self, fill: &FillEvent) -> f64 {
        self.cash -= fill.cost();
        self.cash -= fill.commission;
        self.commissions_paid += fill.commission;

        if let Some(reserved) = self.in_flight.remove(&fill.order_id) {
            self.reserved_cash -= reserved;
        }

        let position = self
            .positions
            .entry(fill.symbol.clone())
            .or_insert_with(|| Position::new(fill.symbol.clone()));
        let realized = position.apply_fill(fill.direction, fill.quantity, fill.fill_price);
        self.realized_pnl += realized;

        if position.is_flat() {
            // Accrued borrow is booked into the run total at end_of_day, so a
            // flat position carries no outstanding cost and can be dropped.
            self.positions.remove(&fill.symbol);
        }
        realized
    }

    // ─── End of day ─────────────────────────────────────────────────

    /// Accrue borrow costs on shorts and re-mark the maintenance margin,
    /// using the day's closing prices. Called once per trading day, at its
    /// last interval.
    pub fn end_of_day(&mut self, store: &BarStore) {
        let mut margin_required = 0.0;
        for position in self.positions.values_mut() {
            if !position.is_short() {
                continue;
            }
            let Some(bar) = store.latest(&position.symbol, self.base_interval) else {
                continue;
            };
            let short_notional = position.quantity.abs() * bar.close;
            let daily_borrow = short_notional * self.shorting.annual_borrow_rate
                / self.shorting.trading_days_per_year;
            self.cash -= daily_borrow;
            position.accrued_borrow_cost += daily_borrow;
            self.borrow_costs_paid += daily_borrow;
            margin_required += short_notional * self.shorting.maintenance_margin_multiplier;
        }
        self.margin_locked = margin_required;
    }

    // ─── Mark to market ─────────────────────────────────────────────

    /// Total mark value of open positions at the latest stored closes.
    pub fn position_value(&self, store: &BarStore) -> f64 {
        self.positions
            .values()
            .map(|p| {
                let close = store
                    .latest(&p.symbol, self.base_interval)
                    .map_or(p.avg_cost, |b| b.close);
                p.market_value(close)
            })
            .sum()
    }

    /// Compute the equity point for a tick. Pure: calling twice without an
    /// intervening fill yields the identical point.
    pub fn mark_to_market(&self, timestamp: DateTime<Utc>, store: &BarStore) -> EquityPoint {
        let position_value = self.position_value(store);
        EquityPoint {
            timestamp,
            cash: self.cash,
            reserved_cash: self.reserved_cash,
            margin_locked: self.margin_locked,
            position_value,
            equity: self.cash + position_value,
        }
    }

    /// Append an equity point, keeping the history strictly monotonic in
    /// timestamp. Re-recording the current tick replaces the last point.
    pub fn record_equity(&mut self, point: EquityPoint) -> Result<(), EngineError> {
        if let Some(last) = self.equity_history.last() {
            if point.timestamp < last.timestamp {
                return Err(EngineError::DataGap {
                    symbol: String::new(),
                    timestamp: point.timestamp,
                    detail: "equity point older than history tail".into(),
                });
            }
            if point.timestamp == last.timestamp {
                *self.equity_history.last_mut().expect("non-empty") = point;
                return Ok(());
            }
        }
        self.equity_history.push(point);
        Ok(())
    }

    // ─── Start of bar ───────────────────────────────────────────────

    /// Enforce the negative-usable-cash policy at the start of a bar.
    ///
    /// Raises `InsufficientCashError` unless `continue_on_negative_cash`,
    /// in which case a diagnostic is returned and the run proceeds.
    pub fn check_usable_cash(
        &self,
        timestamp: DateTime<Utc>,
        continue_on_negative_cash: bool,
    ) -> Result<Option<Diagnostic>, EngineError> {
        let usable = self.usable_cash();
        if usable >= 0.0 {
            return Ok(None);
        }
        if !continue_on_negative_cash {
            return Err(EngineError::InsufficientCash { usable, timestamp });
        }
        warn!(usable, %timestamp, "usable cash is negative, continuing");
        Ok(Some(Diagnostic {
            timestamp,
            kind: DiagnosticKind::NegativeUsableCash,
            message: format!("usable cash {usable:.2} below zero"),
        }))
    }
}
