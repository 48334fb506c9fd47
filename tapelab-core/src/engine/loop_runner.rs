//! The chronological event loop.
//!
//! One iteration per base-interval tick (all bars sharing a timestamp):
//!
//! 1. Fill orders scheduled for this tick at its opens, then enforce the
//!    usable-cash policy (fills book first — the trade already happened at
//!    the market).
//! 2. Ingest the tick's bars into the store.
//! 3. Fold bars through the aggregator; dispatch every closed interval to
//!    sizer updaters and strategies, collecting signals.
//! 4. Emit the tick's market event.
//! 5. Drain the queue to fixpoint: signal → size → risk → order → defer to
//!    the execution handler.
//! 6. Fill due market-on-close orders, accrue end-of-day costs, mark to
//!    market, append the equity point.
//!
//! Symbols closing simultaneously are processed in lexicographic order, so
//! runs are deterministic. A decision made while interval T closes can only
//! ever fill at T+1's open (or T's close for MOC) — the two rules that make
//! look-ahead structurally impossible rather than merely discouraged.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::BarManager;
use crate::config::BacktestConfig;
use crate::data::{BarSource, BarStore};
use crate::domain::{
    Bar, Direction, Event, FillEvent, IdGenerator, Interval, MarketEvent, OrderId, OrderType,
    SignalDirection,
};
use crate::engine::{BacktestContext, CancelToken, Diagnostic, EventQueue};
use crate::error::EngineError;
use crate::execution::SimulatedExecutionHandler;
use crate::portfolio::{EquityPoint, Portfolio};
use crate::risk::{RejectionReason, RiskManager};
use crate::sizers::Sizer;
use crate::strategy::Strategy;

/// One row of the trade log: a fill, or a risk rejection with its reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLogEntry {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub direction: Direction,
    pub quantity: f64,
    /// Fill price; zero for rejected orders that never traded.
    pub price: f64,
    pub commission: f64,
    pub slippage: f64,
    pub order_id: OrderId,
    pub realized_pnl: f64,
    pub rejection: Option<RejectionReason>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub initial_capital: f64,
    pub equity_curve: Vec<EquityPoint>,
    pub trade_log: Vec<TradeLogEntry>,
    pub diagnostics: Vec<Diagnostic>,
    pub cancelled: bool,
}

impl BacktestResult {
    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map_or(self.initial_capital, |p| p.equity)
    }

    pub fn fills(&self) -> impl Iterator<Item = &TradeLogEntry> {
        self.trade_log.iter().filter(|t| t.rejection.is_none())
    }
}

/// Run a backtest with components built from the context's config.
pub fn run(
    source: &mut dyn BarSource,
    ctx: &BacktestContext,
    cancel: &CancelToken,
) -> Result<BacktestResult, EngineError> {
    let strategies = ctx.build_strategies()?;
    let sizer = ctx.build_sizer();
    let execution = ctx.build_execution();
    run_with_components(source, strategies, sizer, execution, &ctx.config, cancel)
}

/// Run a backtest with explicit components. The entry point for tests and
/// for callers wiring custom strategies or models.
pub fn run_with_components(
    source: &mut dyn BarSource,
    mut strategies: Vec<Box<dyn Strategy>>,
    mut sizer: Box<dyn Sizer>,
    mut execution: SimulatedExecutionHandler,
    config: &BacktestConfig,
    cancel: &CancelToken,
) -> Result<BacktestResult, EngineError> {
    config.validate()?;

    let mut store = BarStore::new();
    let mut manager = BarManager::new(config.base_interval);
    let mut portfolio = Portfolio::new(config);
    let mut risk = RiskManager::new(config.risk.clone(), config.base_interval);
    let mut queue = EventQueue::new();
    let mut ids = IdGenerator::new();
    let mut trade_log: Vec<TradeLogEntry> = Vec::new();
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let mut cancelled = false;

    // Subscription registry: (symbol, interval) → strategy indices, in
    // registration order.
    let mut subscriptions: BTreeMap<(String, Interval), Vec<usize>> = BTreeMap::new();
    for (idx, strategy) in strategies.iter().enumerate() {
        for (symbol, interval) in strategy.subscriptions() {
            manager.subscribe(&symbol, interval)?;
            subscriptions.entry((symbol, interval)).or_default().push(idx);
        }
    }
    let sizer_interval = sizer.interval();
    for symbol in &config.symbols {
        manager.subscribe(symbol, sizer_interval)?;
    }

    let mut pending: Option<Bar> = source.next_bar()?;
    let mut last_tick_ts: Option<DateTime<Utc>> = None;

    while let Some(first) = pending.take() {
        let tick_ts = first.timestamp;
        check_tick_spacing(config.base_interval, last_tick_ts, &first)?;

        // Gather every bar sharing this timestamp into one tick.
        let mut tick_bars = vec![first];
        loop {
            match source.next_bar()? {
                Some(bar) if bar.timestamp == tick_ts => tick_bars.push(bar),
                Some(bar) if bar.timestamp < tick_ts => {
                    return Err(EngineError::DataGap {
                        symbol: bar.symbol,
                        timestamp: bar.timestamp,
                        detail: "source yielded decreasing timestamps".into(),
                    });
                }
                other => {
                    pending = other;
                    break;
                }
            }
        }
        tick_bars.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        // Last interval of the trading day, per the calendar implied by the
        // data: the next tick falls on a later date, or the tape ends.
        let is_day_close = match &pending {
            Some(next) => next.timestamp.date_naive() > tick_ts.date_naive(),
            None => true,
        };

        // Anchor the daily-drawdown baseline at the first tick of the day.
        let prior_equity = portfolio
            .equity_history()
            .last()
            .map_or(config.initial_capital, |p| p.equity);
        risk.on_tick(tick_ts, prior_equity);

        // ── 1. Deferred fills at this tick's opens ──
        for fill in execution.on_tick_open(tick_ts, &tick_bars, &store) {
            book_fill(&mut portfolio, &mut trade_log, &fill);
        }
        diagnostics.extend(execution.slippage_model().drain_diagnostics());

        if let Some(diag) =
            portfolio.check_usable_cash(tick_ts, config.continue_on_negative_cash)?
        {
            diagnostics.push(diag);
        }

        // ── 2 + 3. Ingest, aggregate, dispatch interval closes ──
        for bar in &tick_bars {
            store.append(bar.clone())?;
            let closed = manager.on_base_bar(bar, is_day_close, &mut store)?;
            for (symbol, interval) in closed {
                let closed_bar = store
                    .latest(&symbol, interval)
                    .cloned()
                    .expect("closed interval has a stored bar");
                if interval == sizer_interval {
                    sizer.update(&symbol, &closed_bar);
                }
                if let Some(indices) = subscriptions.get(&(symbol.clone(), interval)) {
                    for &idx in indices {
                        if let Some(signal) = strategies[idx].on_interval_close(
                            &symbol,
                            interval,
                            &closed_bar,
                            &store,
                        ) {
                            queue.push(Event::Signal(signal));
                        }
                    }
                }
            }
        }

        // ── 4. Market event for this tick ──
        queue.push(Event::Market(MarketEvent { timestamp: tick_ts, is_day_close }));

        // ── 5. Drain to fixpoint ──
        while let Some(event) = queue.pop() {
            match event {
                Event::Market(_) => {
                    // Strategies run off interval closes; the market event
                    // is the tick's bookkeeping marker.
                }
                Event::Signal(mut signal) => {
                    let equity = portfolio.mark_to_market(tick_ts, &store).equity;
                    let size = match sizer.size(&signal.symbol, equity) {
                        Some(s) => {
                            portfolio.set_position_size(&signal.symbol, s);
                            s
                        }
                        // Warm-up: reuse the previous size for the symbol.
                        None => portfolio.position_size(&signal.symbol, sizer.initial_size()),
                    };
                    let target = match signal.direction {
                        SignalDirection::Bullish => size * signal.strength,
                        SignalDirection::Bearish => -size * signal.strength,
                        SignalDirection::Flat => 0.0,
                    };
                    signal.target_holding = Some(target);

                    let Some(last_close) = store
                        .latest(&signal.symbol, config.base_interval)
                        .map(|b| b.close)
                    else {
                        continue;
                    };

                    let order_id = ids.next_order_id();
                    let Some(order) = portfolio.build_order(
                        &signal,
                        target,
                        last_close,
                        order_id,
                        OrderType::Market,
                    ) else {
                        continue;
                    };

                    match risk.review(&order, &portfolio, &store, equity) {
                        Ok(()) => {
                            portfolio.reserve(&order);
                            queue.push(Event::Order(order));
                        }
                        Err(reason) => {
                            trade_log.push(TradeLogEntry {
                                timestamp: order.timestamp,
                                symbol: order.symbol,
                                direction: order.direction,
                                quantity: order.quantity,
                                price: 0.0,
                                commission: 0.0,
                                slippage: 0.0,
                                order_id: order.id,
                                realized_pnl: 0.0,
                                rejection: Some(reason),
                            });
                        }
                    }
                }
                Event::Order(order) => execution.on_order(order),
                Event::Fill(fill) => book_fill(&mut portfolio, &mut trade_log, &fill),
            }
        }

        // ── 6. MOC fills, end-of-day accrual, mark to market ──
        for fill in execution.on_tick_close(tick_ts, is_day_close, &store) {
            book_fill(&mut portfolio, &mut trade_log, &fill);
        }
        diagnostics.extend(execution.slippage_model().drain_diagnostics());

        if is_day_close {
            portfolio.end_of_day(&store);
        }
        let point = portfolio.mark_to_market(tick_ts, &store);
        portfolio.record_equity(point)?;

        last_tick_ts = Some(tick_ts);
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }
    }

    Ok(BacktestResult {
        initial_capital: config.initial_capital,
        equity_curve: portfolio.equity_history().to_vec(),
        trade_log,
        diagnostics,
        cancelled,
    })
}

fn book_fill(portfolio: &mut Portfolio, trade_log: &mut Vec<TradeLogEntry>, fill: &FillEvent) {
    let realized = portfolio.on_fill(fill);
    trade_log.push(TradeLogEntry {
        timestamp: fill.timestamp,
        symbol: fill.symbol.clone(),
        direction: fill.direction,
        quantity: fill.quantity,
        price: fill.fill_price,
        commission: fill.commission,
        slippage: fill.slippage,
        order_id: fill.order_id,
        realized_pnl: realized,
        rejection: None,
    });
}

/// Ordering discipline across ticks. Equal or decreasing timestamps are
/// always fatal; for sub-daily bases a skipped slot within one trading day
/// is a missing bar (calendar gaps between days are legitimate).
fn check_tick_spacing(
    base: Interval,
    last_tick_ts: Option<DateTime<Utc>>,
    first: &Bar,
) -> Result<(), EngineError> {
    let Some(prev) = last_tick_ts else {
        return Ok(());
    };
    let ts = first.timestamp;
    if ts <= prev {
        return Err(EngineError::DataGap {
            symbol: first.symbol.clone(),
            timestamp: ts,
            detail: format!("non-increasing tick timestamp (previous {prev})"),
        });
    }
    if base.is_intraday() && ts.date_naive() == prev.date_naive() {
        let gap = (ts - prev).num_seconds();
        if gap != base.seconds() {
            return Err(EngineError::DataGap {
                symbol: first.symbol.clone(),
                timestamp: ts,
                detail: format!(
                    "missing bar: {gap}s between ticks, expected {}s",
                    base.seconds()
                ),
            });
        }
    }
    Ok(())
}
