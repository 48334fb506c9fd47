//! Simulated order execution.
//!
//! The look-ahead discipline lives here: a market order accepted while
//! interval T is closing cannot see T's own fill price — it is queued and
//! filled at the *open of the next base-interval bar*. Market-on-close
//! orders wait for the last interval of the trading day and fill at its
//! close. All fills are whole; there are no partial fills.

mod commission;
pub mod slippage;

pub use commission::CommissionModel;

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::data::BarStore;
use crate::domain::{Bar, Direction, FillEvent, Interval, OrderEvent, OrderType};
use crate::execution::slippage::SlippageModel;

pub struct SimulatedExecutionHandler {
    base_interval: Interval,
    queue: VecDeque<OrderEvent>,
    commission: CommissionModel,
    slippage: Box<dyn SlippageModel>,
}

impl SimulatedExecutionHandler {
    pub fn new(
        base_interval: Interval,
        commission: CommissionModel,
        slippage: Box<dyn SlippageModel>,
    ) -> Self {
        Self { base_interval, queue: VecDeque::new(), commission, slippage }
    }

    /// Accept an order; it stays queued until its scheduled fill time.
    pub fn on_order(&mut self, order: OrderEvent) {
        self.queue.push_back(order);
    }

    pub fn pending_orders(&self) -> usize {
        self.queue.len()
    }

    pub fn slippage_model(&mut self) -> &mut dyn SlippageModel {
        self.slippage.as_mut()
    }

    /// Fill market orders scheduled for this tick, at the tick bars' opens.
    ///
    /// Runs before the tick's bars are ingested, so slippage features only
    /// see history up to the previous interval — the decision's information
    /// set — while the reference price is the newly revealed open.
    pub fn on_tick_open(
        &mut self,
        tick_ts: DateTime<Utc>,
        tick_bars: &[Bar],
        store: &BarStore,
    ) -> Vec<FillEvent> {
        let mut fills = Vec::new();
        let mut still_queued = VecDeque::new();

        while let Some(order) = self.queue.pop_front() {
            let due = order.order_type == OrderType::Market && order.timestamp < tick_ts;
            let bar = tick_bars.iter().find(|b| b.symbol == order.symbol);
            match (due, bar) {
                (true, Some(bar)) => {
                    fills.push(self.fill(order, bar.open, tick_ts, store));
                }
                _ => still_queued.push_back(order),
            }
        }
        self.queue = still_queued;
        fills
    }

    /// Fill market-on-close orders at this tick's closes when the tick is
    /// the last interval of its trading day.
    pub fn on_tick_close(
        &mut self,
        tick_ts: DateTime<Utc>,
        is_day_close: bool,
        store: &BarStore,
    ) -> Vec<FillEvent> {
        if !is_day_close {
            return Vec::new();
        }
        let mut fills = Vec::new();
        let mut still_queued = VecDeque::new();

        while let Some(order) = self.queue.pop_front() {
            let due = order.order_type == OrderType::MarketOnClose && order.timestamp <= tick_ts;
            let close = store
                .latest(&order.symbol, self.base_interval)
                .map(|b| b.close);
            match (due, close) {
                (true, Some(close)) => {
                    fills.push(self.fill(order, close, tick_ts, store));
                }
                _ => still_queued.push_back(order),
            }
        }
        self.queue = still_queued;
        fills
    }

    fn fill(
        &mut self,
        order: OrderEvent,
        reference_price: f64,
        tick_ts: DateTime<Utc>,
        store: &BarStore,
    ) -> FillEvent {
        let frac =
            self.slippage
                .estimate(&order.symbol, order.direction, order.quantity, store);
        // Buys pay up, sells receive less.
        let slippage = order.direction.sign() * frac * reference_price;
        let fill_price = reference_price + slippage;
        let commission = self.commission.charge(order.quantity, fill_price);
        FillEvent {
            order_id: order.id,
            symbol: order.symbol,
            direction: order.direction,
            quantity: order.quantity,
            fill_price,
            commission,
            slippage,
            timestamp: tick_ts,
        }
    }
}
