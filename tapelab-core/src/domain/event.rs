//! Typed events drained by the backtest loop.
//!
//! Handlers are pure with respect to the queue: each event is processed in
//! FIFO order and may enqueue follow-up events, which keeps runs
//! deterministic and makes look-ahead tests cheap to write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::OrderId;

/// Trade direction of an order or fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// +1 for buys, -1 for sells.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Buy => 1.0,
            Direction::Sell => -1.0,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

/// Directional view a strategy takes on a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalDirection {
    Bullish,
    Bearish,
    Flat,
}

/// Supported order types. Market orders fill at the next base-interval open;
/// market-on-close orders fill at the close of the last interval of the
/// trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    MarketOnClose,
}

/// A new base-interval close has been admitted into the loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketEvent {
    pub timestamp: DateTime<Utc>,
    /// True when this tick is the last interval of its trading day, per the
    /// calendar implied by the data's timestamps.
    pub is_day_close: bool,
}

/// A strategy's directional view, produced on an interval close.
///
/// `target_holding` is filled in by the loop after position sizing; strategies
/// emit direction and strength only.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalEvent {
    pub symbol: String,
    pub direction: SignalDirection,
    pub strength: f64,
    pub target_holding: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// A sized, risk-checked order handed to the execution handler.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderEvent {
    pub id: OrderId,
    pub symbol: String,
    pub order_type: OrderType,
    pub direction: Direction,
    pub quantity: f64,
    /// Cash earmarked while the order is in flight (buys only).
    pub estimated_cost: f64,
    pub timestamp: DateTime<Utc>,
}

/// A simulated execution of an order, in full.
#[derive(Debug, Clone, PartialEq)]
pub struct FillEvent {
    pub order_id: OrderId,
    pub symbol: String,
    pub direction: Direction,
    pub quantity: f64,
    pub fill_price: f64,
    pub commission: f64,
    /// Signed per-share slippage already included in `fill_price`.
    pub slippage: f64,
    pub timestamp: DateTime<Utc>,
}

impl FillEvent {
    /// Signed cash flow of the fill, commission excluded. Positive for buys
    /// (cash out), negative for sells (cash in).
    pub fn cost(&self) -> f64 {
        self.direction.sign() * self.quantity * self.fill_price
    }
}

/// Tagged event variant drained by the loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Market(MarketEvent),
    Signal(SignalEvent),
    Order(OrderEvent),
    Fill(FillEvent),
}
