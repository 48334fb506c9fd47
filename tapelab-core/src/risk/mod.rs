//! Pre-trade risk checks.
//!
//! Checks run in a fixed order and the first failure rejects the order.
//! Each cap is disabled by configuring `-1`. A rejection is an expected
//! control-flow outcome, not an error: it is recorded in the trade log and
//! leaves portfolio state untouched.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{RiskConfig, DISABLED};
use crate::data::BarStore;
use crate::domain::{Direction, Interval, OrderEvent};
use crate::portfolio::Portfolio;

/// Why an order was rejected, in check order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    MaxQtyExceeded,
    MaxNotionalExceeded,
    DrawdownLockout,
    GrossExposureExceeded,
    NetExposureExceeded,
    PovExceeded,
    RateLimitExceeded,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectionReason::MaxQtyExceeded => "max_qty_exceeded",
            RejectionReason::MaxNotionalExceeded => "max_notional_exceeded",
            RejectionReason::DrawdownLockout => "drawdown_lockout",
            RejectionReason::GrossExposureExceeded => "gross_exposure_exceeded",
            RejectionReason::NetExposureExceeded => "net_exposure_exceeded",
            RejectionReason::PovExceeded => "pov_exceeded",
            RejectionReason::RateLimitExceeded => "rate_limit_exceeded",
        };
        write!(f, "{s}")
    }
}

pub struct RiskManager {
    config: RiskConfig,
    base_interval: Interval,
    /// Timestamps of accepted orders inside the sliding rate window.
    accepted: VecDeque<DateTime<Utc>>,
    current_day: Option<NaiveDate>,
    day_start_equity: f64,
}

impl RiskManager {
    pub fn new(config: RiskConfig, base_interval: Interval) -> Self {
        Self {
            config,
            base_interval,
            accepted: VecDeque::new(),
            current_day: None,
            day_start_equity: 0.0,
        }
    }

    /// Roll the daily-drawdown anchor at the first tick of each trading day.
    pub fn on_tick(&mut self, timestamp: DateTime<Utc>, equity: f64) {
        let day = timestamp.date_naive();
        if self.current_day != Some(day) {
            self.current_day = Some(day);
            self.day_start_equity = equity;
        }
    }

    /// Run all enabled checks; `Ok` marks the order accepted (and counted
    /// against the rate window).
    pub fn review(
        &mut self,
        order: &OrderEvent,
        portfolio: &Portfolio,
        store: &BarStore,
        equity: f64,
    ) -> Result<(), RejectionReason> {
        let last_bar = store.latest(&order.symbol, self.base_interval);
        let last_close = last_bar.map_or(0.0, |b| b.close);
        let order_notional = order.quantity * last_close;

        if enabled(self.config.max_order_quantity) && order.quantity > self.config.max_order_quantity
        {
            return Err(RejectionReason::MaxQtyExceeded);
        }

        if enabled(self.config.max_notional) && order_notional > self.config.max_notional {
            return Err(RejectionReason::MaxNotionalExceeded);
        }

        if enabled(self.config.max_daily_drawdown) && self.day_start_equity > 0.0 {
            let decline = (self.day_start_equity - equity) / self.day_start_equity;
            if decline >= self.config.max_daily_drawdown && !self.is_reducing(order, portfolio) {
                return Err(RejectionReason::DrawdownLockout);
            }
        }

        if enabled(self.config.max_gross_exposure) && equity > 0.0 {
            let gross: f64 = portfolio
                .positions()
                .map(|p| {
                    let close = store
                        .latest(&p.symbol, self.base_interval)
                        .map_or(p.avg_cost, |b| b.close);
                    (p.quantity * close).abs()
                })
                .sum::<f64>()
                + order_notional;
            if gross / equity > self.config.max_gross_exposure {
                return Err(RejectionReason::GrossExposureExceeded);
            }
        }

        if enabled(self.config.max_net_exposure) && equity > 0.0 {
            let net: f64 = portfolio
                .positions()
                .map(|p| {
                    let close = store
                        .latest(&p.symbol, self.base_interval)
                        .map_or(p.avg_cost, |b| b.close);
                    p.quantity * close
                })
                .sum::<f64>()
                + order.direction.sign() * order_notional;
            if (net / equity).abs() > self.config.max_net_exposure {
                return Err(RejectionReason::NetExposureExceeded);
            }
        }

        if enabled(self.config.pov_cap) {
            let last_volume = last_bar.map_or(0.0, |b| b.volume);
            if last_volume <= 0.0 || order.quantity / last_volume > self.config.pov_cap {
                return Err(RejectionReason::PovExceeded);
            }
        }

        if enabled(self.config.max_order_rate) {
            let window_start =
                order.timestamp - chrono::Duration::seconds(self.config.order_rate_window_secs);
            while let Some(front) = self.accepted.front() {
                if *front <= window_start {
                    self.accepted.pop_front();
                } else {
                    break;
                }
            }
            if self.accepted.len() as f64 >= self.config.max_order_rate {
                return Err(RejectionReason::RateLimitExceeded);
            }
        }

        self.accepted.push_back(order.timestamp);
        Ok(())
    }

    /// An order is reducing when it shrinks the absolute holding without
    /// flipping its sign.
    fn is_reducing(&self, order: &OrderEvent, portfolio: &Portfolio) -> bool {
        let current = portfolio.signed_quantity(&order.symbol);
        match order.direction {
            Direction::Sell => current > 0.0 && order.quantity <= current,
            Direction::Buy => current < 0.0 && order.quantity <= current.abs(),
        }
    }
}

fn enabled(cap: f64) -> bool {
    cap != DISABLED
}
