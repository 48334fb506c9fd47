//! Property tests for portfolio accounting invariants.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use tapelab_core::config::BacktestConfig;
use tapelab_core::data::BarStore;
use tapelab_core::domain::{
    Bar, Direction, FillEvent, Interval, OrderId, OrderType, SignalDirection, SignalEvent,
};
use tapelab_core::portfolio::Portfolio;

fn ts(day: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(day * 86_400, 0).unwrap()
}

fn config(initial: f64) -> BacktestConfig {
    let mut config = BacktestConfig::minimal(Interval::Day1, vec!["SPY".into()], initial);
    config.shorting.annual_borrow_rate = 0.0;
    config
}

fn arb_fill() -> impl Strategy<Value = (Direction, f64, f64, f64)> {
    (prop::bool::ANY, 1.0..100.0_f64, 10.0..200.0_f64, 0.0..5.0_f64).prop_map(
        |(buy, qty, price, commission)| {
            let direction = if buy { Direction::Buy } else { Direction::Sell };
            (
                direction,
                (qty * 100.0).round() / 100.0,
                (price * 100.0).round() / 100.0,
                commission,
            )
        },
    )
}

proptest! {
    /// Conservation: after any fill sequence,
    /// equity = initial + realized + unrealized - commissions - borrow.
    #[test]
    fn equity_conservation(fills in prop::collection::vec(arb_fill(), 1..40)) {
        let initial = 1_000_000.0;
        let mut portfolio = Portfolio::new(&config(initial));
        let mut store = BarStore::new();
        let mut last_price = 100.0;

        for (i, (direction, qty, price, commission)) in fills.iter().enumerate() {
            portfolio.on_fill(&FillEvent {
                order_id: OrderId(i as u64),
                symbol: "SPY".into(),
                direction: *direction,
                quantity: *qty,
                fill_price: *price,
                commission: *commission,
                slippage: 0.0,
                timestamp: ts(i as i64 + 1),
            });
            last_price = *price;
        }

        store.append(Bar::new(
            "SPY",
            Interval::Day1,
            ts(fills.len() as i64 + 1),
            last_price,
            last_price,
            last_price,
            last_price,
            1_000.0,
        )).unwrap();

        let equity = portfolio.mark_to_market(ts(fills.len() as i64 + 1), &store).equity;
        let unrealized: f64 = portfolio
            .positions()
            .map(|p| p.quantity * (last_price - p.avg_cost))
            .sum();
        let expected = initial + portfolio.realized_pnl() + unrealized
            - portfolio.commissions_paid()
            - portfolio.borrow_costs_paid();

        prop_assert!(
            (equity - expected).abs() < 1e-6 * initial.max(equity.abs()),
            "equity {equity} != conserved {expected}"
        );
    }

    /// Reservation soundness: reserved cash always equals the sum of
    /// estimated costs over in-flight buy orders.
    #[test]
    fn reservation_soundness(
        closes in prop::collection::vec(10.0..200.0_f64, 1..20),
        fill_mask in prop::collection::vec(prop::bool::ANY, 1..20),
    ) {
        let mut portfolio = Portfolio::new(&config(1e9));
        let mut open_orders = Vec::new();
        let mut expected_reserved = 0.0;

        for (i, close) in closes.iter().enumerate() {
            let signal = SignalEvent {
                symbol: "SPY".into(),
                direction: SignalDirection::Bullish,
                strength: 1.0,
                target_holding: None,
                timestamp: ts(i as i64 + 1),
            };
            // Walk the target up so every signal produces a buy.
            let target = (i as f64 + 1.0) * 10.0 + portfolio.signed_quantity("SPY").max(0.0);
            if let Some(order) = portfolio.build_order(
                &signal,
                target,
                *close,
                OrderId(i as u64),
                OrderType::Market,
            ) {
                expected_reserved += order.estimated_cost;
                portfolio.reserve(&order);
                open_orders.push(order);
            }
        }

        prop_assert!((portfolio.reserved_cash() - expected_reserved).abs() < 1e-9);
        prop_assert!((portfolio.in_flight_reserved() - expected_reserved).abs() < 1e-9);

        // Fill a subset; each fill releases exactly its whole reservation.
        for (order, fill_it) in open_orders.iter().zip(fill_mask.iter()) {
            if !*fill_it {
                continue;
            }
            portfolio.on_fill(&FillEvent {
                order_id: order.id,
                symbol: order.symbol.clone(),
                direction: order.direction,
                quantity: order.quantity,
                fill_price: 50.0,
                commission: 0.0,
                slippage: 0.0,
                timestamp: ts(40),
            });
            expected_reserved -= order.estimated_cost;
        }

        prop_assert!((portfolio.reserved_cash() - expected_reserved).abs() < 1e-9);
        prop_assert!((portfolio.in_flight_reserved() - expected_reserved).abs() < 1e-9);
    }

    /// Weighted-average cost never leaves the [min, max] fill-price band
    /// while adding to one side.
    #[test]
    fn avg_cost_stays_in_price_band(prices in prop::collection::vec(10.0..200.0_f64, 1..30)) {
        let mut portfolio = Portfolio::new(&config(1e9));
        for (i, price) in prices.iter().enumerate() {
            portfolio.on_fill(&FillEvent {
                order_id: OrderId(i as u64),
                symbol: "SPY".into(),
                direction: Direction::Buy,
                quantity: 10.0,
                fill_price: *price,
                commission: 0.0,
                slippage: 0.0,
                timestamp: ts(i as i64 + 1),
            });
        }
        let position = portfolio.position("SPY").unwrap();
        let min = prices.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = prices.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(position.avg_cost >= min - 1e-9 && position.avg_cost <= max + 1e-9);
    }
}
