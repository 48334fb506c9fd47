//! End-to-end engine scenarios with literal inputs and hand-computed
//! expectations.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use tapelab_core::config::{BacktestConfig, CommissionConfig, SizerMethod};
use tapelab_core::data::{BarStore, VecSource};
use tapelab_core::domain::{Bar, Direction, Interval, SignalDirection, SignalEvent};
use tapelab_core::engine::{run_with_components, CancelToken};
use tapelab_core::error::EngineError;
use tapelab_core::execution::slippage::{NoSlippage, SlippageModel};
use tapelab_core::execution::{CommissionModel, SimulatedExecutionHandler};
use tapelab_core::risk::RejectionReason;
use tapelab_core::sizers::FixedSizer;
use tapelab_core::strategy::Strategy;

fn ts(day: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(day * 86_400, 0).unwrap()
}

fn daily_bar(symbol: &str, day: i64, open: f64, close: f64, volume: f64) -> Bar {
    let high = open.max(close) + 1.0;
    let low = (open.min(close) - 1.0).max(0.0);
    Bar::new(symbol, Interval::Day1, ts(day), open, high, low, close, volume)
}

fn no_cost_execution() -> SimulatedExecutionHandler {
    SimulatedExecutionHandler::new(
        Interval::Day1,
        CommissionModel::new(CommissionConfig::default()),
        Box::new(NoSlippage),
    )
}

fn base_config(initial: f64) -> BacktestConfig {
    let mut config = BacktestConfig::minimal(Interval::Day1, vec!["SPY".into()], initial);
    config.position_sizer.method = SizerMethod::Fixed;
    config.slippage.slippage_guard = 0.0;
    config.shorting.annual_borrow_rate = 0.0;
    config
}

/// Emits a fixed script of directions, one per interval close.
struct Scripted {
    symbol: String,
    script: Vec<Option<SignalDirection>>,
    step: usize,
}

impl Scripted {
    fn new(symbol: &str, script: Vec<Option<SignalDirection>>) -> Self {
        Self { symbol: symbol.into(), script, step: 0 }
    }
}

impl Strategy for Scripted {
    fn name(&self) -> &str {
        "Scripted"
    }

    fn subscriptions(&self) -> Vec<(String, Interval)> {
        vec![(self.symbol.clone(), Interval::Day1)]
    }

    fn on_interval_close(
        &mut self,
        symbol: &str,
        _interval: Interval,
        bar: &Bar,
        _store: &BarStore,
    ) -> Option<SignalEvent> {
        let direction = self.script.get(self.step).copied().flatten();
        self.step += 1;
        direction.map(|d| SignalEvent {
            symbol: symbol.to_string(),
            direction: d,
            strength: 1.0,
            target_holding: None,
            timestamp: bar.timestamp,
        })
    }
}

// ─── Scenario 1: long buy-and-hold over three daily bars ────────────

#[test]
fn buy_and_hold_equity_sequence() {
    let bars = vec![
        daily_bar("SPY", 1, 100.0, 101.0, 10_000.0),
        daily_bar("SPY", 2, 101.0, 103.0, 10_000.0),
        daily_bar("SPY", 3, 103.0, 102.0, 10_000.0),
    ];
    let mut source = VecSource::new(bars);

    let config = base_config(1_000.0);
    let strategy = Scripted::new("SPY", vec![Some(SignalDirection::Bullish), None, None]);

    let result = run_with_components(
        &mut source,
        vec![Box::new(strategy)],
        Box::new(FixedSizer::with_size(5.0, Interval::Day1)),
        no_cost_execution(),
        &config,
        &CancelToken::new(),
    )
    .unwrap();

    // Decision at bar 1's close fills at bar 2's open (101): bar 1 still
    // marks flat at 1000; bar 2 marks 495 + 5·103; bar 3 marks 495 + 5·102.
    let equity: Vec<f64> = result.equity_curve.iter().map(|p| p.equity).collect();
    assert_eq!(result.initial_capital, 1_000.0);
    assert_eq!(equity, vec![1_000.0, 1_010.0, 1_005.0]);

    let fills: Vec<_> = result.fills().collect();
    assert_eq!(fills.len(), 1);
    assert_eq!(fills[0].price, 101.0);
    assert_eq!(fills[0].quantity, 5.0);
    assert_eq!(fills[0].timestamp, ts(2));
}

// ─── Scenario 2: short-sale margin arithmetic ───────────────────────

#[test]
fn short_sale_margin_math() {
    // All prices pinned at $10. Buy 1 on day 2's open, flip to short 1 on
    // day 3's open (sell 2).
    let bars: Vec<Bar> = (1..=3).map(|d| daily_bar("AAPL", d, 10.0, 10.0, 1_000.0)).collect();
    let mut source = VecSource::new(bars);

    let mut config = base_config(10.0);
    config.symbols = vec!["AAPL".into()];
    let strategy = Scripted::new(
        "AAPL",
        vec![Some(SignalDirection::Bullish), Some(SignalDirection::Bearish), None],
    );

    let result = run_with_components(
        &mut source,
        vec![Box::new(strategy)],
        Box::new(FixedSizer::with_size(1.0, Interval::Day1)),
        no_cost_execution(),
        &config,
        &CancelToken::new(),
    )
    .unwrap();

    let fills: Vec<_> = result.fills().collect();
    assert_eq!(fills.len(), 2);
    assert_eq!(fills[0].direction, Direction::Buy);
    assert_eq!(fills[0].quantity, 1.0);
    assert_eq!(fills[1].direction, Direction::Sell);
    assert_eq!(fills[1].quantity, 2.0);

    // Day 3, after the flip: cash $20, short 1 at $10, margin 1.5 × $10.
    let last = result.equity_curve.last().unwrap();
    assert_eq!(last.cash, 20.0);
    assert_eq!(last.margin_locked, 15.0);
    assert_eq!(last.position_value, -10.0);
    assert_eq!(last.equity, 10.0);
    assert_eq!(last.cash - last.reserved_cash - last.margin_locked, 5.0);
}

// ─── Scenario 3: negative-cash guard fires at the next bar start ────

struct TenPercent;

impl SlippageModel for TenPercent {
    fn estimate(&mut self, _: &str, _: Direction, _: f64, _: &BarStore) -> f64 {
        0.10
    }
    fn name(&self) -> &str {
        "TenPercent"
    }
}

#[test]
fn negative_cash_raises_after_fill_is_booked() {
    // $100 cash; the buy reserves an estimated $90 but slips to $110.
    let bars = vec![
        daily_bar("SPY", 1, 90.0, 90.0, 10_000.0),
        daily_bar("SPY", 2, 100.0, 100.0, 10_000.0),
        daily_bar("SPY", 3, 100.0, 100.0, 10_000.0),
    ];

    let config = base_config(100.0);
    let run = |continue_on_negative: bool| {
        let mut config = config.clone();
        config.continue_on_negative_cash = continue_on_negative;
        let mut source = VecSource::new(bars.clone());
        run_with_components(
            &mut source,
            vec![Box::new(Scripted::new(
                "SPY",
                vec![Some(SignalDirection::Bullish), None, None],
            ))],
            Box::new(FixedSizer::with_size(1.0, Interval::Day1)),
            SimulatedExecutionHandler::new(
                Interval::Day1,
                CommissionModel::new(CommissionConfig::default()),
                Box::new(TenPercent),
            ),
            &config,
            &CancelToken::new(),
        )
    };

    // Fill books at day 2's open for 110; the guard trips at day 2's start.
    let err = run(false).unwrap_err();
    match err {
        EngineError::InsufficientCash { usable, timestamp } => {
            assert_eq!(timestamp, ts(2));
            assert!((usable - (-10.0)).abs() < 1e-9);
        }
        other => panic!("expected InsufficientCash, got {other:?}"),
    }

    // With the continue flag the run completes and surfaces a diagnostic.
    let result = run(true).unwrap();
    assert!(!result.diagnostics.is_empty());
    assert_eq!(result.equity_curve.len(), 3);
}

// ─── Scenario 4: ATR warm-up reuses the initial size ────────────────

#[test]
fn atr_warmup_sizes_with_initial_position_size() {
    // Constant TR = 2.0 bars (high 101, low 99, close 100).
    let bars: Vec<Bar> = (1..=20)
        .map(|d| Bar::new("SPY", Interval::Day1, ts(d), 100.0, 101.0, 99.0, 100.0, 1e6))
        .collect();
    let mut source = VecSource::new(bars);

    let mut config = base_config(100_000.0);
    config.position_sizer.method = SizerMethod::Atr;
    config.position_sizer.period = 14;
    config.position_sizer.atr_multiplier = 2.0;
    config.position_sizer.risk_per_trade = 0.01;
    config.position_sizer.initial_position_size = 10.0;

    let always_long = Scripted::new("SPY", vec![Some(SignalDirection::Bullish); 20]);
    let sizer = tapelab_core::sizers::AtrSizer::new(config.position_sizer.clone(), Interval::Day1);

    let result = run_with_components(
        &mut source,
        vec![Box::new(always_long)],
        Box::new(sizer),
        no_cost_execution(),
        &config,
        &CancelToken::new(),
    )
    .unwrap();

    let fills: Vec<_> = result.fills().collect();
    // Warm-up: first signal sized at the configured initial 10 shares.
    assert_eq!(fills[0].quantity, 10.0);
    // Post warm-up (bar 14 onwards): ATR = 2.0 exactly, so the target is
    // 1% · 100k / (2 · 2.0) = 250 shares → a 240-share top-up.
    assert!(
        fills.iter().any(|f| f.quantity == 240.0),
        "expected a 240-share top-up after ATR warm-up, fills: {:?}",
        fills.iter().map(|f| f.quantity).collect::<Vec<_>>()
    );
}

// ─── Scenario 5: POV rejection leaves the portfolio untouched ───────

#[test]
fn pov_rejection_is_logged_and_state_unchanged() {
    let bars: Vec<Bar> = (1..=3).map(|d| daily_bar("SPY", d, 100.0, 100.0, 1_000.0)).collect();
    let mut source = VecSource::new(bars);

    let mut config = base_config(1_000_000.0);
    config.risk.pov_cap = 0.1;

    let result = run_with_components(
        &mut source,
        vec![Box::new(Scripted::new(
            "SPY",
            vec![Some(SignalDirection::Bullish), None, None],
        ))],
        Box::new(FixedSizer::with_size(200.0, Interval::Day1)),
        no_cost_execution(),
        &config,
        &CancelToken::new(),
    )
    .unwrap();

    // 200 shares against 1000 volume breaches the 10% cap.
    let rejections: Vec<_> = result
        .trade_log
        .iter()
        .filter(|t| t.rejection.is_some())
        .collect();
    assert_eq!(rejections.len(), 1);
    assert_eq!(rejections[0].rejection, Some(RejectionReason::PovExceeded));
    assert_eq!(rejections[0].quantity, 200.0);

    assert_eq!(result.fills().count(), 0);
    for point in &result.equity_curve {
        assert_eq!(point.equity, 1_000_000.0);
        assert_eq!(point.reserved_cash, 0.0);
    }
}

// ─── Scenario 6: dual-frequency subscription ────────────────────────

#[derive(Clone)]
struct Recording {
    symbol: String,
    interval: Interval,
    closes: Arc<Mutex<Vec<Bar>>>,
}

impl Strategy for Recording {
    fn name(&self) -> &str {
        "Recording"
    }

    fn subscriptions(&self) -> Vec<(String, Interval)> {
        vec![(self.symbol.clone(), self.interval)]
    }

    fn on_interval_close(
        &mut self,
        _symbol: &str,
        _interval: Interval,
        bar: &Bar,
        _store: &BarStore,
    ) -> Option<SignalEvent> {
        self.closes.lock().unwrap().push(bar.clone());
        None
    }
}

#[test]
fn five_minute_subscription_from_one_minute_base() {
    let bars: Vec<Bar> = (1..=10)
        .map(|m| {
            Bar::new(
                "SPY",
                Interval::Min1,
                Utc.timestamp_opt(m * 60, 0).unwrap(),
                100.0 + m as f64,
                101.0 + m as f64,
                99.0 + m as f64,
                100.0 + m as f64,
                7.0,
            )
        })
        .collect();
    let mut source = VecSource::new(bars);

    let mut config = BacktestConfig::minimal(Interval::Min1, vec!["SPY".into()], 100_000.0);
    config.position_sizer.method = SizerMethod::Fixed;

    let closes = Arc::new(Mutex::new(Vec::new()));
    let strategy = Recording {
        symbol: "SPY".into(),
        interval: Interval::Min5,
        closes: Arc::clone(&closes),
    };

    run_with_components(
        &mut source,
        vec![Box::new(strategy)],
        Box::new(FixedSizer::with_size(1.0, Interval::Min1)),
        SimulatedExecutionHandler::new(
            Interval::Min1,
            CommissionModel::new(CommissionConfig::default()),
            Box::new(NoSlippage),
        ),
        &config,
        &CancelToken::new(),
    )
    .unwrap();

    let closes = closes.lock().unwrap();
    assert_eq!(closes.len(), 2, "exactly two 5m closes over 10 one-minute bars");

    assert_eq!(closes[0].timestamp, Utc.timestamp_opt(300, 0).unwrap());
    assert_eq!(closes[0].high, 106.0); // max of minutes 1..=5
    assert_eq!(closes[0].low, 100.0); // min of minutes 1..=5
    assert_eq!(closes[0].volume, 35.0);

    assert_eq!(closes[1].timestamp, Utc.timestamp_opt(600, 0).unwrap());
    assert_eq!(closes[1].high, 111.0);
    assert_eq!(closes[1].low, 105.0);
    assert_eq!(closes[1].volume, 35.0);
}

// ─── Cancellation finishes the current tick and returns ─────────────

#[test]
fn cancellation_returns_partial_curve() {
    let bars: Vec<Bar> = (1..=50).map(|d| daily_bar("SPY", d, 100.0, 100.0, 1_000.0)).collect();
    let mut source = VecSource::new(bars);

    let config = base_config(1_000.0);
    let cancel = CancelToken::new();
    cancel.cancel();

    let result = run_with_components(
        &mut source,
        vec![],
        Box::new(FixedSizer::with_size(1.0, Interval::Day1)),
        no_cost_execution(),
        &config,
        &cancel,
    )
    .unwrap();

    assert!(result.cancelled);
    assert_eq!(result.equity_curve.len(), 1, "finishes exactly the current tick");
}

// ─── Data gaps abort the run ────────────────────────────────────────

#[test]
fn decreasing_timestamps_are_fatal() {
    let bars = vec![
        daily_bar("SPY", 2, 100.0, 100.0, 1_000.0),
        daily_bar("SPY", 1, 100.0, 100.0, 1_000.0),
    ];
    let mut source = VecSource::new(bars);
    let config = base_config(1_000.0);

    let err = run_with_components(
        &mut source,
        vec![],
        Box::new(FixedSizer::with_size(1.0, Interval::Day1)),
        no_cost_execution(),
        &config,
        &CancelToken::new(),
    )
    .unwrap_err();
    assert!(matches!(err, EngineError::DataGap { .. }));
}

#[test]
fn missing_intraday_bar_is_fatal() {
    let minute = |m: i64| {
        Bar::new(
            "SPY",
            Interval::Min1,
            Utc.timestamp_opt(m * 60, 0).unwrap(),
            100.0,
            100.0,
            100.0,
            100.0,
            1_000.0,
        )
    };
    // Minute 3 is missing.
    let bars = vec![minute(1), minute(2), minute(4)];
    let mut source = VecSource::new(bars);

    let mut config = BacktestConfig::minimal(Interval::Min1, vec!["SPY".into()], 1_000.0);
    config.position_sizer.method = SizerMethod::Fixed;

    let err = run_with_components(
        &mut source,
        vec![],
        Box::new(FixedSizer::with_size(1.0, Interval::Min1)),
        SimulatedExecutionHandler::new(
            Interval::Min1,
            CommissionModel::new(CommissionConfig::default()),
            Box::new(NoSlippage),
        ),
        &config,
        &CancelToken::new(),
    )
    .unwrap_err();
    assert!(matches!(err, EngineError::DataGap { .. }));
}
