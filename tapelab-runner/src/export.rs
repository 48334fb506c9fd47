//! Artifact export: equity-curve CSV, trade-log CSV, metrics JSON.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tapelab_core::engine::BacktestResult;

use crate::metrics::PerformanceSummary;

/// Render the equity curve as CSV.
///
/// Columns: timestamp, cash, reserved_cash, margin_locked, position_value,
/// equity.
pub fn equity_csv(result: &BacktestResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "timestamp",
        "cash",
        "reserved_cash",
        "margin_locked",
        "position_value",
        "equity",
    ])?;
    for point in &result.equity_curve {
        wtr.write_record([
            &point.timestamp.to_rfc3339(),
            &format!("{:.6}", point.cash),
            &format!("{:.6}", point.reserved_cash),
            &format!("{:.6}", point.margin_locked),
            &format!("{:.6}", point.position_value),
            &format!("{:.6}", point.equity),
        ])?;
    }
    finish(wtr)
}

/// Render the trade log as CSV, one row per fill or rejection.
pub fn trades_csv(result: &BacktestResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "timestamp",
        "symbol",
        "direction",
        "quantity",
        "price",
        "commission",
        "slippage",
        "order_id",
        "realized_pnl",
        "status",
    ])?;
    for entry in &result.trade_log {
        let status = match entry.rejection {
            Some(reason) => format!("rejected:{reason}"),
            None => "filled".to_string(),
        };
        wtr.write_record([
            &entry.timestamp.to_rfc3339(),
            &entry.symbol,
            &entry.direction.to_string(),
            &format!("{:.6}", entry.quantity),
            &format!("{:.6}", entry.price),
            &format!("{:.6}", entry.commission),
            &format!("{:.6}", entry.slippage),
            &entry.order_id.to_string(),
            &format!("{:.6}", entry.realized_pnl),
            &status,
        ])?;
    }
    finish(wtr)
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Write the full artifact set under `dir`: `equity.csv`, `trades.csv`,
/// `metrics.json`. Returns the written paths.
pub fn save_artifacts(
    dir: &Path,
    result: &BacktestResult,
    summary: &PerformanceSummary,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create artifact dir {}", dir.display()))?;

    let equity_path = dir.join("equity.csv");
    std::fs::write(&equity_path, equity_csv(result)?)?;

    let trades_path = dir.join("trades.csv");
    std::fs::write(&trades_path, trades_csv(result)?)?;

    let metrics_path = dir.join("metrics.json");
    let json =
        serde_json::to_string_pretty(summary).context("failed to serialize metrics summary")?;
    std::fs::write(&metrics_path, json)?;

    Ok(vec![equity_path, trades_path, metrics_path])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tapelab_core::domain::{Direction, OrderId};
    use tapelab_core::engine::TradeLogEntry;
    use tapelab_core::portfolio::EquityPoint;

    fn sample_result() -> BacktestResult {
        BacktestResult {
            initial_capital: 1_000.0,
            equity_curve: vec![EquityPoint {
                timestamp: Utc.timestamp_opt(86_400, 0).unwrap(),
                cash: 495.0,
                reserved_cash: 0.0,
                margin_locked: 0.0,
                position_value: 515.0,
                equity: 1_010.0,
            }],
            trade_log: vec![TradeLogEntry {
                timestamp: Utc.timestamp_opt(86_400, 0).unwrap(),
                symbol: "SPY".into(),
                direction: Direction::Buy,
                quantity: 5.0,
                price: 101.0,
                commission: 1.0,
                slippage: 0.5,
                order_id: OrderId(0),
                realized_pnl: 0.0,
                rejection: None,
            }],
            diagnostics: vec![],
            cancelled: false,
        }
    }

    #[test]
    fn equity_csv_has_ledger_columns() {
        let csv = equity_csv(&sample_result()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "timestamp,cash,reserved_cash,margin_locked,position_value,equity"
        );
        let row = lines.next().unwrap();
        assert!(row.contains("495.000000"));
        assert!(row.contains("1010.000000"));
    }

    #[test]
    fn trades_csv_row_per_fill() {
        let csv = trades_csv(&sample_result()).unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("timestamp,symbol,direction"));
        let row = lines.next().unwrap();
        assert!(row.contains("SPY"));
        assert!(row.contains("BUY"));
        assert!(row.contains("filled"));
    }

    #[test]
    fn artifacts_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let result = sample_result();
        let summary = PerformanceSummary::compute(&result, 252.0);
        let paths = save_artifacts(dir.path(), &result, &summary).unwrap();
        assert_eq!(paths.len(), 3);
        for path in paths {
            assert!(path.exists(), "{} missing", path.display());
        }
    }
}
