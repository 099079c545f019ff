//! Reporting and export: JSON, CSV, and plain-text artifact generation.
//!
//! Provides these export formats for backtest results:
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: trade log, value series and sweep table for external tools
//! - **Text**: human-readable summary report
//!
//! Persisted results include a `schema_version` field. Newer versions are
//! rejected on load.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use crosslab_core::domain::{EquityPoint, TradeRecord};

use crate::runner::{BacktestResult, SCHEMA_VERSION};
use crate::sweep::SweepResult;

pub const TRADES_FILE: &str = "trades.csv";
pub const EQUITY_FILE: &str = "equity.csv";
pub const RESULT_FILE: &str = "result.json";
pub const SUMMARY_FILE: &str = "summary_report.txt";

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export the trade log as CSV, one row per closed trade.
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "entry_index",
        "entry_timestamp",
        "entry_price",
        "exit_index",
        "exit_timestamp",
        "exit_price",
        "shares",
        "pnl",
        "pnl_pct",
        "bars_held",
        "exit_reason",
    ])?;

    for t in trades {
        wtr.write_record([
            &t.entry_index.to_string(),
            &t.entry_timestamp.to_string(),
            &format!("{:.6}", t.entry_price),
            &t.exit_index.to_string(),
            &t.exit_timestamp.to_string(),
            &format!("{:.6}", t.exit_price),
            &t.shares.to_string(),
            &format!("{:.2}", t.pnl),
            &format!("{:.6}", t.pnl_pct),
            &t.bars_held().to_string(),
            t.exit_reason.as_str(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export the value series with its drawdown column.
///
/// `drawdowns` must line up with `equity`; missing entries are written as 0.
pub fn export_equity_csv(equity: &[EquityPoint], drawdowns: &[f64]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "value", "drawdown"])?;

    for (i, point) in equity.iter().enumerate() {
        let dd = drawdowns.get(i).copied().unwrap_or(0.0);
        wtr.write_record([
            &point.timestamp.to_string(),
            &format!("{:.2}", point.value),
            &format!("{:.6}", dd),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export ranked sweep results.
pub fn export_sweep_csv(results: &[SweepResult]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "rank",
        "short_window",
        "long_window",
        "stop_loss_pct",
        "take_profit_pct",
        "total_return",
        "sharpe",
        "max_drawdown",
        "trade_count",
        "win_rate",
    ])?;

    for (i, r) in results.iter().enumerate() {
        let m = &r.metrics;
        wtr.write_record([
            &(i + 1).to_string(),
            &r.short_window.to_string(),
            &r.long_window.to_string(),
            &format!("{:.4}", r.stop_loss_pct),
            &format!("{:.4}", r.take_profit_pct),
            &format!("{:.6}", m.total_return),
            &format!("{:.4}", m.sharpe),
            &format!("{:.6}", m.max_drawdown),
            &m.trade_count.to_string(),
            &format!("{:.4}", m.win_rate),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Text report ────────────────────────────────────────────────────

/// Plain-text summary: parameters, metrics, period analyses, trade summary.
pub fn summary_report(result: &BacktestResult) -> String {
    let mut out = String::new();
    let c = &result.config;
    let m = &result.metrics;

    // Writing into a String cannot fail.
    let _ = writeln!(out, "Backtest Summary Report");
    let _ = writeln!(out, "=======================");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Data: {} to {} ({} bars{})",
        result.start_date,
        result.end_date,
        result.bar_count,
        if result.has_synthetic { ", synthetic" } else { "" }
    );
    let _ = writeln!(out, "Run ID: {}", result.run_id);
    let _ = writeln!(out);

    let _ = writeln!(out, "Strategy Parameters:");
    let _ = writeln!(out, "  Signal: {}", result.signal);
    let _ = writeln!(out, "  Short Window: {}", c.short_window);
    let _ = writeln!(out, "  Long Window: {}", c.long_window);
    let _ = writeln!(out, "  Initial Capital: ${:.2}", c.initial_capital);
    let _ = writeln!(out, "  Stop Loss: {:.2}%", c.stop_loss_pct * 100.0);
    let _ = writeln!(out, "  Take Profit: {:.2}%", c.take_profit_pct * 100.0);
    let _ = writeln!(out, "  Position Size: {:.2}%", c.position_size_pct * 100.0);
    if c.use_trailing_stop {
        let _ = writeln!(
            out,
            "  Trailing Stop: activation {:.2}%, distance {:.2}%",
            c.trailing_stop_activation_pct * 100.0,
            c.trailing_stop_distance_pct * 100.0
        );
    } else {
        let _ = writeln!(out, "  Trailing Stop: off");
    }
    let _ = writeln!(out, "  Mode: {:?}", c.mode);
    let _ = writeln!(out, "  Max Hold Days: {}", c.max_hold_days);
    let _ = writeln!(out);

    let _ = writeln!(out, "Performance Metrics:");
    for (name, value) in m.summary_rows() {
        let _ = writeln!(out, "  {name}: {value:.2}");
    }
    let _ = writeln!(out);

    if !result.periods.is_empty() {
        let _ = writeln!(out, "Period Analysis:");
        for p in &result.periods {
            let _ = writeln!(out, "  {} ({}):", p.label, p.period);
            let _ = writeln!(out, "    Return: {:.2}%", p.period_return * 100.0);
            let _ = writeln!(out, "    Trades: {}", p.trade_count);
            let _ = writeln!(out, "    Win Rate: {:.2}%", p.win_rate * 100.0);
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "Trade Summary:");
    if result.trades.is_empty() {
        let _ = writeln!(out, "  No trades were executed during the backtest period.");
    } else {
        let winners = result.trades.iter().filter(|t| t.is_winner()).count();
        let losers = result.trades.iter().filter(|t| t.is_loser()).count();
        let _ = writeln!(out, "  Total Trades: {}", result.trades.len());
        let _ = writeln!(
            out,
            "  Winning Trades: {} ({:.2}%)",
            winners,
            m.win_rate * 100.0
        );
        let _ = writeln!(out, "  Losing Trades: {losers}");
        let _ = writeln!(out, "  Average Win: ${:.2}", m.avg_win);
        let _ = writeln!(out, "  Average Loss: ${:.2}", m.avg_loss);
        let _ = writeln!(out, "  Profit Factor: {:.2}", m.profit_factor);
        let _ = writeln!(out, "  Exit Reasons:");
        for (reason, count) in &m.exit_reason_counts {
            let _ = writeln!(out, "    {reason}: {count}");
        }
    }

    if let Some(pos) = &result.open_position {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Open Position: {} shares @ ${:.2} since {}",
            pos.shares, pos.entry_price, pos.entry_timestamp
        );
    }

    out
}

// ─── Artifacts ──────────────────────────────────────────────────────

/// Write `trades.csv`, `equity.csv`, `result.json` and `summary_report.txt`
/// into `output_dir`, creating it if needed. Returns the directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create artifact dir: {}", output_dir.display()))?;

    let write = |name: &str, contents: &str| -> Result<()> {
        let path = output_dir.join(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))
    };

    write(RESULT_FILE, &export_json(result)?)?;
    write(TRADES_FILE, &export_trades_csv(&result.trades)?)?;
    write(
        EQUITY_FILE,
        &export_equity_csv(&result.equity, &result.drawdowns)?,
    )?;
    write(SUMMARY_FILE, &summary_report(result))?;

    Ok(output_dir.to_path_buf())
}

/// Load a previously saved result from an artifact directory.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let path = dir.join(RESULT_FILE);
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::run_on_bars;
    use chrono::NaiveDate;
    use crosslab_core::domain::Bar;
    use crosslab_core::engine::StrategyConfig;

    fn sample_result() -> BacktestResult {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let prices = [
            100.0, 99.0, 98.0, 97.0, 99.0, 103.0, 108.0, 112.0, 115.0, 110.0, 104.0, 99.0, 95.0,
        ];
        let bars = prices
            .iter()
            .enumerate()
            .map(|(i, &p)| Bar::daily(base + chrono::Duration::days(i as i64), p))
            .collect();
        let config = StrategyConfig::new(2, 4, 10_000.0).unwrap();
        run_on_bars(&config, bars).unwrap()
    }

    #[test]
    fn json_round_trip_preserves_result() {
        let result = sample_result();
        let json = export_json(&result).unwrap();
        let back = import_json(&json).unwrap();
        assert_eq!(back.run_id, result.run_id);
        assert_eq!(back.trades.len(), result.trades.len());
        assert_eq!(back.equity.len(), result.equity.len());
        assert_eq!(back.config, result.config);
    }

    #[test]
    fn import_rejects_newer_schema() {
        let mut result = sample_result();
        result.schema_version = SCHEMA_VERSION + 1;
        let json = serde_json::to_string(&result).unwrap();
        let err = import_json(&json).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version"));
    }

    #[test]
    fn trades_csv_has_one_row_per_trade() {
        let result = sample_result();
        let csv = export_trades_csv(&result.trades).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert!(lines[0].starts_with("entry_index,entry_timestamp"));
        assert_eq!(lines.len(), result.trades.len() + 1);
    }

    #[test]
    fn equity_csv_matches_series() {
        let result = sample_result();
        let csv = export_equity_csv(&result.equity, &result.drawdowns).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "timestamp,value,drawdown");
        assert_eq!(lines.len(), result.equity.len() + 1);
        assert!(lines[1].starts_with("2024-01-01 00:00:00,10000.00,"));
    }

    #[test]
    fn summary_report_sections() {
        let result = sample_result();
        let report = summary_report(&result);
        assert!(report.contains("Strategy Parameters:"));
        assert!(report.contains("Total Return (%):"));
        assert!(report.contains("Max Drawdown Duration (Bars):"));
        assert!(report.contains("Trade Summary:"));
    }

    #[test]
    fn summary_report_without_trades() {
        let mut result = sample_result();
        result.trades.clear();
        let report = summary_report(&result);
        assert!(report.contains("No trades were executed during the backtest period."));
        assert!(!report.contains("Exit Reasons:"));
    }

    #[test]
    fn save_and_load_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("run");
        let result = sample_result();

        let written = save_artifacts(&result, &out).unwrap();
        assert_eq!(written, out);
        for name in [TRADES_FILE, EQUITY_FILE, RESULT_FILE, SUMMARY_FILE] {
            assert!(out.join(name).exists(), "{name} missing");
        }
        let loaded = load_artifacts(&out).unwrap();
        assert_eq!(loaded.trades.len(), result.trades.len());
        assert_eq!(loaded.metrics.trade_count, result.metrics.trade_count);
    }
}
