//! Artifact and period-analysis tests against a full synthetic run.

use chrono::NaiveDate;
use crosslab_runner::config::BacktestConfig;
use crosslab_runner::export::{
    load_artifacts, save_artifacts, EQUITY_FILE, SUMMARY_FILE, TRADES_FILE,
};
use crosslab_runner::period::analyze_period;
use crosslab_runner::runner::run_single_backtest;

const CONFIG: &str = r#"
[data]
start_date = "2019-06-01"
end_date = "2021-06-01"

[strategy]
short_window = 10
long_window = 30
initial_capital = 25000.0

[[periods]]
label = "h2-2020"
start = "2020-07-01"
end = "2020-12-31"
"#;

#[test]
fn artifacts_round_trip_through_disk() {
    let config = BacktestConfig::from_toml_str(CONFIG).unwrap();
    let (result, _) = run_single_backtest(&config).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let out = save_artifacts(&result, dir.path()).unwrap();

    let trades = std::fs::read_to_string(out.join(TRADES_FILE)).unwrap();
    assert_eq!(trades.lines().count(), result.trades.len() + 1);

    let equity = std::fs::read_to_string(out.join(EQUITY_FILE)).unwrap();
    assert_eq!(equity.lines().count(), result.equity.len() + 1);

    let summary = std::fs::read_to_string(out.join(SUMMARY_FILE)).unwrap();
    assert!(summary.contains("Period Analysis:"));
    assert!(summary.contains("h2-2020 (2020-07-01 to 2020-12-31)"));

    let loaded = load_artifacts(&out).unwrap();
    assert_eq!(loaded.run_id, result.run_id);
    assert_eq!(loaded.bar_count, result.bar_count);
    assert_eq!(loaded.trades.len(), result.trades.len());
    assert_eq!(loaded.periods.len(), 1);
}

#[test]
fn configured_period_matches_direct_analysis() {
    let config = BacktestConfig::from_toml_str(CONFIG).unwrap();
    let (result, _) = run_single_backtest(&config).unwrap();

    let start = NaiveDate::from_ymd_opt(2020, 7, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2020, 12, 31).unwrap();
    let direct = analyze_period(&result.equity, &result.trades, start, end);

    assert_eq!(result.periods[0].period_return, direct.period_return);
    assert_eq!(result.periods[0].trade_count, direct.trade_count);
    assert_eq!(result.periods[0].win_rate, direct.win_rate);

    // Window trades never straddle the boundaries.
    let inside = result
        .trades
        .iter()
        .filter(|t| t.entry_timestamp.date() >= start && t.exit_timestamp.date() <= end)
        .count();
    assert_eq!(direct.trade_count, inside);
}
