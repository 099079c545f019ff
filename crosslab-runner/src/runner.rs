//! Backtest runner: wires together data loading, signals, engine, and metrics.
//!
//! Two entry points:
//! - `run_single_backtest()`: loads data as configured, then runs. Used by CLI.
//! - `run_backtest_from_data()`: takes pre-loaded bars. Used by sweeps and tests.

use std::time::Instant;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crosslab_core::domain::equity::values;
use crosslab_core::domain::{Bar, EquityPoint, Position, TradeRecord};
use crosslab_core::engine::{Engine, EngineError, StrategyConfig};
use crosslab_core::signals::{MaCrossover, SignalSource};

use crate::config::{BacktestConfig, ConfigError, PeriodConfig, RunId};
use crate::data_loader::{load_bars, LoadError, LoadedData};
use crate::drawdown::drawdown_series;
use crate::metrics::{MetricsError, PerformanceMetrics};
use crate::monitor::RunMonitor;
use crate::period::{analyze_period, PeriodReport};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("metrics error: {0}")]
    Metrics(#[from] MetricsError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub config: StrategyConfig,
    pub signal: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bar_count: usize,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub metrics: PerformanceMetrics,
    pub trades: Vec<TradeRecord>,
    pub equity: Vec<EquityPoint>,
    /// Drawdown fraction at every value point.
    pub drawdowns: Vec<f64>,
    /// Position still held after the last bar, marked to market in `equity`.
    pub open_position: Option<Position>,
    #[serde(default)]
    pub periods: Vec<PeriodReport>,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    pub fn final_value(&self) -> Option<f64> {
        self.equity.last().map(|p| p.value)
    }
}

/// Run a single backtest from a BacktestConfig.
///
/// Returns the result together with the monitor that observed the run.
pub fn run_single_backtest(
    config: &BacktestConfig,
) -> Result<(BacktestResult, RunMonitor), RunError> {
    let strategy = config.strategy_config()?;
    let data = load_bars(&config.data)?;
    let source = MaCrossover::new(strategy.short_window, strategy.long_window);
    let mut monitor = RunMonitor::new(config.monitor.capacity);

    let mut result =
        run_backtest_from_data(&strategy, &data, &source, &config.periods, Some(&mut monitor))?;
    // The file config also pins the data source, so it identifies the run.
    result.run_id = config.run_id();
    Ok((result, monitor))
}

/// Run a backtest on pre-loaded data. No I/O.
///
/// The run id defaults to a hash of the strategy config and dataset hash.
pub fn run_backtest_from_data(
    config: &StrategyConfig,
    data: &LoadedData,
    source: &dyn SignalSource,
    periods: &[PeriodConfig],
    mut monitor: Option<&mut RunMonitor>,
) -> Result<BacktestResult, RunError> {
    let bars = &data.bars;
    let (first, last) = match (bars.first(), bars.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(EngineError::EmptySeries.into()),
    };
    let signals = source.generate(bars);
    if signals.len() != bars.len() {
        return Err(EngineError::LengthMismatch {
            bars: bars.len(),
            signals: signals.len(),
        }
        .into());
    }

    let mut engine = Engine::new(config.clone()).map_err(EngineError::from)?;
    let mut trades_reported = 0;
    for (bar, signal) in bars.iter().zip(&signals) {
        let started = Instant::now();
        engine.step(bar, signal)?;
        let latency = started.elapsed();

        if let Some(m) = monitor.as_deref_mut() {
            let state = engine.state();
            if let Some(point) = state.equity.last() {
                m.record_step(*point, latency);
            }
            trades_reported = report_trades(m, &state.trades, trades_reported);
        }
    }
    let output = engine.finish();
    if let Some(m) = monitor.as_deref_mut() {
        report_trades(m, &output.trades, trades_reported);
    }

    let series = values(&output.equity);
    let metrics = PerformanceMetrics::compute(&series, &output.trades, config.initial_capital)?;
    let drawdowns = drawdown_series(&series);
    let periods = periods
        .iter()
        .map(|p| analyze_period(&output.equity, &output.trades, p.start, p.end).with_label(&p.label))
        .collect();

    info!(
        signal = source.name(),
        bars = bars.len(),
        trades = metrics.trade_count,
        total_return = metrics.total_return,
        sharpe = metrics.sharpe,
        "backtest complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id: data_run_id(config, &data.dataset_hash),
        config: config.clone(),
        signal: source.name().to_string(),
        start_date: first.date(),
        end_date: last.date(),
        bar_count: bars.len(),
        dataset_hash: data.dataset_hash.clone(),
        has_synthetic: data.has_synthetic,
        metrics,
        trades: output.trades,
        equity: output.equity,
        drawdowns,
        open_position: output.open_position,
        periods,
    })
}

/// Convenience wrapper for callers holding bare bars.
pub fn run_on_bars(config: &StrategyConfig, bars: Vec<Bar>) -> Result<BacktestResult, RunError> {
    let data = LoadedData {
        dataset_hash: crate::data_loader::compute_dataset_hash(&bars),
        bars,
        has_synthetic: false,
    };
    let source = MaCrossover::new(config.short_window, config.long_window);
    run_backtest_from_data(config, &data, &source, &[], None)
}

fn report_trades(monitor: &mut RunMonitor, trades: &[TradeRecord], already: usize) -> usize {
    for trade in &trades[already.min(trades.len())..] {
        monitor.record_trade(trade.clone());
    }
    trades.len()
}

fn data_run_id(config: &StrategyConfig, dataset_hash: &str) -> RunId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(
        serde_json::to_string(config)
            .unwrap_or_else(|_| format!("{config:?}"))
            .as_bytes(),
    );
    hasher.update(dataset_hash.as_bytes());
    hasher.finalize().to_hex().to_string()
}
