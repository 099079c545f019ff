//! Crosslab Runner: backtest orchestration, metrics, sweeps, export.
//!
//! This crate builds on `crosslab-core` to provide:
//! - Price loading from CSV or a seeded synthetic walk
//! - TOML run configuration
//! - Single-backtest runner with a bounded live monitor
//! - Performance metrics, drawdown and period-window analysis
//! - Parallel parameter sweeps
//! - JSON / CSV / text artifacts

pub mod config;
pub mod data_loader;
pub mod drawdown;
pub mod export;
pub mod metrics;
pub mod monitor;
pub mod period;
pub mod runner;
pub mod sweep;

pub use config::{
    BacktestConfig, ConfigError, DataConfig, DataSource, PeriodConfig, RunId, ShockConfig,
};
pub use data_loader::{load_bars, LoadError, LoadedData};
pub use drawdown::DrawdownRun;
pub use metrics::{MetricsError, PerformanceMetrics};
pub use monitor::{LatencyStats, RingBuffer, RunMonitor};
pub use period::{analyze_period, PeriodReport};
pub use runner::{
    run_backtest_from_data, run_on_bars, run_single_backtest, BacktestResult, RunError,
};
pub use sweep::{sweep_base, ParamGrid, ParamSweep, SweepResult, SweepResults};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn performance_metrics_is_send_sync() {
        assert_send::<PerformanceMetrics>();
        assert_sync::<PerformanceMetrics>();
    }

    #[test]
    fn backtest_result_is_send_sync() {
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<BacktestConfig>();
        assert_sync::<BacktestConfig>();
        assert_send::<LoadedData>();
        assert_sync::<LoadedData>();
    }

    #[test]
    fn sweep_types_are_send_sync() {
        assert_send::<SweepResult>();
        assert_sync::<SweepResult>();
        assert_send::<ParamSweep>();
        assert_sync::<ParamSweep>();
    }

    #[test]
    fn monitor_and_errors_are_send_sync() {
        assert_send::<RunMonitor>();
        assert_sync::<RunMonitor>();
        assert_send::<RunError>();
        assert_sync::<RunError>();
        assert_send::<PeriodReport>();
        assert_sync::<PeriodReport>();
    }
}
