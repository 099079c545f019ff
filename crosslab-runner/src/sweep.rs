//! Parameter sweep over MA windows and stop-loss levels.
//!
//! Every grid point is an independent engine run over the same bars, so the
//! sweep fans out over a rayon pool. Results are ranked by Sharpe ratio.

use std::cmp::Ordering;

use anyhow::{ensure, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crosslab_core::engine::{ConfigError, StrategyConfig, TradingMode};
use crosslab_core::signals::MaCrossover;

use crate::data_loader::LoadedData;
use crate::metrics::PerformanceMetrics;
use crate::runner::run_backtest_from_data;

/// Take-profit is set to this multiple of the stop-loss at every grid point.
pub const TAKE_PROFIT_MULTIPLE: f64 = 2.0;

/// Parameter grid specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub short_windows: Vec<usize>,
    pub long_windows: Vec<usize>,
    pub stop_losses: Vec<f64>,
}

impl Default for ParamGrid {
    /// Short 5..=30 step 5, long {35, 40, 50, 60, 80, 100}, stop 2% to 10%.
    fn default() -> Self {
        Self {
            short_windows: vec![5, 10, 15, 20, 25, 30],
            long_windows: vec![35, 40, 50, 60, 80, 100],
            stop_losses: vec![0.02, 0.03, 0.05, 0.07, 0.10],
        }
    }
}

impl ParamGrid {
    /// Raw grid size, including combinations that will be skipped.
    pub fn size(&self) -> usize {
        self.short_windows.len() * self.long_windows.len() * self.stop_losses.len()
    }

    /// Every valid configuration in the grid, derived from `base`.
    ///
    /// Combinations with `short >= long` are skipped, as are any that fail
    /// validation.
    pub fn generate_configs(&self, base: &StrategyConfig) -> Vec<StrategyConfig> {
        let mut configs = Vec::new();

        for &short in &self.short_windows {
            for &long in &self.long_windows {
                if short >= long {
                    continue;
                }
                for &stop in &self.stop_losses {
                    let config = StrategyConfig {
                        short_window: short,
                        long_window: long,
                        ..base.clone()
                    }
                    .with_stops(stop, stop * TAKE_PROFIT_MULTIPLE);

                    match config.validate() {
                        Ok(()) => configs.push(config),
                        Err(e) => warn!(short, long, stop, error = %e, "skipping grid point"),
                    }
                }
            }
        }

        configs
    }
}

/// Base configuration for sweeps: 20% sizing on 10 000 capital, trailing
/// stop armed at +6% and trailing 4%, swing mode.
pub fn sweep_base(max_hold_days: u32) -> Result<StrategyConfig, ConfigError> {
    let base = StrategyConfig::new(10, 50, 10_000.0)?
        .with_position_size(0.2)
        .with_trailing_stop(0.06, 0.04)
        .with_mode(TradingMode::Swing)
        .with_max_hold_days(max_hold_days);
    base.validate()?;
    Ok(base)
}

/// One grid point's outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    pub short_window: usize,
    pub long_window: usize,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub metrics: PerformanceMetrics,
}

impl SweepResult {
    /// Rebuild the strategy config this result was produced with.
    pub fn to_config(&self, base: &StrategyConfig) -> StrategyConfig {
        StrategyConfig {
            short_window: self.short_window,
            long_window: self.long_window,
            ..base.clone()
        }
        .with_stops(self.stop_loss_pct, self.take_profit_pct)
    }

    fn key(&self) -> (usize, usize, f64) {
        (self.short_window, self.long_window, self.stop_loss_pct)
    }
}

/// Ranked sweep output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepResults {
    /// Best first.
    pub results: Vec<SweepResult>,
    /// Grid points whose run failed.
    pub failed: usize,
}

impl SweepResults {
    pub fn best(&self) -> Option<&SweepResult> {
        self.results.first()
    }

    pub fn top(&self, n: usize) -> &[SweepResult] {
        &self.results[..n.min(self.results.len())]
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Parameter sweep executor.
#[derive(Debug, Clone)]
pub struct ParamSweep {
    parallel: bool,
}

impl Default for ParamSweep {
    fn default() -> Self {
        Self::new()
    }
}

impl ParamSweep {
    pub fn new() -> Self {
        Self { parallel: true }
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Run every grid point over `data`.
    ///
    /// A failed run is logged and skipped. Fails only when the grid has no
    /// valid combination at all.
    pub fn sweep(
        &self,
        grid: &ParamGrid,
        base: &StrategyConfig,
        data: &LoadedData,
    ) -> Result<SweepResults> {
        let configs = grid.generate_configs(base);
        ensure!(
            !configs.is_empty(),
            "parameter grid has no valid combinations"
        );
        info!(
            combinations = configs.len(),
            parallel = self.parallel,
            "starting sweep"
        );

        let outcomes: Vec<Option<SweepResult>> = if self.parallel {
            configs.par_iter().map(|c| run_point(c, data)).collect()
        } else {
            configs.iter().map(|c| run_point(c, data)).collect()
        };

        let failed = outcomes.iter().filter(|o| o.is_none()).count();
        let mut results: Vec<SweepResult> = outcomes.into_iter().flatten().collect();
        rank(&mut results);

        Ok(SweepResults { results, failed })
    }
}

fn run_point(config: &StrategyConfig, data: &LoadedData) -> Option<SweepResult> {
    let source = MaCrossover::new(config.short_window, config.long_window);
    match run_backtest_from_data(config, data, &source, &[], None) {
        Ok(result) => Some(SweepResult {
            short_window: config.short_window,
            long_window: config.long_window,
            stop_loss_pct: config.stop_loss_pct,
            take_profit_pct: config.take_profit_pct,
            metrics: result.metrics,
        }),
        Err(e) => {
            warn!(
                short = config.short_window,
                long = config.long_window,
                stop = config.stop_loss_pct,
                error = %e,
                "sweep run failed"
            );
            None
        }
    }
}

/// Sharpe descending, ties broken by parameter tuple ascending.
fn rank(results: &mut [SweepResult]) {
    results.sort_by(|a, b| {
        b.metrics
            .sharpe
            .total_cmp(&a.metrics.sharpe)
            .then_with(|| compare_keys(a.key(), b.key()))
    });
}

fn compare_keys(a: (usize, usize, f64), b: (usize, usize, f64)) -> Ordering {
    a.0.cmp(&b.0)
        .then(a.1.cmp(&b.1))
        .then(a.2.total_cmp(&b.2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grid_shape() {
        let grid = ParamGrid::default();
        assert_eq!(grid.size(), 6 * 6 * 5);
        let base = sweep_base(60).unwrap();
        // All shorts are below all longs in the default grid.
        assert_eq!(grid.generate_configs(&base).len(), 180);
    }

    #[test]
    fn invalid_combinations_are_skipped() {
        let grid = ParamGrid {
            short_windows: vec![10, 50],
            long_windows: vec![20, 50],
            stop_losses: vec![0.05],
        };
        let configs = grid.generate_configs(&sweep_base(30).unwrap());
        let pairs: Vec<(usize, usize)> = configs
            .iter()
            .map(|c| (c.short_window, c.long_window))
            .collect();
        assert_eq!(pairs, vec![(10, 20), (10, 50)]);
    }

    #[test]
    fn take_profit_is_twice_the_stop() {
        let grid = ParamGrid {
            short_windows: vec![5],
            long_windows: vec![35],
            stop_losses: vec![0.03],
        };
        let configs = grid.generate_configs(&sweep_base(60).unwrap());
        assert!((configs[0].take_profit_pct - 0.06).abs() < 1e-12);
    }

    #[test]
    fn sweep_base_matches_defaults() {
        let base = sweep_base(45).unwrap();
        assert_eq!(base.position_size_pct, 0.2);
        assert_eq!(base.initial_capital, 10_000.0);
        assert!(base.use_trailing_stop);
        assert_eq!(base.trailing_stop_activation_pct, 0.06);
        assert_eq!(base.trailing_stop_distance_pct, 0.04);
        assert_eq!(base.max_hold_days, 45);
        assert!(sweep_base(0).is_err());
    }

    #[test]
    fn top_clamps_to_len() {
        let results = SweepResults::default();
        assert!(results.top(10).is_empty());
        assert!(results.best().is_none());
    }
}
