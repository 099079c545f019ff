//! TOML backtest configuration.
//!
//! ```toml
//! [data]
//! source = "synthetic"
//! start_date = "2018-01-01"
//! end_date = "2023-01-01"
//!
//! [strategy]
//! short_window = 20
//! long_window = 50
//! initial_capital = 10000.0
//!
//! [[periods]]
//! label = "covid"
//! start = "2020-02-01"
//! end = "2020-04-30"
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use crosslab_core::engine::{self, EndOfRunPolicy, StrategyConfig, TradingMode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::monitor::DEFAULT_CAPACITY;

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

/// Errors from loading or validating a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid strategy: {0}")]
    Strategy(#[from] engine::ConfigError),
    #[error("data.path is required when data.source = \"csv\"")]
    MissingCsvPath,
    #[error("data range start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
    #[error("period '{label}': start {start} is after end {end}")]
    InvalidPeriod {
        label: String,
        start: NaiveDate,
        end: NaiveDate,
    },
    #[error("monitor.capacity must be at least 1")]
    InvalidMonitorCapacity,
    #[error("period '{0}' must look like START:END or LABEL=START:END")]
    MalformedPeriod(String),
}

/// Complete file configuration for one backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    #[serde(default)]
    pub data: DataConfig,
    pub strategy: StrategySection,
    /// Windows analyzed after the run. Defaults to the 2020 crash window.
    #[serde(default = "default_periods")]
    pub periods: Vec<PeriodConfig>,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

/// Where bars come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    #[default]
    Synthetic,
    Csv,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default)]
    pub source: DataSource,
    /// CSV file, required for the csv source.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Inclusive range. Synthetic data falls back to 2018-01-01..2023-01-01;
    /// CSV data is unfiltered on a missing bound.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Return adjustments applied to the synthetic walk. Defaults to the
    /// 2020 crash and recovery; `shocks = []` turns them off.
    #[serde(default = "default_shocks")]
    pub shocks: Vec<ShockConfig>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source: DataSource::Synthetic,
            path: None,
            start_date: None,
            end_date: None,
            seed: default_seed(),
            shocks: default_shocks(),
        }
    }
}

/// Constant daily return adjustment over a date window of the synthetic
/// series, for scripted crashes and rallies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShockConfig {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub daily_return: f64,
}

impl ShockConfig {
    /// The 2020 crash scripted into the synthetic walk: -3% a day from
    /// 2020-02-15 through 2020-03-23, then +2% a day through 2020-06-01.
    pub fn covid_crash() -> Vec<ShockConfig> {
        vec![
            ShockConfig {
                start: ymd((2020, 2, 15)),
                end: ymd((2020, 3, 23)),
                daily_return: -0.03,
            },
            ShockConfig {
                start: ymd((2020, 3, 24)),
                end: ymd((2020, 6, 1)),
                daily_return: 0.02,
            },
        ]
    }
}

/// `[strategy]` table. Everything except windows and capital is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySection {
    pub short_window: usize,
    pub long_window: usize,
    pub initial_capital: f64,
    #[serde(default = "default_stop_loss")]
    pub stop_loss_pct: f64,
    #[serde(default = "default_take_profit")]
    pub take_profit_pct: f64,
    #[serde(default = "default_position_size")]
    pub position_size_pct: f64,
    #[serde(default = "default_true")]
    pub use_trailing_stop: bool,
    #[serde(default = "default_trailing")]
    pub trailing_stop_activation_pct: f64,
    #[serde(default = "default_trailing")]
    pub trailing_stop_distance_pct: f64,
    #[serde(default)]
    pub mode: TradingMode,
    #[serde(default = "default_max_hold_days")]
    pub max_hold_days: u32,
    #[serde(default)]
    pub end_of_run: EndOfRunPolicy,
}

impl StrategySection {
    /// Validated engine configuration.
    pub fn to_strategy_config(&self) -> Result<StrategyConfig, engine::ConfigError> {
        let config = StrategyConfig {
            short_window: self.short_window,
            long_window: self.long_window,
            initial_capital: self.initial_capital,
            stop_loss_pct: self.stop_loss_pct,
            take_profit_pct: self.take_profit_pct,
            position_size_pct: self.position_size_pct,
            use_trailing_stop: self.use_trailing_stop,
            trailing_stop_activation_pct: self.trailing_stop_activation_pct,
            trailing_stop_distance_pct: self.trailing_stop_distance_pct,
            mode: self.mode,
            max_hold_days: self.max_hold_days,
            end_of_run: self.end_of_run,
        };
        config.validate()?;
        Ok(config)
    }
}

impl From<&StrategyConfig> for StrategySection {
    fn from(c: &StrategyConfig) -> Self {
        Self {
            short_window: c.short_window,
            long_window: c.long_window,
            initial_capital: c.initial_capital,
            stop_loss_pct: c.stop_loss_pct,
            take_profit_pct: c.take_profit_pct,
            position_size_pct: c.position_size_pct,
            use_trailing_stop: c.use_trailing_stop,
            trailing_stop_activation_pct: c.trailing_stop_activation_pct,
            trailing_stop_distance_pct: c.trailing_stop_distance_pct,
            mode: c.mode,
            max_hold_days: c.max_hold_days,
            end_of_run: c.end_of_run,
        }
    }
}

/// Named date window analyzed after the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodConfig {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PeriodConfig {
    /// February through April 2020.
    pub fn covid() -> Self {
        Self {
            label: "covid".to_string(),
            start: ymd((2020, 2, 1)),
            end: ymd((2020, 4, 30)),
        }
    }
}

/// Parses `START:END` or `LABEL=START:END`. Unlabeled windows are named
/// after their range.
impl FromStr for PeriodConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ConfigError::MalformedPeriod(s.to_string());
        let (label, range) = match s.split_once('=') {
            Some((label, range)) => (Some(label.trim()), range),
            None => (None, s),
        };
        let (start, end) = range.split_once(':').ok_or_else(malformed)?;
        let start: NaiveDate = start.trim().parse().map_err(|_| malformed())?;
        let end: NaiveDate = end.trim().parse().map_err(|_| malformed())?;
        if start > end {
            return Err(ConfigError::InvalidPeriod {
                label: label.unwrap_or(s).to_string(),
                start,
                end,
            });
        }
        let label = match label {
            Some(l) if !l.is_empty() => l.to_string(),
            _ => format!("{start} to {end}"),
        };
        Ok(Self { label, start, end })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Entries kept per ring buffer.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

fn default_seed() -> u64 {
    42
}
fn default_stop_loss() -> f64 {
    0.05
}
fn default_take_profit() -> f64 {
    0.15
}
fn default_position_size() -> f64 {
    0.5
}
fn default_true() -> bool {
    true
}
fn default_trailing() -> f64 {
    0.02
}
fn default_max_hold_days() -> u32 {
    engine::config::DEFAULT_MAX_HOLD_DAYS
}
fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}
fn default_shocks() -> Vec<ShockConfig> {
    ShockConfig::covid_crash()
}
fn default_periods() -> Vec<PeriodConfig> {
    vec![PeriodConfig::covid()]
}

const DEFAULT_START: (i32, u32, u32) = (2018, 1, 1);
const DEFAULT_END: (i32, u32, u32) = (2023, 1, 1);

fn ymd((y, m, d): (i32, u32, u32)) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

impl DataConfig {
    /// Synthetic range with defaults applied.
    pub fn synthetic_range(&self) -> (NaiveDate, NaiveDate) {
        (
            self.start_date.unwrap_or_else(|| ymd(DEFAULT_START)),
            self.end_date.unwrap_or_else(|| ymd(DEFAULT_END)),
        )
    }
}

impl BacktestConfig {
    /// Config with the default synthetic data, the covid window and the
    /// given strategy.
    pub fn new(strategy: &StrategyConfig) -> Self {
        Self {
            data: DataConfig::default(),
            strategy: StrategySection::from(strategy),
            periods: default_periods(),
            monitor: MonitorConfig::default(),
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.strategy.to_strategy_config()?;
        if self.data.source == DataSource::Csv && self.data.path.is_none() {
            return Err(ConfigError::MissingCsvPath);
        }
        if let (Some(start), Some(end)) = (self.data.start_date, self.data.end_date) {
            if start > end {
                return Err(ConfigError::InvalidDateRange { start, end });
            }
        }
        for p in &self.periods {
            if p.start > p.end {
                return Err(ConfigError::InvalidPeriod {
                    label: p.label.clone(),
                    start: p.start,
                    end: p.end,
                });
            }
        }
        if self.monitor.capacity == 0 {
            return Err(ConfigError::InvalidMonitorCapacity);
        }
        Ok(())
    }

    pub fn strategy_config(&self) -> Result<StrategyConfig, ConfigError> {
        Ok(self.strategy.to_strategy_config()?)
    }

    /// Deterministic hash over the canonical JSON form of this config.
    ///
    /// Two runs with identical configs share a run id.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"));
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}
