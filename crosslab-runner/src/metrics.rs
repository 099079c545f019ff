//! Performance metrics: pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: value series and/or trade list in,
//! scalar out. No dependencies on the runner, data loading, or engine.

use std::collections::BTreeMap;

use crosslab_core::domain::{ExitReason, TradeRecord};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::drawdown::{drawdown_series, longest_drawdown, max_drawdown, DrawdownRun};

/// Trading days per year used for annualization.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Errors from metric computation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricsError {
    #[error("no results to analyze: need at least 2 value points, got {0}")]
    NoResults(usize),
    #[error("initial capital must be positive and finite, got {0}")]
    InvalidCapital(f64),
}

/// Aggregate performance metrics for a single backtest run.
///
/// Returns and drawdowns are fractions; `to_map` scales them to percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub volatility: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    /// Length in value points of the longest drawdown.
    pub max_drawdown_duration: usize,
    pub max_drawdown_run: Option<DrawdownRun>,
    pub trade_count: usize,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    /// `+inf` when there are winning trades and no losers. Serialized as null.
    #[serde(with = "unbounded")]
    pub profit_factor: f64,
    pub exit_reason_counts: BTreeMap<ExitReason, usize>,
}

impl PerformanceMetrics {
    /// Compute all metrics from a value series and trade list.
    pub fn compute(
        values: &[f64],
        trades: &[TradeRecord],
        initial_capital: f64,
    ) -> Result<Self, MetricsError> {
        if values.len() < 2 {
            return Err(MetricsError::NoResults(values.len()));
        }
        if !(initial_capital.is_finite() && initial_capital > 0.0) {
            return Err(MetricsError::InvalidCapital(initial_capital));
        }

        let total_return = total_return(values, initial_capital);
        let annualized_return = annualized_return(total_return, values.len());
        let volatility = volatility(&daily_returns(values));
        let drawdowns = drawdown_series(values);
        let run = longest_drawdown(&drawdowns);

        Ok(Self {
            total_return,
            annualized_return,
            volatility,
            sharpe: sharpe_ratio(annualized_return, volatility),
            max_drawdown: max_drawdown(&drawdowns),
            max_drawdown_duration: run.map_or(0, |r| r.len),
            max_drawdown_run: run,
            trade_count: trades.len(),
            win_rate: win_rate(trades),
            avg_win: avg_win(trades),
            avg_loss: avg_loss(trades),
            profit_factor: profit_factor(trades),
            exit_reason_counts: exit_reason_counts(trades),
        })
    }

    /// Display rows in report order, percent-scaled where labelled.
    pub fn summary_rows(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("Total Return (%)", self.total_return * 100.0),
            ("Annualized Return (%)", self.annualized_return * 100.0),
            ("Volatility (%)", self.volatility * 100.0),
            ("Sharpe Ratio", self.sharpe),
            ("Max Drawdown (%)", self.max_drawdown * 100.0),
            (
                "Max Drawdown Duration (Bars)",
                self.max_drawdown_duration as f64,
            ),
            ("Number of Trades", self.trade_count as f64),
            ("Win Rate (%)", self.win_rate * 100.0),
            ("Average Win ($)", self.avg_win),
            ("Average Loss ($)", self.avg_loss),
            ("Profit Factor", self.profit_factor),
        ]
    }

    /// Flat metric-name → value mapping.
    pub fn to_map(&self) -> BTreeMap<&'static str, f64> {
        self.summary_rows().into_iter().collect()
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction of initial capital.
pub fn total_return(values: &[f64], initial_capital: f64) -> f64 {
    match values.last() {
        Some(&last) if initial_capital > 0.0 => (last - initial_capital) / initial_capital,
        _ => 0.0,
    }
}

/// `(1 + total_return)^(252 / n) - 1` with `n` value points.
pub fn annualized_return(total_return: f64, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let growth = 1.0 + total_return;
    if growth <= 0.0 {
        return -1.0;
    }
    growth.powf(TRADING_DAYS_PER_YEAR / n as f64) - 1.0
}

/// Pairwise percent change; the first point has no return. A zero previous
/// value yields a 0 return.
pub fn daily_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .map(|w| if w[0] == 0.0 { 0.0 } else { (w[1] - w[0]) / w[0] })
        .collect()
}

/// Annualized population standard deviation of daily returns.
pub fn volatility(returns: &[f64]) -> f64 {
    population_std(returns) * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Annualized return over volatility, 0 when volatility is 0.
pub fn sharpe_ratio(annualized_return: f64, volatility: f64) -> f64 {
    if volatility > 0.0 {
        annualized_return / volatility
    } else {
        0.0
    }
}

/// Fraction of trades with positive P&L.
pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

/// Mean P&L of winning trades, 0 if none.
pub fn avg_win(trades: &[TradeRecord]) -> f64 {
    mean(trades.iter().filter(|t| t.is_winner()).map(|t| t.pnl))
}

/// Mean P&L of losing trades (negative), 0 if none.
pub fn avg_loss(trades: &[TradeRecord]) -> f64 {
    mean(trades.iter().filter(|t| t.is_loser()).map(|t| t.pnl))
}

/// Gross profit over gross loss magnitude.
///
/// 0 with no trades, `+inf` when no trade lost money.
pub fn profit_factor(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = trades.iter().filter(|t| t.is_winner()).map(|t| t.pnl).sum();
    let gross_loss: f64 = trades.iter().filter(|t| t.is_loser()).map(|t| t.pnl).sum();
    if gross_loss < 0.0 {
        gross_profit.abs() / gross_loss.abs()
    } else {
        f64::INFINITY
    }
}

/// Trade count per exit reason, reasons without trades omitted.
pub fn exit_reason_counts(trades: &[TradeRecord]) -> BTreeMap<ExitReason, usize> {
    let mut counts = BTreeMap::new();
    for t in trades {
        *counts.entry(t.exit_reason).or_insert(0) += 1;
    }
    counts
}

// ─── Helpers ────────────────────────────────────────────────────────

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Serialize non-finite values as null and read null back as `+inf`.
mod unbounded {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}
