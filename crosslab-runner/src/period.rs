//! Period-window analysis: return, trade count and win rate inside a date
//! range.

use chrono::NaiveDate;
use crosslab_core::domain::{EquityPoint, TradeRecord};
use serde::{Deserialize, Serialize};

/// Reduced metrics for one date window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodReport {
    /// Caller-supplied name, or the period string when unnamed.
    pub label: String,
    /// `"{start} to {end}"`.
    pub period: String,
    /// Fractional change of portfolio value across the window.
    pub period_return: f64,
    /// Trades that both opened and closed inside the window.
    pub trade_count: usize,
    pub win_rate: f64,
}

impl PeriodReport {
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// Analyze `[start, end]`, both dates inclusive.
///
/// Value points are selected by calendar date, so intraday points on `end`
/// are included. Trades straddling either boundary are excluded.
pub fn analyze_period(
    values: &[EquityPoint],
    trades: &[TradeRecord],
    start: NaiveDate,
    end: NaiveDate,
) -> PeriodReport {
    let period = format!("{start} to {end}");
    let in_window = |d: NaiveDate| start <= d && d <= end;

    let mut window = values.iter().filter(|p| in_window(p.timestamp.date()));
    let Some(first) = window.next() else {
        return PeriodReport {
            label: period.clone(),
            period,
            period_return: 0.0,
            trade_count: 0,
            win_rate: 0.0,
        };
    };
    let last = window.last().unwrap_or(first);

    let period_return = if first.value == 0.0 {
        0.0
    } else {
        (last.value - first.value) / first.value
    };

    let period_trades: Vec<&TradeRecord> = trades
        .iter()
        .filter(|t| t.entry_timestamp.date() >= start && t.exit_timestamp.date() <= end)
        .collect();
    let wins = period_trades.iter().filter(|t| t.is_winner()).count();
    let win_rate = if period_trades.is_empty() {
        0.0
    } else {
        wins as f64 / period_trades.len() as f64
    };

    PeriodReport {
        label: period.clone(),
        period,
        period_return,
        trade_count: period_trades.len(),
        win_rate,
    }
}
