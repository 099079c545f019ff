//! Drawdown series and longest-drawdown detection.

use serde::{Deserialize, Serialize};

/// Contiguous run of strictly positive drawdown, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawdownRun {
    pub start: usize,
    pub end: usize,
    /// Number of value points in the run.
    pub len: usize,
}

impl DrawdownRun {
    fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            len: end - start + 1,
        }
    }
}

/// Drawdown at every point: `(running_max - value) / running_max`, 0 where
/// the running maximum is 0.
pub fn drawdown_series(values: &[f64]) -> Vec<f64> {
    let mut running_max = f64::NEG_INFINITY;
    values
        .iter()
        .map(|&v| {
            running_max = running_max.max(v);
            if running_max == 0.0 {
                0.0
            } else {
                (running_max - v) / running_max
            }
        })
        .collect()
}

/// Largest drawdown in the series as a positive fraction.
pub fn max_drawdown(series: &[f64]) -> f64 {
    series.iter().copied().fold(0.0_f64, f64::max)
}

/// Longest run of strictly positive drawdown. A run still open at the end of
/// the series extends to the last index. Ties keep the earliest run.
pub fn longest_drawdown(series: &[f64]) -> Option<DrawdownRun> {
    let mut best: Option<DrawdownRun> = None;
    let mut current_start: Option<usize> = None;

    for (i, &dd) in series.iter().enumerate() {
        match (dd > 0.0, current_start) {
            (true, None) => current_start = Some(i),
            (false, Some(start)) => {
                close_run(start, i - 1, &mut best);
                current_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = current_start {
        close_run(start, series.len() - 1, &mut best);
    }
    best
}

fn close_run(start: usize, end: usize, best: &mut Option<DrawdownRun>) {
    let run = DrawdownRun::new(start, end);
    if best.map_or(true, |b| run.len > b.len) {
        *best = Some(run);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_and_max() {
        let values = [100.0, 120.0, 90.0, 110.0, 80.0, 130.0];
        let dd = drawdown_series(&values);
        assert_eq!(dd.len(), values.len());
        assert_eq!(dd[0], 0.0);
        assert_eq!(dd[1], 0.0);
        assert!((dd[2] - 0.25).abs() < 1e-12);
        assert!((dd[3] - 10.0 / 120.0).abs() < 1e-12);
        assert!((dd[4] - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(dd[5], 0.0);
        assert!((max_drawdown(&dd) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn longest_run_indices() {
        let dd = drawdown_series(&[100.0, 120.0, 90.0, 110.0, 80.0, 130.0]);
        assert_eq!(
            longest_drawdown(&dd),
            Some(DrawdownRun {
                start: 2,
                end: 4,
                len: 3
            })
        );
    }

    #[test]
    fn open_run_counts_to_last_index() {
        let dd = drawdown_series(&[100.0, 90.0, 95.0, 99.0]);
        let run = longest_drawdown(&dd).unwrap();
        assert_eq!((run.start, run.end, run.len), (1, 3, 3));
    }

    #[test]
    fn ties_keep_first_run() {
        let dd = drawdown_series(&[100.0, 90.0, 100.0, 90.0, 100.0]);
        let run = longest_drawdown(&dd).unwrap();
        assert_eq!((run.start, run.len), (1, 1));
    }

    #[test]
    fn monotone_series_has_no_drawdown() {
        let dd = drawdown_series(&[1.0, 2.0, 3.0]);
        assert_eq!(max_drawdown(&dd), 0.0);
        assert_eq!(longest_drawdown(&dd), None);
    }

    #[test]
    fn zero_peak_is_zero_drawdown() {
        let dd = drawdown_series(&[0.0, 0.0, 5.0, 4.0]);
        assert_eq!(&dd[..2], &[0.0, 0.0]);
        assert!((dd[3] - 0.2).abs() < 1e-12);
    }
}
