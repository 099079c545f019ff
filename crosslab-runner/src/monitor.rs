//! Bounded run monitor: recent portfolio values, recent trades and per-step
//! processing latency, each in a fixed-capacity ring buffer.
//!
//! Memory stays constant however long the run. When a buffer is full the
//! oldest entry is evicted first.

use std::collections::VecDeque;
use std::time::Duration;

use crosslab_core::domain::{EquityPoint, TradeRecord};
use serde::{Deserialize, Serialize};

/// Default entries kept per buffer.
pub const DEFAULT_CAPACITY: usize = 50_000;

/// Fixed-capacity FIFO that drops its oldest entry on overflow.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
    evicted: u64,
}

impl<T> RingBuffer<T> {
    /// A zero capacity is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
            evicted: 0,
        }
    }

    /// Append `item`, returning the evicted entry if the buffer was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let dropped = if self.items.len() == self.capacity {
            self.evicted += 1;
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        dropped
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries dropped since creation.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

/// Step latency summary in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub samples: usize,
    pub min_us: f64,
    pub max_us: f64,
    pub avg_us: f64,
    pub p99_us: f64,
}

/// Live view of a run in progress.
#[derive(Debug, Clone)]
pub struct RunMonitor {
    equity: RingBuffer<EquityPoint>,
    trades: RingBuffer<TradeRecord>,
    latencies: RingBuffer<Duration>,
    steps: u64,
    trades_seen: u64,
}

impl Default for RunMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RunMonitor {
    pub fn new(capacity: usize) -> Self {
        Self {
            equity: RingBuffer::new(capacity),
            trades: RingBuffer::new(capacity),
            latencies: RingBuffer::new(capacity),
            steps: 0,
            trades_seen: 0,
        }
    }

    pub fn record_step(&mut self, point: EquityPoint, latency: Duration) {
        self.equity.push(point);
        self.latencies.push(latency);
        self.steps += 1;
    }

    pub fn record_trade(&mut self, trade: TradeRecord) {
        self.trades.push(trade);
        self.trades_seen += 1;
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn trades_seen(&self) -> u64 {
        self.trades_seen
    }

    pub fn recent_equity(&self) -> &RingBuffer<EquityPoint> {
        &self.equity
    }

    pub fn recent_trades(&self) -> &RingBuffer<TradeRecord> {
        &self.trades
    }

    pub fn latest_value(&self) -> Option<f64> {
        self.equity.latest().map(|p| p.value)
    }

    /// Min, max, mean and 99th percentile over the retained samples.
    pub fn latency_stats(&self) -> Option<LatencyStats> {
        if self.latencies.is_empty() {
            return None;
        }
        let mut us: Vec<f64> = self
            .latencies
            .iter()
            .map(|d| d.as_secs_f64() * 1e6)
            .collect();
        us.sort_by(f64::total_cmp);

        Some(LatencyStats {
            samples: us.len(),
            min_us: us[0],
            max_us: us[us.len() - 1],
            avg_us: us.iter().sum::<f64>() / us.len() as f64,
            p99_us: percentile_sorted(&us, 99.0),
        })
    }
}

/// Percentile of a sorted slice using linear interpolation.
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = rank - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn point(day: u32, value: f64) -> EquityPoint {
        let ts = NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        EquityPoint::new(ts, value)
    }

    #[test]
    fn ring_buffer_respects_capacity() {
        let mut buf = RingBuffer::new(3);
        for i in 0..3 {
            assert_eq!(buf.push(i), None);
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.push(3), Some(0));
        assert_eq!(buf.push(4), Some(1));
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.evicted(), 2);
        assert_eq!(buf.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(buf.latest(), Some(&4));
    }

    #[test]
    fn zero_capacity_holds_one() {
        let mut buf = RingBuffer::new(0);
        buf.push("a");
        buf.push("b");
        assert_eq!(buf.capacity(), 1);
        assert_eq!(buf.iter().collect::<Vec<_>>(), vec![&"b"]);
    }

    #[test]
    fn monitor_keeps_most_recent_points() {
        let mut monitor = RunMonitor::new(2);
        for day in 1..=5 {
            monitor.record_step(point(day, day as f64), Duration::from_micros(10));
        }
        assert_eq!(monitor.steps(), 5);
        let values: Vec<f64> = monitor.recent_equity().iter().map(|p| p.value).collect();
        assert_eq!(values, vec![4.0, 5.0]);
        assert_eq!(monitor.latest_value(), Some(5.0));
    }

    #[test]
    fn latency_stats() {
        let mut monitor = RunMonitor::new(1_000);
        assert!(monitor.latency_stats().is_none());
        for us in 1..=100 {
            monitor.record_step(point(1, 0.0), Duration::from_micros(us));
        }
        let stats = monitor.latency_stats().unwrap();
        assert_eq!(stats.samples, 100);
        assert!((stats.min_us - 1.0).abs() < 1e-6);
        assert!((stats.max_us - 100.0).abs() < 1e-6);
        assert!((stats.avg_us - 50.5).abs() < 1e-6);
        assert!((stats.p99_us - 99.01).abs() < 1e-6);
    }

    #[test]
    fn percentile_interpolates() {
        assert_eq!(percentile_sorted(&[], 50.0), 0.0);
        assert_eq!(percentile_sorted(&[7.0], 99.0), 7.0);
        assert_eq!(percentile_sorted(&[1.0, 2.0, 3.0], 50.0), 2.0);
    }
}
