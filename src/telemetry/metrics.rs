//! Per-run metrics for co-executed iterations.

use crate::error::{Error, Result};
use hdrhistogram::Histogram;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Metrics collector shared by one executor.
///
/// Only measured repetitions land in the histogram and counters; warmup
/// iterations are counted separately and otherwise ignored.
#[derive(Debug)]
pub struct Metrics {
    iterations: AtomicU64,
    warmup_iterations: AtomicU64,

    host_tasks: AtomicU64,
    device_tasks: AtomicU64,

    merged_slots: AtomicU64,
    merge_time_ns: AtomicU64,

    // Iteration wall time in nanoseconds
    iteration_histogram: RwLock<Histogram<u64>>,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        // 3 significant figures, max one hour in nanoseconds
        let histogram = Histogram::new_with_max(3_600_000_000_000, 3)
            .map_err(|e| Error::telemetry(format!("histogram setup failed: {}", e)))?;

        Ok(Self {
            iterations: AtomicU64::new(0),
            warmup_iterations: AtomicU64::new(0),
            host_tasks: AtomicU64::new(0),
            device_tasks: AtomicU64::new(0),
            merged_slots: AtomicU64::new(0),
            merge_time_ns: AtomicU64::new(0),
            iteration_histogram: RwLock::new(histogram),
            start_time: Instant::now(),
        })
    }

    pub fn record_warmup(&self) {
        self.warmup_iterations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a measured iteration.
    pub fn record_iteration(&self, wall: Duration, host_tasks: usize, device_tasks: usize) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
        self.host_tasks.fetch_add(host_tasks as u64, Ordering::Relaxed);
        self.device_tasks.fetch_add(device_tasks as u64, Ordering::Relaxed);

        let mut hist = self.iteration_histogram.write();
        let _ = hist.record(wall.as_nanos().min(u64::MAX as u128) as u64);
    }

    /// Record the merge step of a measured iteration.
    pub fn record_merge(&self, elapsed: Duration, copied: usize) {
        self.merged_slots.fetch_add(copied as u64, Ordering::Relaxed);
        self.merge_time_ns
            .fetch_add(elapsed.as_nanos().min(u64::MAX as u128) as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let histogram = self.iteration_histogram.read();

        MetricsSnapshot {
            timestamp: Instant::now(),
            uptime: self.start_time.elapsed(),
            iterations: self.iterations.load(Ordering::Relaxed),
            warmup_iterations: self.warmup_iterations.load(Ordering::Relaxed),
            host_tasks: self.host_tasks.load(Ordering::Relaxed),
            device_tasks: self.device_tasks.load(Ordering::Relaxed),
            merged_slots: self.merged_slots.load(Ordering::Relaxed),
            merge_time_ns: self.merge_time_ns.load(Ordering::Relaxed),
            avg_iteration_ns: if histogram.len() > 0 {
                histogram.mean() as u64
            } else {
                0
            },
            p50_iteration_ns: histogram.value_at_quantile(0.50),
            p95_iteration_ns: histogram.value_at_quantile(0.95),
            p99_iteration_ns: histogram.value_at_quantile(0.99),
            max_iteration_ns: histogram.max(),
        }
    }

    pub fn reset(&self) {
        self.iterations.store(0, Ordering::Relaxed);
        self.warmup_iterations.store(0, Ordering::Relaxed);
        self.host_tasks.store(0, Ordering::Relaxed);
        self.device_tasks.store(0, Ordering::Relaxed);
        self.merged_slots.store(0, Ordering::Relaxed);
        self.merge_time_ns.store(0, Ordering::Relaxed);
        self.iteration_histogram.write().reset();
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub timestamp: Instant,
    pub uptime: Duration,
    pub iterations: u64,
    pub warmup_iterations: u64,
    pub host_tasks: u64,
    pub device_tasks: u64,
    pub merged_slots: u64,
    pub merge_time_ns: u64,
    pub avg_iteration_ns: u64,
    pub p50_iteration_ns: u64,
    pub p95_iteration_ns: u64,
    pub p99_iteration_ns: u64,
    pub max_iteration_ns: u64,
}

impl MetricsSnapshot {
    /// Fraction of measured tasks the host executed (0.0 to 1.0).
    pub fn host_share(&self) -> f64 {
        let total = self.host_tasks + self.device_tasks;
        if total == 0 {
            return 0.0;
        }
        self.host_tasks as f64 / total as f64
    }

    /// Mean merge time per measured iteration.
    pub fn avg_merge_ns(&self) -> u64 {
        if self.iterations == 0 {
            return 0;
        }
        self.merge_time_ns / self.iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_basic() {
        let metrics = Metrics::new().unwrap();

        metrics.record_iteration(Duration::from_micros(10), 30, 70);
        metrics.record_iteration(Duration::from_micros(20), 30, 70);
        metrics.record_merge(Duration::from_micros(2), 70);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.iterations, 2);
        assert_eq!(snapshot.host_tasks, 60);
        assert_eq!(snapshot.device_tasks, 140);
        assert_eq!(snapshot.merged_slots, 70);
        assert!(snapshot.avg_iteration_ns > 0);
        assert!(snapshot.max_iteration_ns >= snapshot.p50_iteration_ns);
        assert!((snapshot.host_share() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_warmup_is_not_measured() {
        let metrics = Metrics::new().unwrap();
        metrics.record_warmup();
        metrics.record_warmup();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.warmup_iterations, 2);
        assert_eq!(snapshot.iterations, 0);
        assert_eq!(snapshot.avg_iteration_ns, 0);
        assert_eq!(snapshot.host_share(), 0.0);
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = Metrics::new().unwrap();

        metrics.record_iteration(Duration::from_micros(1), 1, 1);
        assert_eq!(metrics.snapshot().iterations, 1);

        metrics.reset();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.iterations, 0);
        assert_eq!(snapshot.max_iteration_ns, 0);
    }
}
