//! Telemetry for co-executed runs.
//!
//! Provides iteration metrics and export to JSON or the console.

#[cfg(feature = "telemetry")]
pub mod metrics;

#[cfg(feature = "telemetry")]
pub mod export;

#[cfg(feature = "telemetry")]
pub use metrics::{Metrics, MetricsSnapshot};

#[cfg(feature = "telemetry")]
pub use export::{ConsoleExporter, JsonExporter, MetricsExporter};

// Stub implementations when telemetry is disabled
#[cfg(not(feature = "telemetry"))]
pub mod metrics {
    use crate::error::Result;
    use std::time::Duration;

    #[derive(Debug, Clone)]
    pub struct Metrics;

    impl Metrics {
        pub fn new() -> Result<Self> {
            Ok(Self)
        }
        pub fn record_warmup(&self) {}
        pub fn record_iteration(&self, _: Duration, _: usize, _: usize) {}
        pub fn record_merge(&self, _: Duration, _: usize) {}
        pub fn snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot::default()
        }
        pub fn reset(&self) {}
    }

    #[derive(Debug, Clone, Default)]
    pub struct MetricsSnapshot {
        pub iterations: u64,
        pub warmup_iterations: u64,
        pub host_tasks: u64,
        pub device_tasks: u64,
        pub merged_slots: u64,
        pub avg_iteration_ns: u64,
    }
}

#[cfg(not(feature = "telemetry"))]
pub use metrics::{Metrics, MetricsSnapshot};
