//! Metrics export functionality for various formats.

use super::metrics::MetricsSnapshot;
use crate::error::{Error, Result};
use std::path::PathBuf;

/// Trait for exporting metrics to different formats
pub trait MetricsExporter: Send + Sync {
    fn export(&self, snapshot: &MetricsSnapshot) -> Result<()>;
}

/// Writes a snapshot as pretty-printed JSON.
#[derive(Debug)]
pub struct JsonExporter {
    output_path: PathBuf,
}

impl JsonExporter {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }
}

impl MetricsExporter for JsonExporter {
    fn export(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        let serializable = SerializableSnapshot::from(snapshot);
        let json = serde_json::to_string_pretty(&serializable)
            .map_err(|e| Error::telemetry(format!("JSON serialization failed: {}", e)))?;

        std::fs::write(&self.output_path, json)?;
        Ok(())
    }
}

#[derive(Debug, Clone, serde::Serialize)]
struct SerializableSnapshot {
    uptime_secs: f64,
    iterations: u64,
    warmup_iterations: u64,
    host_tasks: u64,
    device_tasks: u64,
    host_share: f64,
    merged_slots: u64,
    avg_merge_us: f64,
    avg_iteration_us: f64,
    p50_iteration_us: f64,
    p95_iteration_us: f64,
    p99_iteration_us: f64,
    max_iteration_us: f64,
}

impl From<&MetricsSnapshot> for SerializableSnapshot {
    fn from(snapshot: &MetricsSnapshot) -> Self {
        Self {
            uptime_secs: snapshot.uptime.as_secs_f64(),
            iterations: snapshot.iterations,
            warmup_iterations: snapshot.warmup_iterations,
            host_tasks: snapshot.host_tasks,
            device_tasks: snapshot.device_tasks,
            host_share: snapshot.host_share(),
            merged_slots: snapshot.merged_slots,
            avg_merge_us: snapshot.avg_merge_ns() as f64 / 1_000.0,
            avg_iteration_us: snapshot.avg_iteration_ns as f64 / 1_000.0,
            p50_iteration_us: snapshot.p50_iteration_ns as f64 / 1_000.0,
            p95_iteration_us: snapshot.p95_iteration_ns as f64 / 1_000.0,
            p99_iteration_us: snapshot.p99_iteration_ns as f64 / 1_000.0,
            max_iteration_us: snapshot.max_iteration_ns as f64 / 1_000.0,
        }
    }
}

/// Prints a snapshot to stdout.
#[derive(Debug)]
pub struct ConsoleExporter {
    verbose: bool,
}

impl ConsoleExporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl MetricsExporter for ConsoleExporter {
    fn export(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        println!("=== co-execution metrics ===");
        println!(
            "Iterations: {} measured, {} warmup",
            snapshot.iterations, snapshot.warmup_iterations
        );
        println!(
            "Tasks: {} host, {} device ({:.1}% host)",
            snapshot.host_tasks,
            snapshot.device_tasks,
            snapshot.host_share() * 100.0
        );
        println!(
            "Iteration time: {:.2}us avg",
            snapshot.avg_iteration_ns as f64 / 1_000.0
        );

        if self.verbose {
            println!("\nIteration latency:");
            println!("  P50: {:.2}us", snapshot.p50_iteration_ns as f64 / 1_000.0);
            println!("  P95: {:.2}us", snapshot.p95_iteration_ns as f64 / 1_000.0);
            println!("  P99: {:.2}us", snapshot.p99_iteration_ns as f64 / 1_000.0);
            println!("  Max: {:.2}us", snapshot.max_iteration_ns as f64 / 1_000.0);

            println!("\nMerge:");
            println!("  Slots copied: {}", snapshot.merged_slots);
            println!("  Avg time: {:.2}us", snapshot.avg_merge_ns() as f64 / 1_000.0);
        }

        println!("============================");
        Ok(())
    }
}

impl Default for ConsoleExporter {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn dummy_snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Instant::now(),
            uptime: Duration::from_secs(2),
            iterations: 50,
            warmup_iterations: 5,
            host_tasks: 1500,
            device_tasks: 3500,
            merged_slots: 3500,
            merge_time_ns: 50_000,
            avg_iteration_ns: 40_000,
            p50_iteration_ns: 38_000,
            p95_iteration_ns: 52_000,
            p99_iteration_ns: 60_000,
            max_iteration_ns: 75_000,
        }
    }

    #[test]
    fn test_console_exporter() {
        let exporter = ConsoleExporter::new(true);
        assert!(exporter.export(&dummy_snapshot()).is_ok());
    }

    #[test]
    fn test_json_exporter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        let exporter = JsonExporter::new(&path);

        exporter.export(&dummy_snapshot()).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["iterations"], 50);
        assert_eq!(written["warmup_iterations"], 5);
        assert_eq!(written["host_share"], 0.3);
    }

    #[test]
    fn test_json_exporter_bad_path() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = JsonExporter::new(dir.path().join("missing").join("metrics.json"));
        assert!(exporter.export(&dummy_snapshot()).is_err());
    }
}
