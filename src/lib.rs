//! coexec - host/accelerator co-execution
//!
//! Splits one index-addressable task domain between a pool of host threads
//! and an accelerator, runs both sides concurrently, and merges their
//! outputs into a single result buffer indexed by task.
//!
//! # Quick Start
//!
//! ```no_run
//! use coexec::prelude::*;
//!
//! let config = Config::builder().alpha(0.3).num_threads(4).build().unwrap();
//! let device = SimulatedAccelerator::new(infallible(|i| i * 2), 8);
//! let mut exec: CoExecutor<usize, _> = CoExecutor::new(config, 1000, device).unwrap();
//!
//! let report = exec.run(&infallible(|i| i * 2)).unwrap();
//! println!("host ran {} tasks", report.last.host_tasks());
//! ```
//!
//! # Partitioning
//!
//! - **Static** (`alpha` in `[0, 1]`): tasks below `round(n_tasks * alpha)`
//!   run on the host, the rest on the accelerator. Assignment is
//!   deterministic and needs no coordination.
//! - **Dynamic** (any other `alpha`): host workers and the accelerator claim
//!   indices from one atomic cursor. Requires unified memory.
//!
//! # Features
//!
//! - `telemetry` (default): iteration metrics with JSON/console export
//! - `gpu`: wgpu-backed accelerator for static splits

#![warn(missing_debug_implementations)]

pub mod accel;
pub mod buffer;
pub mod coexec;
pub mod config;
pub mod error;
pub mod executor;
pub mod input;
pub mod partition;
pub mod prelude;
pub mod telemetry;
pub mod util;

#[cfg(feature = "gpu")]
pub mod gpu;

pub use accel::{Accelerator, Capabilities, DeviceWork, Geometry, SimulatedAccelerator};
pub use buffer::{CompactBuffer, ResultBuffer};
pub use coexec::{BatchRunner, CoExecutor, Pipeline, ProxyExecutor};
pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result};
pub use partition::{Lane, Partitioner, Strategy, TaskIndex, Worklist};
