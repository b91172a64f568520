pub use crate::accel::{
    Accelerator, Capabilities, DeviceReport, DeviceWork, Geometry, LaunchHandle,
    SimulatedAccelerator,
};
pub use crate::buffer::{merge_partitioned, CompactBuffer, MergeReport, ResultBuffer};
pub use crate::coexec::{
    BatchRunner, CoExecutor, IterationReport, Pipeline, ProxyExecutor, RunReport, Verify,
};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{Error, Result};
pub use crate::executor::{infallible, HostPool, Kernel};
pub use crate::input::read_counted_records;
pub use crate::partition::{Lane, Partitioner, Strategy, TaskIndex, Worklist};

pub use crate::telemetry::{Metrics, MetricsSnapshot};

#[cfg(feature = "telemetry")]
pub use crate::telemetry::{ConsoleExporter, JsonExporter, MetricsExporter};

#[cfg(feature = "gpu")]
pub use crate::gpu::{GpuRuntime, WgpuAccelerator, WordKernel};
