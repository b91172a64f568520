//! Accelerator side of a co-executed iteration.
//!
//! An [`Accelerator`] receives its share of the task domain once per
//! iteration and runs it asynchronously; the orchestrator gets a
//! [`LaunchHandle`] back immediately and waits on it at the barrier.

pub mod simulated;

pub use simulated::SimulatedAccelerator;

use crate::buffer::ResultBuffer;
use crate::config::Config;
use crate::error::Result;
use crate::executor::PanicInfo;
use crate::partition::{Partitioner, TaskIndex, Worklist};
use std::ops::Range;
use std::thread::{Scope, ScopedJoinHandle};
use std::time::Duration;

/// What a device can do, queried once when the executor is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Device writes land directly in host-visible result slots.
    pub unified_memory: bool,
    /// Device can claim from the shared [`Worklist`] cursor.
    pub shared_worklist: bool,
    /// Number of work-groups run concurrently.
    pub compute_units: usize,
}

impl Capabilities {
    /// Whether dynamic claiming against the host is possible at all.
    pub fn supports_dynamic(&self) -> bool {
        self.unified_memory && self.shared_worklist
    }
}

/// Launch geometry requested by the configuration.
///
/// `work_groups` is how many groups a launch runs side by side and
/// `work_items` the size of each group. Runners hand it to
/// [`Accelerator::configure`] before the device's capabilities are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub work_groups: usize,
    pub work_items: usize,
}

impl Geometry {
    /// Tasks one full pass of the geometry covers.
    pub fn global_size(&self) -> usize {
        self.work_groups.saturating_mul(self.work_items)
    }
}

impl From<&Config> for Geometry {
    fn from(config: &Config) -> Self {
        Self {
            work_groups: config.work_groups,
            work_items: config.work_items,
        }
    }
}

/// The accelerator's share of one iteration.
#[derive(Debug, Clone)]
pub enum DeviceWork<'a> {
    /// Claim through the partitioner with `Lane::Device` lanes. Covers both
    /// the static `[cut, n_tasks)` range and dynamic claiming.
    Partitioned {
        partitioner: &'a Partitioner,
        worklist: &'a Worklist,
    },
    /// A fixed range of task indices, used for per-task and per-window
    /// launches.
    Range(Range<TaskIndex>),
}

impl DeviceWork<'_> {
    /// Upper bound on the number of tasks this work can contain.
    pub fn max_tasks(&self) -> usize {
        match self {
            DeviceWork::Partitioned { partitioner, .. } => partitioner.accelerator_range().len(),
            DeviceWork::Range(range) => range.len(),
        }
    }
}

/// Summary the device returns at the barrier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceReport {
    pub tasks_executed: usize,
    pub elapsed: Duration,
}

/// A device that runs kernels over task indices.
///
/// `launch` must return without waiting for the device. Implementations
/// that finish synchronously can hand back [`LaunchHandle::ready`]; others
/// spawn onto `scope` so the work is joined before the borrowed buffers go
/// away.
pub trait Accelerator<T>: Send + Sync {
    fn name(&self) -> &str;

    /// Adopt the configured geometry. Fails if the device cannot run it.
    fn configure(&mut self, geometry: Geometry) -> Result<()>;

    /// Reflects the geometry applied by [`configure`](Self::configure).
    fn capabilities(&self) -> Capabilities;

    fn launch<'scope, 'env>(
        &'env self,
        scope: &'scope Scope<'scope, 'env>,
        work: DeviceWork<'env>,
        out: &'env ResultBuffer<T>,
    ) -> Result<LaunchHandle<'scope>>;
}

/// Pending device invocation. Dropping it without [`wait`](Self::wait)
/// still joins the device when the enclosing scope ends, but loses its
/// result.
#[derive(Debug)]
pub struct LaunchHandle<'scope> {
    inner: Pending<'scope>,
}

#[derive(Debug)]
enum Pending<'scope> {
    Running(ScopedJoinHandle<'scope, Result<DeviceReport>>),
    Ready(Result<DeviceReport>),
}

impl<'scope> LaunchHandle<'scope> {
    pub fn spawned(handle: ScopedJoinHandle<'scope, Result<DeviceReport>>) -> Self {
        Self {
            inner: Pending::Running(handle),
        }
    }

    pub fn ready(result: Result<DeviceReport>) -> Self {
        Self {
            inner: Pending::Ready(result),
        }
    }

    pub fn is_finished(&self) -> bool {
        match &self.inner {
            Pending::Running(handle) => handle.is_finished(),
            Pending::Ready(_) => true,
        }
    }

    /// Block until the device is done. A panic on the device thread is
    /// reported as an accelerator error.
    pub fn wait(self) -> Result<DeviceReport> {
        match self.inner {
            Pending::Running(handle) => handle.join().unwrap_or_else(|payload| {
                Err(PanicInfo::from_payload(payload).into_accelerator_error())
            }),
            Pending::Ready(result) => result,
        }
    }
}
