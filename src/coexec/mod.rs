//! Orchestration of host and accelerator over one task domain.
//!
//! [`CoExecutor`] is the main loop: one partitioned launch plus the host
//! pool per iteration, joined at a barrier and merged. The other runners
//! cover the per-task variants: [`ProxyExecutor`] (one host proxy and one
//! device proxy racing over whole tasks), [`Pipeline`] (device stage feeding
//! a host stage) and [`BatchRunner`] (host-staged windows consumed by the
//! device).

pub mod batch;
pub mod orchestrator;
pub mod pipeline;
pub mod proxy;

pub use batch::{BatchReport, BatchRunner};
pub use orchestrator::{CoExecutor, IterationReport, RunReport, Verify};
pub use pipeline::{Pipeline, PipelineReport};
pub use proxy::{ProxyExecutor, ProxyReport};

use crate::accel::{Accelerator, Capabilities, DeviceReport, DeviceWork, Geometry};
use crate::buffer::ResultBuffer;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::partition::{Partitioner, TaskIndex};
use std::ops::Range;
use std::thread;

/// Apply the configured geometry to `accelerator` and return the
/// capabilities it reports afterwards. A device that does not run the
/// configured number of work-groups is rejected.
pub(crate) fn configure_device<T, A>(config: &Config, accelerator: &mut A) -> Result<Capabilities>
where
    A: Accelerator<T> + ?Sized,
{
    let geometry = Geometry::from(config);
    accelerator.configure(geometry)?;
    let caps = accelerator.capabilities();
    if geometry.work_groups > 0 && caps.compute_units != geometry.work_groups {
        return Err(Error::config(format!(
            "{} runs {} work-groups, configured {}",
            accelerator.name(),
            caps.compute_units,
            geometry.work_groups
        )));
    }
    tracing::debug!(
        device = accelerator.name(),
        work_groups = geometry.work_groups,
        work_items = geometry.work_items,
        "device configured"
    );
    Ok(caps)
}

/// Device-side buffer for discrete memory, `None` when the device writes
/// straight into the host's result slots.
pub(crate) fn scratch_buffer<T>(
    config: &Config,
    caps: &Capabilities,
    device: &str,
    n_tasks: usize,
) -> Result<Option<ResultBuffer<T>>> {
    if !config.unified_memory {
        return Ok(Some(ResultBuffer::new(n_tasks)));
    }
    if !caps.unified_memory {
        return Err(Error::config(format!(
            "unified memory requested but {} only has discrete memory",
            device
        )));
    }
    Ok(None)
}

/// Dynamic claiming needs the device to see the cursor and the final
/// result slots.
pub(crate) fn check_dynamic(
    config: &Config,
    partitioner: &Partitioner,
    caps: &Capabilities,
    device: &str,
) -> Result<()> {
    if !partitioner.is_dynamic() || config.work_groups == 0 {
        return Ok(());
    }
    if !config.unified_memory || !caps.supports_dynamic() {
        return Err(Error::config(format!(
            "dynamic partitioning needs unified memory and a shared worklist on {} \
             (unified_memory = {}, device unified = {}, shared_worklist = {})",
            device, config.unified_memory, caps.unified_memory, caps.shared_worklist
        )));
    }
    Ok(())
}

/// Launch the device over `range`, wait for it, and copy its slots back
/// when it wrote into `scratch`.
pub(crate) fn launch_range<T, A>(
    accelerator: &A,
    range: Range<TaskIndex>,
    output: &ResultBuffer<T>,
    scratch: Option<&mut ResultBuffer<T>>,
) -> Result<DeviceReport>
where
    T: Send + Sync,
    A: Accelerator<T> + ?Sized,
{
    let report = {
        let target = scratch.as_deref().unwrap_or(output);
        let work = DeviceWork::Range(range.clone());
        thread::scope(|s| accelerator.launch(s, work, target)?.wait())?
    };

    if let Some(scratch) = scratch {
        for task in range {
            let value = scratch.take(task).ok_or_else(|| {
                Error::schedule(format!("{} left task {} unwritten", accelerator.name(), task))
            })?;
            output.write(task, value)?;
        }
    }
    Ok(report)
}
