use super::buffer::GpuBuffer;
use super::kernel::{CompiledKernel, WordKernel};
use super::runtime::GpuRuntime;
use crate::accel::{Accelerator, Capabilities, DeviceReport, DeviceWork, Geometry, LaunchHandle};
use crate::buffer::ResultBuffer;
use crate::error::{Error, Result};
use crate::partition::TaskIndex;
use std::ops::Range;
use std::sync::Arc;
use std::thread::{self, Scope};
use std::time::Instant;

/// Accelerator backed by a wgpu compute pipeline.
///
/// The kernel is compiled by [`configure`](Accelerator::configure) with
/// `work_items` invocations per work-group. A launch walks the device's
/// task range in passes of `work_groups * work_items` tasks, one dispatch
/// and readback per pass. The GPU cannot see the host's worklist cursor,
/// so only static splits are supported.
#[derive(Debug)]
pub struct WgpuAccelerator {
    runtime: Arc<GpuRuntime>,
    source: WordKernel,
    kernel: Option<CompiledKernel>,
    work_groups: usize,
    name: String,
}

impl WgpuAccelerator {
    pub fn new(runtime: Arc<GpuRuntime>, kernel: WordKernel) -> Self {
        let name = format!("wgpu:{}", runtime.adapter_info().name);
        Self {
            work_groups: runtime.max_workgroups() as usize,
            runtime,
            source: kernel,
            kernel: None,
            name,
        }
    }

    fn execute(&self, range: Range<TaskIndex>, out: &ResultBuffer<u32>) -> Result<DeviceReport> {
        let start = Instant::now();
        let kernel = self.kernel.as_ref().ok_or_else(|| {
            Error::accelerator(format!("{} launched before configure", self.name))
        })?;
        let pass = self.work_groups * kernel.workgroup_size() as usize;
        if pass == 0 {
            return Err(Error::accelerator(format!(
                "{} has no work-groups for {} tasks",
                self.name,
                range.len()
            )));
        }
        let max_groups = u32::try_from(self.work_groups).unwrap_or(u32::MAX);

        let device = self.runtime.device();
        let queue = self.runtime.queue();
        let mut executed = 0;
        let mut offset = range.start;
        while offset < range.end {
            let len = pass.min(range.end - offset);
            let first = u32::try_from(offset)
                .map_err(|_| Error::gpu(format!("task offset {} does not fit u32", offset)))?;

            let count = u32::try_from(len)
                .map_err(|_| Error::gpu(format!("{} tasks do not fit u32", len)))?;

            let output = GpuBuffer::new(self.runtime.shared_device(), len);
            kernel.dispatch(device, queue, &output, first, count, max_groups)?;
            let words = output.read_words(queue)?;
            for (task, word) in (offset..offset + len).zip(words) {
                out.write(task, word)?;
            }
            executed += len;
            offset += len;
        }
        Ok(DeviceReport {
            tasks_executed: executed,
            elapsed: start.elapsed(),
        })
    }
}

impl Accelerator<u32> for WgpuAccelerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, geometry: Geometry) -> Result<()> {
        let limit = self.runtime.max_workgroups() as usize;
        if geometry.work_groups > limit {
            return Err(Error::config(format!(
                "{} allows {} work-groups per dispatch, configured {}",
                self.name, limit, geometry.work_groups
            )));
        }
        let workgroup_size = u32::try_from(geometry.work_items).map_err(|_| {
            Error::config(format!("work_items {} does not fit u32", geometry.work_items))
        })?;
        self.kernel = Some(self.source.compile(self.runtime.device(), workgroup_size)?);
        self.work_groups = geometry.work_groups;
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            unified_memory: false,
            shared_worklist: false,
            compute_units: self.work_groups,
        }
    }

    fn launch<'scope, 'env>(
        &'env self,
        scope: &'scope Scope<'scope, 'env>,
        work: DeviceWork<'env>,
        out: &'env ResultBuffer<u32>,
    ) -> Result<LaunchHandle<'scope>> {
        let range = match work {
            DeviceWork::Partitioned { partitioner, .. } if partitioner.is_dynamic() => {
                return Err(Error::accelerator(format!(
                    "{} cannot claim from a host worklist",
                    self.name
                )))
            }
            DeviceWork::Partitioned { partitioner, .. } => partitioner.accelerator_range(),
            DeviceWork::Range(range) => range,
        };
        if range.end > out.len() {
            return Err(Error::schedule(format!(
                "device work {:?} outside result buffer of {} slots",
                range,
                out.len()
            )));
        }
        if range.is_empty() {
            return Ok(LaunchHandle::ready(Ok(DeviceReport::default())));
        }

        let handle = thread::Builder::new()
            .name("coexec-wgpu".to_string())
            .spawn_scoped(scope, move || self.execute(range, out))
            .map_err(|e| Error::accelerator(format!("failed to start GPU thread: {}", e)))?;
        Ok(LaunchHandle::spawned(handle))
    }
}
