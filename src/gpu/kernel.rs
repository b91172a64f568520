//! WGSL compute kernels over task ranges.

use super::buffer::GpuBuffer;
use crate::error::{Error, Result};

/// Placeholder replaced by the configured work-group size before the shader
/// is compiled.
pub const WORKGROUP_SIZE_TOKEN: &str = "{{WORKGROUP_SIZE}}";

/// Kernel writing one 32-bit word per task.
///
/// The shader must expose these bindings and must ignore invocations with
/// `id.x >= params.count`:
///
/// ```wgsl
/// struct Params { offset: u32, count: u32 }
/// @group(0) @binding(0) var<uniform> params: Params;
/// @group(0) @binding(1) var<storage, read_write> out: array<u32>;
///
/// @compute @workgroup_size({{WORKGROUP_SIZE}})
/// fn main(@builtin(global_invocation_id) id: vec3<u32>) {
///     if (id.x >= params.count) { return; }
///     let task = params.offset + id.x;
///     out[id.x] = task * 2u;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct WordKernel {
    source: String,
    entry_point: String,
}

impl WordKernel {
    pub fn new<S: Into<String>>(source: S) -> Self {
        Self {
            source: source.into(),
            entry_point: "main".to_string(),
        }
    }

    pub fn with_entry_point<S: Into<String>>(mut self, entry_point: S) -> Self {
        self.entry_point = entry_point.into();
        self
    }

    pub fn compile(&self, device: &wgpu::Device, workgroup_size: u32) -> Result<CompiledKernel> {
        if workgroup_size == 0 {
            return Err(Error::gpu("work-group size must be > 0"));
        }
        let source = self
            .source
            .replace(WORKGROUP_SIZE_TOKEN, &workgroup_size.to_string());

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("coexec-word-kernel"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("coexec-word-pipeline"),
            layout: None,
            module: &module,
            entry_point: &self.entry_point,
        });
        let bind_group_layout = pipeline.get_bind_group_layout(0);

        Ok(CompiledKernel {
            pipeline,
            bind_group_layout,
            workgroup_size,
        })
    }
}

/// Compiled pipeline ready for dispatch.
#[derive(Debug)]
pub struct CompiledKernel {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    workgroup_size: u32,
}

impl CompiledKernel {
    pub fn workgroup_size(&self) -> u32 {
        self.workgroup_size
    }

    /// Work-groups needed to cover `count` tasks.
    pub fn groups_for(&self, count: usize) -> usize {
        let size = self.workgroup_size as usize;
        (count + size - 1) / size
    }

    /// Record and submit one dispatch over `[offset, offset + count)`,
    /// writing word `i` of `output` for task `offset + i`.
    pub fn dispatch(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        output: &GpuBuffer,
        offset: u32,
        count: u32,
        max_groups: u32,
    ) -> Result<()> {
        let groups = self.groups_for(count as usize);
        if groups > max_groups as usize {
            return Err(Error::gpu(format!(
                "{} tasks need {} work-groups, device allows {}",
                count, groups, max_groups
            )));
        }

        let mut params = Vec::with_capacity(8);
        params.extend_from_slice(&offset.to_le_bytes());
        params.extend_from_slice(&count.to_le_bytes());
        let params = wgpu::util::DeviceExt::create_buffer_init(
            device,
            &wgpu::util::BufferInitDescriptor {
                label: Some("coexec-kernel-params"),
                contents: &params,
                usage: wgpu::BufferUsages::UNIFORM,
            },
        );

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("coexec-kernel-bind-group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: output.buffer().as_entire_binding(),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("coexec-kernel-encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("coexec-compute-pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            if groups > 0 {
                pass.dispatch_workgroups(groups as u32, 1, 1);
            }
        }
        queue.submit(Some(encoder.finish()));
        Ok(())
    }
}
