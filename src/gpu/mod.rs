//! wgpu backend for the accelerator side.

pub mod accelerator;
pub mod buffer;
pub mod kernel;
pub mod runtime;

pub use accelerator::WgpuAccelerator;
pub use buffer::GpuBuffer;
pub use kernel::{CompiledKernel, WordKernel, WORKGROUP_SIZE_TOKEN};
pub use runtime::GpuRuntime;
