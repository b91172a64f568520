//! Host-side execution.
//!
//! The [`Kernel`] trait is the per-task contract shared by host workers and
//! simulated devices; [`HostPool`] runs a fixed set of named workers over
//! the partitioner's host lanes.

pub mod host_pool;
pub mod kernel;
pub mod panic_handler;

pub use host_pool::{HostPool, HostReport};
pub use kernel::{infallible, Kernel};
pub use panic_handler::{PanicHandler, PanicInfo};

pub(crate) use host_pool::run_lane;
