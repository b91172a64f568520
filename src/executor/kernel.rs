use crate::error::Result;
use crate::partition::TaskIndex;

/// Per-task computation run by host workers and simulated devices.
///
/// Called concurrently from several threads on disjoint indices, so
/// implementations must not rely on call order. Any closure
/// `Fn(TaskIndex) -> Result<T>` is a kernel.
pub trait Kernel<T>: Send + Sync {
    fn execute(&self, task: TaskIndex) -> Result<T>;
}

impl<T, F> Kernel<T> for F
where
    F: Fn(TaskIndex) -> Result<T> + Send + Sync,
{
    #[inline]
    fn execute(&self, task: TaskIndex) -> Result<T> {
        self(task)
    }
}

/// Adapt a kernel that cannot fail.
pub fn infallible<T, F>(f: F) -> impl Fn(TaskIndex) -> Result<T> + Send + Sync
where
    F: Fn(TaskIndex) -> T + Send + Sync,
{
    move |task| Ok(f(task))
}
