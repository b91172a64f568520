use super::kernel::Kernel;
use super::panic_handler::{PanicHandler, PanicInfo};
use crate::buffer::ResultBuffer;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::partition::{Lane, Partitioner, Worklist};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

#[cfg(target_os = "linux")]
fn pin_thread_to_core(core_id: usize) {
    let core_id = core_id % num_cpus::get().max(1);
    unsafe {
        let mut cpuset: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_SET(core_id, &mut cpuset);
        let result = libc::sched_setaffinity(
            0, // current thread
            std::mem::size_of::<libc::cpu_set_t>(),
            &cpuset,
        );
        if result != 0 {
            tracing::warn!(
                thread = std::thread::current().name().unwrap_or("unknown"),
                core_id,
                "failed to pin host worker"
            );
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn pin_thread_to_core(core_id: usize) {
    tracing::debug!(core_id, "core pinning is only supported on linux");
}

/// Drive one lane to exhaustion: claim with `first`/`next`, stop when
/// `has_more` says the lane's range is done, write each result into its own
/// slot. Returns the number of tasks this lane executed.
///
/// `stop` is raised by a sibling that failed; remaining lanes bail out at
/// their next claim since the iteration is lost anyway.
pub(crate) fn run_lane<T, K>(
    lane: Lane,
    stride: usize,
    partitioner: &Partitioner,
    worklist: &Worklist,
    kernel: &K,
    out: &ResultBuffer<T>,
    stop: &AtomicBool,
) -> Result<usize>
where
    K: Kernel<T> + ?Sized,
{
    let mut executed = 0;
    let mut task = partitioner.first(lane, worklist);
    while partitioner.has_more(lane, task) {
        if stop.load(Ordering::Acquire) {
            break;
        }
        let value = kernel.execute(task)?;
        out.write(task, value)?;
        executed += 1;
        task = partitioner.next(task, stride, worklist);
    }
    Ok(executed)
}

/// Outcome of one pass of the host pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostReport {
    /// Tasks executed by each worker, indexed by worker id.
    pub per_worker: Vec<usize>,
    pub elapsed: Duration,
}

impl HostReport {
    pub fn tasks_executed(&self) -> usize {
        self.per_worker.iter().sum()
    }
}

/// Fixed-size set of host workers.
///
/// Threads are scoped to a single [`run`](HostPool::run): each call spawns
/// the workers, lets them drain their lanes and joins them before
/// returning, so a run never outlives the buffers it writes.
#[derive(Debug)]
pub struct HostPool {
    num_threads: usize,
    thread_name_prefix: String,
    stack_size: Option<usize>,
    pin_workers: bool,
    panic_handler: PanicHandler,
}

impl HostPool {
    pub fn new(config: &Config) -> Result<Self> {
        let num_threads = config.host_threads();
        if num_threads == 0 {
            return Err(Error::config("need at least 1 host thread"));
        }

        Ok(Self {
            num_threads,
            thread_name_prefix: config.thread_name_prefix.clone(),
            stack_size: config.stack_size,
            pin_workers: config.pin_workers,
            panic_handler: PanicHandler::new(),
        })
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Panics caught in workers since the pool was created.
    pub fn panic_count(&self) -> usize {
        self.panic_handler.panic_count()
    }

    /// Run every worker over its lane and wait for all of them.
    ///
    /// Worker `w` uses `Lane::Host(w)` with stride `num_threads`, so under a
    /// static split the workers interleave through `[0, cut)`; under dynamic
    /// partitioning they claim from `worklist` alongside the accelerator.
    /// The first failing worker (by id) determines the returned error.
    pub fn run<T, K>(
        &self,
        partitioner: &Partitioner,
        worklist: &Worklist,
        kernel: &K,
        out: &ResultBuffer<T>,
    ) -> Result<HostReport>
    where
        T: Send + Sync,
        K: Kernel<T> + ?Sized,
    {
        if out.len() != partitioner.n_tasks() {
            return Err(Error::schedule(format!(
                "result buffer has {} slots for {} tasks",
                out.len(),
                partitioner.n_tasks()
            )));
        }

        let start = Instant::now();
        let stride = self.num_threads;
        let stop = AtomicBool::new(false);

        let outcomes: Vec<Result<usize>> = thread::scope(|s| {
            let mut handles = Vec::with_capacity(stride);
            for id in 0..stride {
                let name = format!("{}-{}", self.thread_name_prefix, id);
                let mut builder = thread::Builder::new().name(name);
                if let Some(stack_size) = self.stack_size {
                    builder = builder.stack_size(stack_size);
                }

                let stop = &stop;
                let spawned = builder.spawn_scoped(s, move || {
                    if self.pin_workers {
                        pin_thread_to_core(id);
                    }

                    let lane = Lane::Host(id);
                    let outcome = self
                        .panic_handler
                        .execute(|| {
                            run_lane(lane, stride, partitioner, worklist, kernel, out, stop)
                        })
                        .unwrap_or_else(|info| Err(info.into_worker_error()));

                    match &outcome {
                        Ok(executed) => {
                            tracing::trace!(worker = id, executed, "host lane drained")
                        }
                        Err(_) => stop.store(true, Ordering::Release),
                    }
                    outcome
                });

                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        // already spawned workers are joined when the scope ends
                        stop.store(true, Ordering::Release);
                        return vec![Err(Error::Other(format!(
                            "failed to spawn host worker {}: {}",
                            id, e
                        )))];
                    }
                }
            }

            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|payload| {
                        Err(PanicInfo::from_payload(payload).into_worker_error())
                    })
                })
                .collect()
        });

        let per_worker = outcomes.into_iter().collect::<Result<Vec<_>>>()?;
        Ok(HostReport {
            per_worker,
            elapsed: start.elapsed(),
        })
    }
}
