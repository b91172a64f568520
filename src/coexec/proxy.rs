use super::{check_dynamic, configure_device, launch_range, scratch_buffer};
use crate::accel::Accelerator;
use crate::buffer::ResultBuffer;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::{run_lane, Kernel, PanicHandler, PanicInfo};
use crate::partition::{Lane, Partitioner, Worklist};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ScopedJoinHandle};
use std::time::{Duration, Instant};

fn join_proxy(
    spawned: std::io::Result<ScopedJoinHandle<'_, Result<usize>>>,
    side: &str,
    stop: &AtomicBool,
) -> Result<usize> {
    match spawned {
        Ok(handle) => handle
            .join()
            .unwrap_or_else(|payload| Err(PanicInfo::from_payload(payload).into_worker_error())),
        Err(e) => {
            stop.store(true, Ordering::Release);
            Err(Error::Other(format!("failed to spawn {} proxy: {}", side, e)))
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProxyReport {
    pub host_tasks: usize,
    pub device_tasks: usize,
    pub elapsed: Duration,
}

/// Whole-task co-execution with one proxy thread per side.
///
/// The host proxy runs as `Lane::Host(0)` and the device proxy as
/// `Lane::Device(0)`, both with stride 1. Under a static split the host
/// proxy alone drains `[0, cut)` and the device proxy walks
/// `[cut, n_tasks)`, issuing one launch per task. Under dynamic
/// partitioning both proxies claim tasks from the shared cursor, so the
/// faster side takes more of them.
pub struct ProxyExecutor<T, A> {
    partitioner: Partitioner,
    worklist: Worklist,
    accelerator: A,
    output: ResultBuffer<T>,
    device_output: Option<ResultBuffer<T>>,
    thread_name_prefix: String,
    panic_handler: PanicHandler,
}

impl<T, A> ProxyExecutor<T, A>
where
    T: Send + Sync,
    A: Accelerator<T>,
{
    pub fn new(config: &Config, n_tasks: usize, mut accelerator: A) -> Result<Self> {
        config.validate()?;

        let partitioner = Partitioner::new(n_tasks, config.alpha);
        if config.work_groups == 0 && partitioner.is_dynamic() && n_tasks > 0 {
            return Err(Error::config("dynamic proxies need an accelerator"));
        }
        let caps = configure_device::<T, _>(config, &mut accelerator)?;
        check_dynamic(config, &partitioner, &caps, accelerator.name())?;
        let device_output = scratch_buffer(config, &caps, accelerator.name(), n_tasks)?;

        Ok(Self {
            partitioner,
            worklist: Worklist::new(),
            accelerator,
            output: ResultBuffer::new(n_tasks),
            device_output,
            thread_name_prefix: config.thread_name_prefix.clone(),
            panic_handler: PanicHandler::new(),
        })
    }

    pub fn partitioner(&self) -> &Partitioner {
        &self.partitioner
    }

    pub fn accelerator(&self) -> &A {
        &self.accelerator
    }

    /// Run both proxies to completion over a freshly reset domain.
    pub fn run<K>(&mut self, host_kernel: &K) -> Result<ProxyReport>
    where
        K: Kernel<T> + ?Sized,
    {
        let start = Instant::now();
        self.worklist.reset();
        self.output.reset();
        if let Some(device_output) = self.device_output.as_mut() {
            device_output.reset();
        }

        let partitioner = &self.partitioner;
        let worklist = &self.worklist;
        let output = &self.output;
        let accelerator = &self.accelerator;
        let panic_handler = &self.panic_handler;
        let mut device_output = self.device_output.as_mut();
        let prefix = &self.thread_name_prefix;
        let stop = AtomicBool::new(false);
        let stop = &stop;

        let (host, device) = thread::scope(|s| {
            let host = thread::Builder::new()
                .name(format!("{}-host-proxy", prefix))
                .spawn_scoped(s, move || {
                    let lane = Lane::Host(0);
                    let outcome = panic_handler
                        .execute(|| {
                            run_lane(lane, 1, partitioner, worklist, host_kernel, output, stop)
                        })
                        .unwrap_or_else(|info| Err(info.into_worker_error()));
                    if outcome.is_err() {
                        stop.store(true, Ordering::Release);
                    }
                    outcome
                });

            let device = thread::Builder::new()
                .name(format!("{}-device-proxy", prefix))
                .spawn_scoped(s, move || {
                    let lane = Lane::Device(0);
                    let mut executed = 0;
                    let mut task = partitioner.first(lane, worklist);
                    while partitioner.has_more(lane, task) {
                        if stop.load(Ordering::Acquire) {
                            break;
                        }
                        let scratch = device_output.as_deref_mut();
                        if let Err(e) = launch_range(accelerator, task..task + 1, output, scratch) {
                            stop.store(true, Ordering::Release);
                            return Err(e);
                        }
                        executed += 1;
                        task = partitioner.next(task, 1, worklist);
                    }
                    Ok(executed)
                });

            let host = join_proxy(host, "host", stop);
            let device = join_proxy(device, "device", stop);
            (host, device)
        });

        let device_tasks = device?;
        let host_tasks = host?;
        self.output.ensure_complete()?;

        tracing::debug!(host_tasks, device_tasks, "proxies joined");
        Ok(ProxyReport {
            host_tasks,
            device_tasks,
            elapsed: start.elapsed(),
        })
    }

    pub fn results(&self) -> &ResultBuffer<T> {
        &self.output
    }

    pub fn into_results(self) -> Result<Vec<T>> {
        self.output.into_vec()
    }
}

impl<T, A> std::fmt::Debug for ProxyExecutor<T, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyExecutor")
            .field("partitioner", &self.partitioner)
            .field("unified", &self.device_output.is_none())
            .finish()
    }
}
