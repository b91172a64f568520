use super::{check_dynamic, configure_device, scratch_buffer};
use crate::accel::{Accelerator, Capabilities, DeviceReport, DeviceWork};
use crate::buffer::{merge_partitioned, MergeReport, ResultBuffer};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::{HostPool, HostReport, Kernel, PanicInfo};
use crate::partition::{Partitioner, Worklist};
use crate::telemetry::{Metrics, MetricsSnapshot};
use std::thread;
use std::time::{Duration, Instant};

/// Consumer of the merged result, run once after the measured repetitions.
pub trait Verify<T> {
    fn verify(&self, results: &ResultBuffer<T>) -> std::result::Result<(), String>;
}

impl<T, F> Verify<T> for F
where
    F: Fn(&ResultBuffer<T>) -> std::result::Result<(), String>,
{
    fn verify(&self, results: &ResultBuffer<T>) -> std::result::Result<(), String> {
        self(results)
    }
}

/// What happened in one iteration.
#[derive(Debug, Clone)]
pub struct IterationReport {
    /// Position since the start of the current run.
    pub iteration: usize,
    pub warmup: bool,
    pub host: HostReport,
    pub device: DeviceReport,
    /// `None` when the device wrote straight into the shared slots.
    pub merge: Option<MergeReport>,
    pub elapsed: Duration,
}

impl IterationReport {
    pub fn host_tasks(&self) -> usize {
        self.host.tasks_executed()
    }

    pub fn device_tasks(&self) -> usize {
        self.device.tasks_executed
    }
}

/// Summary of `warmup + reps` iterations.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub iterations: usize,
    pub last: IterationReport,
    pub metrics: MetricsSnapshot,
}

/// Splits a task domain between a host pool and one accelerator and runs
/// it for a configured number of iterations.
///
/// Each iteration goes through the same phases:
///
/// 1. reset: clear the result slots and rewind the worklist cursor
/// 2. dispatch: launch the device, then start the host pool on an umbrella
///    thread
/// 3. barrier: wait for the device and join the umbrella; both are always
///    joined even when one side fails
/// 4. merge: with discrete memory, copy the device's slots for the
///    iteration's accelerator range into the result
///
/// The partitioner is fixed at construction, so the range merged is always
/// the one the device was given.
pub struct CoExecutor<T, A> {
    config: Config,
    partitioner: Partitioner,
    worklist: Worklist,
    pool: HostPool,
    accelerator: A,
    capabilities: Capabilities,
    output: ResultBuffer<T>,
    device_output: Option<ResultBuffer<T>>,
    metrics: Metrics,
    completed: usize,
}

impl<T, A> CoExecutor<T, A>
where
    T: Send + Sync,
    A: Accelerator<T>,
{
    pub fn new(config: Config, n_tasks: usize, mut accelerator: A) -> Result<Self> {
        config.validate()?;
        let capabilities = configure_device::<T, _>(&config, &mut accelerator)?;

        let partitioner = Partitioner::new(n_tasks, config.alpha);
        check_dynamic(&config, &partitioner, &capabilities, accelerator.name())?;
        let device_output = scratch_buffer(&config, &capabilities, accelerator.name(), n_tasks)?;
        let pool = HostPool::new(&config)?;

        tracing::debug!(
            n_tasks,
            cut = partitioner.cut(),
            strategy = ?partitioner.strategy(),
            host_threads = pool.num_threads(),
            device = accelerator.name(),
            unified = device_output.is_none(),
            "co-executor ready"
        );

        Ok(Self {
            output: ResultBuffer::new(n_tasks),
            metrics: Metrics::new()?,
            config,
            partitioner,
            worklist: Worklist::new(),
            pool,
            accelerator,
            capabilities,
            device_output,
            completed: 0,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn partitioner(&self) -> &Partitioner {
        &self.partitioner
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn accelerator(&self) -> &A {
        &self.accelerator
    }

    pub fn is_unified(&self) -> bool {
        self.device_output.is_none()
    }

    fn device_enabled(&self) -> bool {
        self.config.work_groups > 0
    }

    /// Run one full iteration and leave its merged output in
    /// [`results`](Self::results).
    pub fn run_iteration<K>(&mut self, kernel: &K) -> Result<IterationReport>
    where
        K: Kernel<T> + ?Sized,
    {
        let start = Instant::now();
        let iteration = self.completed;
        let warmup = iteration < self.config.warmup;

        // reset
        self.worklist.reset();
        self.output.reset();
        if let Some(device_output) = self.device_output.as_mut() {
            device_output.reset();
        }

        let partitioner = self.partitioner;
        let device_range = partitioner.accelerator_range();
        let launch_device =
            self.device_enabled() && (partitioner.is_dynamic() || !device_range.is_empty());
        tracing::debug!(iteration, warmup, launch_device, "dispatch");

        // dispatch + barrier
        let (host, device) = {
            let worklist = &self.worklist;
            let output = &self.output;
            let device_target = self.device_output.as_ref().unwrap_or(output);
            let accelerator = &self.accelerator;
            let pool = &self.pool;
            let umbrella_name = format!("{}-umbrella", self.config.thread_name_prefix);

            thread::scope(|s| {
                let launch = if launch_device {
                    let work = DeviceWork::Partitioned {
                        partitioner: &partitioner,
                        worklist,
                    };
                    match accelerator.launch(s, work, device_target) {
                        Ok(handle) => Some(handle),
                        Err(e) => return (Ok(HostReport::default()), Err(e)),
                    }
                } else {
                    None
                };

                let umbrella = thread::Builder::new()
                    .name(umbrella_name)
                    .spawn_scoped(s, || pool.run(&partitioner, worklist, kernel, output));

                let device = match launch {
                    Some(handle) => handle.wait(),
                    None => Ok(DeviceReport::default()),
                };
                let host = match umbrella {
                    Ok(handle) => handle.join().unwrap_or_else(|payload| {
                        Err(PanicInfo::from_payload(payload).into_worker_error())
                    }),
                    Err(e) => Err(Error::Other(format!("failed to spawn host umbrella: {}", e))),
                };
                (host, device)
            })
        };
        let device = device?;
        let host = host?;
        tracing::debug!(
            iteration,
            host_tasks = host.tasks_executed(),
            device_tasks = device.tasks_executed,
            "barrier"
        );

        // merge
        let merge = match self.device_output.as_mut() {
            Some(device_output) if launch_device => {
                let merge_start = Instant::now();
                let report = merge_partitioned(&mut self.output, device_output, device_range)?;
                if !warmup {
                    self.metrics.record_merge(merge_start.elapsed(), report.copied);
                }
                tracing::debug!(iteration, copied = report.copied, kept = report.kept, "merge");
                Some(report)
            }
            _ => None,
        };

        self.output.ensure_complete()?;

        let elapsed = start.elapsed();
        if warmup {
            self.metrics.record_warmup();
        } else {
            self.metrics
                .record_iteration(elapsed, host.tasks_executed(), device.tasks_executed);
        }
        self.completed += 1;

        Ok(IterationReport {
            iteration,
            warmup,
            host,
            device,
            merge,
            elapsed,
        })
    }

    /// Run `warmup + reps` iterations from a fresh measurement.
    pub fn run<K>(&mut self, kernel: &K) -> Result<RunReport>
    where
        K: Kernel<T> + ?Sized,
    {
        self.completed = 0;
        self.metrics.reset();

        let total = self.config.total_iterations();
        let mut last = None;
        for _ in 0..total {
            last = Some(self.run_iteration(kernel)?);
        }
        let last = last.ok_or_else(|| Error::config("no iterations configured"))?;

        let metrics = self.metrics.snapshot();
        tracing::info!(
            iterations = total,
            warmup = self.config.warmup,
            host_tasks = last.host_tasks(),
            device_tasks = last.device_tasks(),
            avg_iteration_ns = metrics.avg_iteration_ns,
            "run complete"
        );

        Ok(RunReport {
            iterations: total,
            last,
            metrics,
        })
    }

    /// [`run`](Self::run), then hand the merged result to `verifier`.
    pub fn run_and_verify<K, V>(&mut self, kernel: &K, verifier: &V) -> Result<RunReport>
    where
        K: Kernel<T> + ?Sized,
        V: Verify<T> + ?Sized,
    {
        let report = self.run(kernel)?;
        verifier.verify(&self.output).map_err(Error::verification)?;
        Ok(report)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Merged output of the last iteration.
    pub fn results(&self) -> &ResultBuffer<T> {
        &self.output
    }

    pub fn into_results(self) -> Result<Vec<T>> {
        self.output.into_vec()
    }
}

impl<T, A> std::fmt::Debug for CoExecutor<T, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoExecutor")
            .field("partitioner", &self.partitioner)
            .field("host_threads", &self.pool.num_threads())
            .field("capabilities", &self.capabilities)
            .field("unified", &self.device_output.is_none())
            .field("completed", &self.completed)
            .finish()
    }
}
