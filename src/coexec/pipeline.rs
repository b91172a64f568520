use super::{configure_device, launch_range, scratch_buffer};
use crate::accel::Accelerator;
use crate::buffer::ResultBuffer;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::{PanicHandler, PanicInfo};
use crate::partition::TaskIndex;
use crate::util::Backoff;
use std::sync::atomic::{AtomicBool, AtomicI8, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const PENDING: i8 = 0;
const READY: i8 = 1;
const ABANDONED: i8 = -1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub completed: usize,
    pub abandoned: usize,
    pub elapsed: Duration,
}

/// Two-stage pipeline: the accelerator runs stage one for each task in
/// order, the host runs stage two as soon as a task's first stage is
/// published.
///
/// Each task has a ready flag. The device thread sets it after the task's
/// intermediate value is in place; host workers poll it with [`Backoff`].
/// If the device stage fails, every task it had not reached is flagged as
/// abandoned, so no host worker is left waiting.
pub struct Pipeline<M, O, A> {
    accelerator: A,
    intermediate: ResultBuffer<M>,
    device_scratch: Option<ResultBuffer<M>>,
    output: ResultBuffer<O>,
    ready: Box<[AtomicI8]>,
    host_threads: usize,
    thread_name_prefix: String,
    panic_handler: PanicHandler,
}

impl<M, O, A> Pipeline<M, O, A>
where
    M: Send + Sync,
    O: Send + Sync,
    A: Accelerator<M>,
{
    pub fn new(config: &Config, n_tasks: usize, mut accelerator: A) -> Result<Self> {
        config.validate()?;
        if config.work_groups == 0 && n_tasks > 0 {
            return Err(Error::config("pipeline needs an accelerator for its first stage"));
        }
        let caps = configure_device::<M, _>(config, &mut accelerator)?;
        let device_scratch = scratch_buffer(config, &caps, accelerator.name(), n_tasks)?;

        Ok(Self {
            accelerator,
            intermediate: ResultBuffer::new(n_tasks),
            device_scratch,
            output: ResultBuffer::new(n_tasks),
            ready: (0..n_tasks).map(|_| AtomicI8::new(PENDING)).collect(),
            host_threads: config.host_threads(),
            thread_name_prefix: config.thread_name_prefix.clone(),
            panic_handler: PanicHandler::new(),
        })
    }

    pub fn n_tasks(&self) -> usize {
        self.ready.len()
    }

    pub fn accelerator(&self) -> &A {
        &self.accelerator
    }

    /// Run both stages over every task. `host_stage` gets the task index and
    /// the device's stage-one value for it.
    pub fn run<F>(&mut self, host_stage: &F) -> Result<PipelineReport>
    where
        F: Fn(TaskIndex, &M) -> Result<O> + Sync,
    {
        let start = Instant::now();
        self.intermediate.reset();
        self.output.reset();
        if let Some(scratch) = self.device_scratch.as_mut() {
            scratch.reset();
        }
        for flag in self.ready.iter_mut() {
            *flag.get_mut() = PENDING;
        }

        let n_tasks = self.ready.len();
        let accelerator = &self.accelerator;
        let intermediate = &self.intermediate;
        let output = &self.output;
        let ready = &self.ready;
        let panic_handler = &self.panic_handler;
        let prefix = &self.thread_name_prefix;
        let mut scratch = self.device_scratch.as_mut();
        let host_threads = self.host_threads;
        let stop = AtomicBool::new(false);
        let stop = &stop;

        let abandon_from = |first: TaskIndex| {
            for flag in &ready[first..] {
                flag.store(ABANDONED, Ordering::Release);
            }
        };

        let (device, host) = thread::scope(|s| {
            let device = thread::Builder::new()
                .name(format!("{}-device-stage", prefix))
                .spawn_scoped(s, move || -> Result<()> {
                    for task in 0..n_tasks {
                        if stop.load(Ordering::Acquire) {
                            abandon_from(task);
                            return Ok(());
                        }
                        let launched = launch_range(
                            accelerator,
                            task..task + 1,
                            intermediate,
                            scratch.as_deref_mut(),
                        );
                        if let Err(e) = launched {
                            tracing::warn!(
                                task,
                                error = %e,
                                "device stage failed, abandoning remaining tasks"
                            );
                            abandon_from(task);
                            return Err(e);
                        }
                        ready[task].store(READY, Ordering::Release);
                    }
                    Ok(())
                });

            let workers: Vec<_> = (0..host_threads)
                .map(|w| {
                    thread::Builder::new()
                        .name(format!("{}-{}", prefix, w))
                        .spawn_scoped(s, move || -> Result<usize> {
                            let outcome = panic_handler
                                .execute(|| {
                                    host_stage_lane(
                                        w,
                                        host_threads,
                                        ready,
                                        intermediate,
                                        output,
                                        host_stage,
                                    )
                                })
                                .unwrap_or_else(|info| Err(info.into_worker_error()));
                            if outcome.is_err() {
                                stop.store(true, Ordering::Release);
                            }
                            outcome
                        })
                })
                .collect();

            let device = match device {
                Ok(handle) => handle.join().unwrap_or_else(|payload| {
                    abandon_from(0);
                    Err(PanicInfo::from_payload(payload).into_accelerator_error())
                }),
                Err(e) => {
                    abandon_from(0);
                    Err(Error::accelerator(format!("failed to start device stage: {}", e)))
                }
            };
            let host: Result<Vec<usize>> = workers
                .into_iter()
                .map(|spawned| match spawned {
                    Ok(handle) => handle.join().unwrap_or_else(|payload| {
                        Err(PanicInfo::from_payload(payload).into_worker_error())
                    }),
                    Err(e) => Err(Error::Other(format!(
                        "failed to spawn host stage worker: {}",
                        e
                    ))),
                })
                .collect();
            (device, host)
        });

        let abandoned = self
            .ready
            .iter()
            .filter(|flag| flag.load(Ordering::Acquire) == ABANDONED)
            .count();
        device?;
        let completed: usize = host?.iter().sum();
        if abandoned == 0 {
            self.output.ensure_complete()?;
        }

        Ok(PipelineReport {
            completed,
            abandoned,
            elapsed: start.elapsed(),
        })
    }

    pub fn results(&self) -> &ResultBuffer<O> {
        &self.output
    }

    /// Stage-one values of the last run.
    pub fn intermediate(&self) -> &ResultBuffer<M> {
        &self.intermediate
    }

    pub fn into_results(self) -> Result<Vec<O>> {
        self.output.into_vec()
    }
}

/// Host worker `w` of `stride`: waits on each of its tasks in turn and runs
/// stage two. Stops quietly at the first abandoned task.
fn host_stage_lane<M, O, F>(
    w: usize,
    stride: usize,
    ready: &[AtomicI8],
    intermediate: &ResultBuffer<M>,
    output: &ResultBuffer<O>,
    host_stage: &F,
) -> Result<usize>
where
    F: Fn(TaskIndex, &M) -> Result<O>,
{
    let mut completed = 0;
    for task in (w..ready.len()).step_by(stride.max(1)) {
        let mut backoff = Backoff::new();
        loop {
            match ready[task].load(Ordering::Acquire) {
                READY => break,
                ABANDONED => return Ok(completed),
                _ => backoff.snooze(),
            }
        }

        let value = intermediate.get(task).ok_or_else(|| {
            Error::schedule(format!("task {} flagged ready without a stage-one value", task))
        })?;
        output.write(task, host_stage(task, value)?)?;
        completed += 1;
    }
    Ok(completed)
}

impl<M, O, A> std::fmt::Debug for Pipeline<M, O, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("n_tasks", &self.ready.len())
            .field("host_threads", &self.host_threads)
            .field("unified", &self.device_scratch.is_none())
            .finish()
    }
}
