use super::{Accelerator, Capabilities, DeviceReport, DeviceWork, Geometry, LaunchHandle};
use crate::buffer::ResultBuffer;
use crate::error::{Error, Result};
use crate::executor::{run_lane, Kernel, PanicInfo};
use crate::partition::{Lane, TaskIndex};
use parking_lot::Mutex;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, Scope};
use std::time::{Duration, Instant};

/// Device emulated on host threads.
///
/// Each launch spawns one device thread that fans out into
/// `compute_units` work-group threads. Group `g` runs as `Lane::Device(g)`
/// with a stride of `compute_units`, so under a static split the groups
/// interleave through `[cut, n_tasks)` and under dynamic partitioning they
/// claim from the shared worklist exactly like host workers.
///
/// The constructor's `compute_units` is only a starting point: runners
/// call [`configure`](Accelerator::configure) with the configured geometry,
/// which replaces it.
pub struct SimulatedAccelerator<K> {
    name: String,
    kernel: K,
    compute_units: usize,
    work_items: usize,
    unified_memory: bool,
    task_delay: Option<Duration>,
    launches: Mutex<Vec<Range<TaskIndex>>>,
}

impl<K> SimulatedAccelerator<K> {
    pub fn new(kernel: K, compute_units: usize) -> Self {
        Self {
            name: "simulated".to_string(),
            kernel,
            compute_units,
            work_items: 1,
            unified_memory: true,
            task_delay: None,
            launches: Mutex::new(Vec::new()),
        }
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Discrete memory forces the executor to give the device its own
    /// buffer and merge afterwards.
    pub fn with_unified_memory(mut self, unified: bool) -> Self {
        self.unified_memory = unified;
        self
    }

    /// Sleep before every task, to model a slower device.
    pub fn with_task_delay(mut self, delay: Duration) -> Self {
        self.task_delay = Some(delay);
        self
    }

    /// Index span covered by each launch so far. Partitioned launches record
    /// the accelerator range of the partitioner.
    pub fn launches(&self) -> Vec<Range<TaskIndex>> {
        self.launches.lock().clone()
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().len()
    }

    pub fn geometry(&self) -> Geometry {
        Geometry {
            work_groups: self.compute_units,
            work_items: self.work_items,
        }
    }

    fn run_group<T>(
        &self,
        group: usize,
        work: &DeviceWork<'_>,
        out: &ResultBuffer<T>,
        stop: &AtomicBool,
    ) -> Result<usize>
    where
        K: Kernel<T>,
    {
        let stride = self.compute_units;
        let delayed = |task: TaskIndex| -> Result<T> {
            if let Some(delay) = self.task_delay {
                thread::sleep(delay);
            }
            self.kernel.execute(task)
        };

        match work {
            DeviceWork::Partitioned {
                partitioner,
                worklist,
            } => run_lane(
                Lane::Device(group),
                stride,
                partitioner,
                worklist,
                &delayed,
                out,
                stop,
            ),
            DeviceWork::Range(range) => {
                let mut executed = 0;
                let mut task = range.start.saturating_add(group);
                while task < range.end {
                    if stop.load(Ordering::Acquire) {
                        break;
                    }
                    out.write(task, delayed(task)?)?;
                    executed += 1;
                    task = task.saturating_add(stride);
                }
                Ok(executed)
            }
        }
    }
}

impl<T, K> Accelerator<T> for SimulatedAccelerator<K>
where
    T: Send + Sync,
    K: Kernel<T>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, geometry: Geometry) -> Result<()> {
        if geometry.work_items == 0 {
            return Err(Error::config(format!("{} needs work_items > 0", self.name)));
        }
        self.compute_units = geometry.work_groups;
        self.work_items = geometry.work_items;
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            unified_memory: self.unified_memory,
            shared_worklist: true,
            compute_units: self.compute_units,
        }
    }

    fn launch<'scope, 'env>(
        &'env self,
        scope: &'scope Scope<'scope, 'env>,
        work: DeviceWork<'env>,
        out: &'env ResultBuffer<T>,
    ) -> Result<LaunchHandle<'scope>> {
        let span = match &work {
            DeviceWork::Partitioned { partitioner, .. } => partitioner.accelerator_range(),
            DeviceWork::Range(range) => range.clone(),
        };
        if span.end > out.len() {
            return Err(Error::schedule(format!(
                "device work {:?} outside result buffer of {} slots",
                span,
                out.len()
            )));
        }
        if self.compute_units == 0 {
            if work.max_tasks() > 0 {
                return Err(Error::accelerator(format!(
                    "{} has no compute units for {} tasks",
                    self.name,
                    work.max_tasks()
                )));
            }
            return Ok(LaunchHandle::ready(Ok(DeviceReport::default())));
        }
        self.launches.lock().push(span);

        let handle = thread::Builder::new()
            .name(format!("{}-device", self.name))
            .spawn_scoped(scope, move || {
                let start = Instant::now();
                let stop = AtomicBool::new(false);
                let outcomes: Vec<Result<usize>> = thread::scope(|s| {
                    let stop = &stop;
                    let work = &work;
                    let groups: Vec<_> = (0..self.compute_units)
                        .map(|group| {
                            s.spawn(move || {
                                let outcome = self.run_group(group, work, out, stop);
                                if outcome.is_err() {
                                    stop.store(true, Ordering::Release);
                                }
                                outcome
                            })
                        })
                        .collect();
                    groups
                        .into_iter()
                        .map(|g| {
                            g.join().unwrap_or_else(|payload| {
                                Err(PanicInfo::from_payload(payload).into_accelerator_error())
                            })
                        })
                        .collect()
                });

                let per_group = outcomes.into_iter().collect::<Result<Vec<_>>>()?;
                let report = DeviceReport {
                    tasks_executed: per_group.iter().sum(),
                    elapsed: start.elapsed(),
                };
                tracing::trace!(
                    device = %self.name,
                    tasks = report.tasks_executed,
                    "device launch complete"
                );
                Ok(report)
            })
            .map_err(|e| Error::accelerator(format!("failed to start device thread: {}", e)))?;

        Ok(LaunchHandle::spawned(handle))
    }
}

impl<K> std::fmt::Debug for SimulatedAccelerator<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedAccelerator")
            .field("name", &self.name)
            .field("compute_units", &self.compute_units)
            .field("work_items", &self.work_items)
            .field("unified_memory", &self.unified_memory)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::infallible;
    use crate::partition::{Partitioner, Worklist};

    #[test]
    fn test_static_launch_covers_accelerator_range() {
        let device = SimulatedAccelerator::new(infallible(|i| i + 1000), 4);
        let p = Partitioner::new(100, 0.3);
        let w = Worklist::new();
        let out: ResultBuffer<usize> = ResultBuffer::new(100);

        let report = thread::scope(|s| {
            let work = DeviceWork::Partitioned {
                partitioner: &p,
                worklist: &w,
            };
            device.launch(s, work, &out).unwrap().wait().unwrap()
        });

        assert_eq!(report.tasks_executed, 70);
        assert_eq!(out.written(), 70);
        assert_eq!(out.first_missing(), Some(0));
        assert_eq!(out.get(30), Some(&1030));
        assert_eq!(device.launches(), vec![30..100]);
    }

    #[test]
    fn test_range_launch() {
        let device = SimulatedAccelerator::new(infallible(|i| i as u32), 3);
        let out: ResultBuffer<u32> = ResultBuffer::new(20);

        let report = thread::scope(|s| {
            device
                .launch(s, DeviceWork::Range(5..12), &out)
                .unwrap()
                .wait()
                .unwrap()
        });

        assert_eq!(report.tasks_executed, 7);
        assert!((5..12).all(|i| out.get(i) == Some(&(i as u32))));
        assert!(!out.is_written(4) && !out.is_written(12));
    }

    #[test]
    fn test_launch_returns_before_device_finishes() {
        let device = SimulatedAccelerator::new(infallible(|i| i), 1)
            .with_task_delay(Duration::from_millis(20));
        let out: ResultBuffer<usize> = ResultBuffer::new(5);

        thread::scope(|s| {
            let handle = device.launch(s, DeviceWork::Range(0..5), &out).unwrap();
            // five sequential 20ms tasks cannot be done yet
            assert!(!handle.is_finished());
            assert_eq!(handle.wait().unwrap().tasks_executed, 5);
        });
        assert!(out.ensure_complete().is_ok());
    }

    #[test]
    fn test_kernel_panic_surfaces_as_accelerator_error() {
        let device = SimulatedAccelerator::new(
            |i: usize| -> Result<usize> {
                if i == 3 {
                    panic!("bad group");
                }
                Ok(i)
            },
            2,
        );
        let out: ResultBuffer<usize> = ResultBuffer::new(6);

        let err = thread::scope(|s| {
            device
                .launch(s, DeviceWork::Range(0..6), &out)
                .unwrap()
                .wait()
                .unwrap_err()
        });
        assert!(matches!(err, Error::Accelerator(ref m) if m.contains("bad group")));
    }

    #[test]
    fn test_configure_replaces_compute_units() {
        let mut device = SimulatedAccelerator::new(infallible(|i| i), 8);
        Accelerator::<usize>::configure(
            &mut device,
            Geometry {
                work_groups: 3,
                work_items: 16,
            },
        )
        .unwrap();
        assert_eq!(Accelerator::<usize>::capabilities(&device).compute_units, 3);
        assert_eq!(device.geometry().work_items, 16);

        let zero_items = Geometry {
            work_groups: 3,
            work_items: 0,
        };
        assert!(Accelerator::<usize>::configure(&mut device, zero_items).is_err());
    }

    #[test]
    fn test_zero_compute_units() {
        let device = SimulatedAccelerator::new(infallible(|i| i), 0);
        let out: ResultBuffer<usize> = ResultBuffer::new(4);
        thread::scope(|s| {
            assert!(device.launch(s, DeviceWork::Range(0..4), &out).is_err());
            let empty = device.launch(s, DeviceWork::Range(4..4), &out).unwrap();
            assert_eq!(empty.wait().unwrap().tasks_executed, 0);
        });
        assert_eq!(device.launch_count(), 0);
    }

    #[test]
    fn test_range_past_buffer_is_rejected() {
        let device = SimulatedAccelerator::new(infallible(|i| i), 2);
        let out: ResultBuffer<usize> = ResultBuffer::new(4);
        let err = thread::scope(|s| device.launch(s, DeviceWork::Range(2..6), &out).unwrap_err());
        assert!(err.is_schedule_defect());
    }
}
