use super::{configure_device, launch_range, scratch_buffer};
use crate::accel::Accelerator;
use crate::buffer::ResultBuffer;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::partition::TaskIndex;
use std::ops::Range;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub windows: usize,
    pub tasks: usize,
    pub elapsed: Duration,
}

/// Feeds a task pool to the accelerator in fixed-size windows.
///
/// Before each launch the host staging hook is called with the window's
/// range (typically to fill the device's input queue); the device then
/// consumes the window and its results land in the pool at the window's
/// offset. The last window may be shorter.
pub struct BatchRunner<T, A> {
    window: usize,
    accelerator: A,
    output: ResultBuffer<T>,
    device_output: Option<ResultBuffer<T>>,
}

impl<T, A> BatchRunner<T, A>
where
    T: Send + Sync,
    A: Accelerator<T>,
{
    pub fn new(
        config: &Config,
        n_tasks: usize,
        window: usize,
        mut accelerator: A,
    ) -> Result<Self> {
        config.validate()?;
        if window == 0 {
            return Err(Error::config("batch window must be > 0"));
        }
        if config.work_groups == 0 && n_tasks > 0 {
            return Err(Error::config("batch windows need an accelerator"));
        }
        let caps = configure_device::<T, _>(config, &mut accelerator)?;
        let device_output = scratch_buffer(config, &caps, accelerator.name(), n_tasks)?;

        Ok(Self {
            window,
            accelerator,
            output: ResultBuffer::new(n_tasks),
            device_output,
        })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Windows over the pool in launch order.
    pub fn windows(&self) -> impl Iterator<Item = Range<TaskIndex>> {
        let n_tasks = self.output.len();
        let window = self.window;
        (0..n_tasks)
            .step_by(window)
            .map(move |offset| offset..(offset + window).min(n_tasks))
    }

    pub fn accelerator(&self) -> &A {
        &self.accelerator
    }

    pub fn run<H>(&mut self, mut stage: H) -> Result<BatchReport>
    where
        H: FnMut(Range<TaskIndex>) -> Result<()>,
    {
        let start = Instant::now();
        self.output.reset();
        if let Some(scratch) = self.device_output.as_mut() {
            scratch.reset();
        }

        let windows: Vec<_> = self.windows().collect();
        let mut tasks = 0;
        for range in &windows {
            stage(range.clone())?;
            let report = launch_range(
                &self.accelerator,
                range.clone(),
                &self.output,
                self.device_output.as_mut(),
            )?;
            tracing::trace!(offset = range.start, len = range.len(), "window consumed");
            tasks += report.tasks_executed;
        }

        self.output.ensure_complete()?;
        Ok(BatchReport {
            windows: windows.len(),
            tasks,
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

impl<T, A> std::fmt::Debug for BatchRunner<T, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("n_tasks", &self.output.len())
            .field("window", &self.window)
            .field("unified", &self.device_output.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accel::SimulatedAccelerator;
    use crate::executor::infallible;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_windows_cover_pool() {
        let accel = SimulatedAccelerator::new(infallible(|i| i * i), 2).with_unified_memory(false);
        let mut runner: BatchRunner<usize, _> =
            BatchRunner::new(&Config::default(), 10, 4, accel).unwrap();
        assert_eq!(runner.windows().collect::<Vec<_>>(), vec![0..4, 4..8, 8..10]);

        let mut staged = Vec::new();
        let report = runner
            .run(|range| {
                staged.push(range);
                Ok(())
            })
            .unwrap();

        assert_eq!(report.windows, 3);
        assert_eq!(report.tasks, 10);
        assert_eq!(staged, vec![0..4, 4..8, 8..10]);
        assert_eq!(runner.accelerator().launches(), staged);
        assert_eq!(runner.into_results().unwrap()[9], 81);
    }

    #[test]
    fn test_staging_happens_before_launch() {
        // the device reads what the host staged for its window
        let queue = Arc::new(Mutex::new(vec![0usize; 6]));
        let device_queue = queue.clone();
        let accel = SimulatedAccelerator::new(infallible(move |i| device_queue.lock()[i] + 1), 1);
        let config = Config::builder().unified_memory(true).build().unwrap();
        let mut runner: BatchRunner<usize, _> = BatchRunner::new(&config, 6, 2, accel).unwrap();

        runner
            .run(|range| {
                let mut q = queue.lock();
                for i in range {
                    q[i] = i * 100;
                }
                Ok(())
            })
            .unwrap();
        assert_eq!(
            runner.results().to_vec().unwrap(),
            vec![1, 101, 201, 301, 401, 501]
        );
    }

    #[test]
    fn test_stage_error_stops_run() {
        let accel = SimulatedAccelerator::new(infallible(|i| i), 1);
        let config = Config::builder().unified_memory(true).build().unwrap();
        let mut runner: BatchRunner<usize, _> = BatchRunner::new(&config, 6, 3, accel).unwrap();
        let err = runner
            .run(|range| {
                if range.start == 3 {
                    Err(Error::input("queue overflow"))
                } else {
                    Ok(())
                }
            })
            .unwrap_err();
        assert!(matches!(err, Error::Input(_)));
        assert_eq!(runner.accelerator().launch_count(), 1);
    }

    #[test]
    fn test_zero_window_rejected() {
        let accel = SimulatedAccelerator::new(infallible(|i| i), 1);
        assert!(BatchRunner::<usize, _>::new(&Config::default(), 6, 0, accel).is_err());
    }

    #[test]
    fn test_windows_need_a_device() {
        let config = Config::builder().alpha(1.0).work_groups(0).build().unwrap();
        let accel = SimulatedAccelerator::new(infallible(|i| i), 1);
        assert!(matches!(
            BatchRunner::<usize, _>::new(&config, 6, 2, accel),
            Err(Error::Config(_))
        ));
    }
}
