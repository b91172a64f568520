use super::{Strategy, TaskIndex, Worklist};
use std::ops::Range;

/// Who is asking the partitioner for work.
///
/// Under a static split the host lanes drain `[0, cut)` and device lanes
/// drain `[cut, n_tasks)`. A pool of host threads uses one `Host` lane per
/// thread and strides by the pool size; the two-proxy layout uses a single
/// `Host(0)` and a single `Device(0)` lane with stride 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    Host(usize),
    Device(usize),
}

impl Lane {
    pub fn id(&self) -> usize {
        match *self {
            Lane::Host(id) | Lane::Device(id) => id,
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self, Lane::Host(_))
    }
}

/// Decides which task indices run on the host and which on the accelerator.
///
/// Created once per run from the task count and the host fraction `alpha`,
/// read-only afterwards. The only per-iteration state is the [`Worklist`]
/// passed into the claiming methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partitioner {
    n_tasks: usize,
    cut: usize,
    strategy: Strategy,
}

impl Partitioner {
    pub fn new(n_tasks: usize, alpha: f64) -> Self {
        let strategy = Strategy::from_alpha(alpha);
        let cut = match strategy {
            Strategy::Static => ((n_tasks as f64 * alpha).round() as usize).min(n_tasks),
            Strategy::Dynamic => 0,
        };
        debug_assert!(cut <= n_tasks);

        Self {
            n_tasks,
            cut,
            strategy,
        }
    }

    pub fn n_tasks(&self) -> usize {
        self.n_tasks
    }

    /// Static boundary: host below, accelerator at or above. Always 0 under
    /// dynamic partitioning.
    pub fn cut(&self) -> usize {
        self.cut
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn is_dynamic(&self) -> bool {
        self.strategy == Strategy::Dynamic
    }

    /// First index for `lane`. Dynamic claims from the worklist and ignores
    /// the lane.
    #[inline]
    pub fn first(&self, lane: Lane, worklist: &Worklist) -> TaskIndex {
        match self.strategy {
            Strategy::Dynamic => worklist.claim(),
            Strategy::Static => match lane {
                Lane::Host(worker) => worker,
                Lane::Device(group) => self.cut.saturating_add(group),
            },
        }
    }

    /// Index following `previous`. Static lanes advance by `stride` (the
    /// number of lanes sharing the range); dynamic claims again.
    #[inline]
    pub fn next(&self, previous: TaskIndex, stride: usize, worklist: &Worklist) -> TaskIndex {
        match self.strategy {
            Strategy::Dynamic => worklist.claim(),
            Strategy::Static => previous.saturating_add(stride),
        }
    }

    /// Whether `candidate` is still inside the range `lane` is responsible
    /// for. Host lanes stop at the cut; device lanes (and every lane under
    /// dynamic claiming) stop at `n_tasks`.
    #[inline]
    pub fn has_more(&self, lane: Lane, candidate: TaskIndex) -> bool {
        match self.strategy {
            Strategy::Dynamic => candidate < self.n_tasks,
            Strategy::Static => candidate < self.bound(lane),
        }
    }

    fn bound(&self, lane: Lane) -> usize {
        match lane {
            Lane::Host(_) => self.cut,
            Lane::Device(_) => self.n_tasks,
        }
    }

    /// Indices owned by the host. Empty under dynamic partitioning.
    pub fn host_range(&self) -> Range<TaskIndex> {
        0..self.cut
    }

    /// Indices owned by the accelerator. The full domain under dynamic
    /// partitioning, since ownership is only known after claiming.
    pub fn accelerator_range(&self) -> Range<TaskIndex> {
        self.cut..self.n_tasks
    }

    /// Iterate the indices `lane` would process in a static split with
    /// `stride` lanes of the same kind. Dynamic schedules depend on the
    /// interleaving and are not enumerable.
    pub fn static_schedule(&self, lane: Lane, stride: usize) -> Option<StaticSchedule> {
        if self.is_dynamic() || stride == 0 {
            return None;
        }
        let start = match lane {
            Lane::Host(worker) => worker,
            Lane::Device(group) => self.cut.saturating_add(group),
        };
        Some(StaticSchedule {
            next: start,
            stride,
            bound: self.bound(lane),
        })
    }
}

/// Deterministic per-lane index sequence of a static split.
#[derive(Debug, Clone)]
pub struct StaticSchedule {
    next: TaskIndex,
    stride: usize,
    bound: usize,
}

impl Iterator for StaticSchedule {
    type Item = TaskIndex;

    fn next(&mut self) -> Option<TaskIndex> {
        if self.next >= self.bound {
            return None;
        }
        let current = self.next;
        self.next = self.next.saturating_add(self.stride);
        Some(current)
    }
}
