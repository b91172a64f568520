//! Shared claim cursor for dynamic partitioning.

use super::TaskIndex;
use crate::util::CachePadded;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Atomic fetch-and-increment cursor shared by host workers and the
/// accelerator. Padded so the hot counter does not share a cache line with
/// neighbouring data.
#[derive(Debug, Default)]
pub struct Worklist {
    cursor: CachePadded<AtomicUsize>,
}

impl Worklist {
    pub fn new() -> Self {
        Self {
            cursor: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Claim the next index. Every call returns a distinct value until the
    /// next `reset`; callers bound the result against `n_tasks`.
    #[inline]
    pub fn claim(&self) -> TaskIndex {
        self.cursor.fetch_add(1, Ordering::AcqRel)
    }

    /// Rewind to 0. Only valid while no participant is claiming, i.e.
    /// between iterations.
    pub fn reset(&self) {
        self.cursor.store(0, Ordering::Release);
    }

    /// Number of claims handed out since the last reset, including claims
    /// that landed past the end of the domain.
    pub fn claimed(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }
}
