//! Escalating wait for threads polling a flag set by another thread.

use std::hint::spin_loop;
use std::thread;
use std::time::Duration;

/// Spin, then yield, then park briefly. Used where a consumer polls a
/// per-task ready flag that a producer thread publishes.
#[derive(Debug, Default)]
pub struct Backoff {
    step: u32,
}

impl Backoff {
    const SPIN_LIMIT: u32 = 6;
    const YIELD_LIMIT: u32 = 10;
    const PARK: Duration = Duration::from_micros(50);

    pub fn new() -> Self {
        Self { step: 0 }
    }

    pub fn reset(&mut self) {
        self.step = 0;
    }

    /// Wait one round. Each call waits at least as long as the previous one
    /// until the park phase is reached.
    pub fn snooze(&mut self) {
        if self.step <= Self::SPIN_LIMIT {
            for _ in 0..(1u32 << self.step) {
                spin_loop();
            }
        } else if self.step <= Self::YIELD_LIMIT {
            thread::yield_now();
        } else {
            thread::park_timeout(Self::PARK);
        }

        if self.step <= Self::YIELD_LIMIT {
            self.step += 1;
        }
    }

    /// True once spinning and yielding have been exhausted.
    pub fn is_parking(&self) -> bool {
        self.step > Self::YIELD_LIMIT
    }
}
