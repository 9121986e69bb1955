//! Host clock for HAL polling.

use std::thread;
use std::time::{Duration, Instant};

use magma_hal::Timer;

/// Monotonic clock backed by [`Instant`], sleeping delays
#[derive(Debug, Clone, Copy)]
pub struct StdTimer {
    epoch: Instant,
}

impl StdTimer {
    /// Start a clock at zero
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for StdTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer for StdTimer {
    fn now_us(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_micros()).unwrap_or(u64::MAX)
    }

    fn delay_us(&self, us: u64) {
        thread::sleep(Duration::from_micros(us));
    }
}
