//! # Timer
//!
//! Time source and delays for register polling.

/// Monotonic time and busy/sleeping delays
pub trait Timer: Send + Sync {
    /// Current monotonic time in microseconds
    fn now_us(&self) -> u64;

    /// Delay for at least `us` microseconds
    fn delay_us(&self, us: u64);

    /// Delay somewhere in `[min_us, max_us]`; implementations may coalesce
    fn delay_range_us(&self, min_us: u64, max_us: u64) {
        let _ = max_us;
        self.delay_us(min_us);
    }
}

impl<T: Timer + ?Sized> Timer for &T {
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }

    fn delay_us(&self, us: u64) {
        (**self).delay_us(us)
    }

    fn delay_range_us(&self, min_us: u64, max_us: u64) {
        (**self).delay_range_us(min_us, max_us)
    }
}
