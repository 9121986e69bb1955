//! # Deferred Interrupt Counters
//!
//! Tracks whether a stalling (and optionally non-stalling) interrupt is
//! still being handled, so other threads can wait for the handler to
//! finish before touching the hardware it services.
//!
//! ## Protocol
//!
//! ```text
//!  top half        set_irq_stall(1)
//!  bottom half     ... handle ...
//!                  stall_handled()      => set_irq_stall(0) + broadcast
//!  any thread      wait_for_stall_interrupts(timeout_ms)
//! ```
//!
//! `pending` is a flag, not a count: overlapping interrupts coalesce. The
//! interrupt controller serializes delivery per class, so each counter has
//! a single writer and plain stores are enough.
//!
//! A timeout of `0` waits without bound.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use magma_core::{Error, Result};

// =============================================================================
// COUNTER
// =============================================================================

/// Pending flag plus the condition its waiters sleep on
#[derive(Debug)]
pub struct DeferredIrqCounter {
    name: &'static str,
    pending: AtomicU32,
    lock: Mutex<()>,
    cond: Condvar,
}

impl DeferredIrqCounter {
    /// Create an idle counter
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            pending: AtomicU32::new(0),
            lock: Mutex::new(()),
            cond: Condvar::new(),
        }
    }

    /// Interrupt class name, for logs
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Store the pending flag (0 or 1)
    pub fn set_pending(&self, value: u32) {
        debug_assert!(value <= 1, "deferred irq flag is 0 or 1");
        self.pending.store(value.min(1), Ordering::SeqCst);
    }

    /// Check whether a handler is still running
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst) != 0
    }

    /// Wake every waiter
    ///
    /// Taking the lock orders the wake-up after any waiter that checked the
    /// flag but has not gone to sleep yet.
    pub fn broadcast(&self) -> Result<()> {
        let _guard = self.lock.lock().map_err(|_| Error::Internal)?;
        self.cond.notify_all();
        Ok(())
    }

    /// Block until the flag drops to 0
    ///
    /// Returns immediately when nothing is pending, `Err(Timeout)` when a
    /// non-zero `timeout_ms` elapses first.
    pub fn wait_for_drain(&self, timeout_ms: u32) -> Result<()> {
        if !self.is_pending() {
            return Ok(());
        }

        let mut guard = self.lock.lock().map_err(|_| Error::Internal)?;

        if timeout_ms == 0 {
            while self.is_pending() {
                guard = self.cond.wait(guard).map_err(|_| Error::Internal)?;
            }
            return Ok(());
        }

        let deadline = Instant::now() + Duration::from_millis(u64::from(timeout_ms));
        while self.is_pending() {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout);
            }
            let (next, _) = self
                .cond
                .wait_timeout(guard, deadline - now)
                .map_err(|_| Error::Internal)?;
            guard = next;
        }
        Ok(())
    }
}

// =============================================================================
// CIC
// =============================================================================

/// Device-wide deferred interrupt tracking
#[derive(Debug)]
pub struct Cic {
    stall: DeferredIrqCounter,
    #[cfg(feature = "nonstall-intr")]
    nonstall: DeferredIrqCounter,
}

impl Cic {
    /// Create with nothing pending
    pub const fn new() -> Self {
        Self {
            stall: DeferredIrqCounter::new("stall"),
            #[cfg(feature = "nonstall-intr")]
            nonstall: DeferredIrqCounter::new("nonstall"),
        }
    }

    /// Stalling interrupt counter
    pub fn stall(&self) -> &DeferredIrqCounter {
        &self.stall
    }

    /// Set the stalling interrupt pending flag
    pub fn set_irq_stall(&self, value: u32) {
        self.stall.set_pending(value);
    }

    /// Wake threads waiting for stalling interrupts to drain
    pub fn broadcast_last_irq_stall(&self) -> Result<()> {
        self.stall.broadcast().map_err(|err| {
            log::error!("cic: last IRQ stall cond_broadcast failed: {}", err);
            err
        })
    }

    /// Bottom half finished with the stalling interrupt
    pub fn stall_handled(&self) {
        self.set_irq_stall(0);
        let _ = self.broadcast_last_irq_stall();
    }

    /// Wait until all stalling interrupts are handled
    pub fn wait_for_stall_interrupts(&self, timeout_ms: u32) -> Result<()> {
        self.stall.wait_for_drain(timeout_ms)
    }

    #[cfg(feature = "nonstall-intr")]
    fn nonstall(&self) -> Option<&DeferredIrqCounter> {
        Some(&self.nonstall)
    }

    #[cfg(not(feature = "nonstall-intr"))]
    fn nonstall(&self) -> Option<&DeferredIrqCounter> {
        None
    }

    /// Set the non-stalling interrupt pending flag
    pub fn set_irq_nonstall(&self, value: u32) {
        if let Some(nonstall) = self.nonstall() {
            nonstall.set_pending(value);
        }
    }

    /// Wake threads waiting for non-stalling interrupts to drain
    pub fn broadcast_last_irq_nonstall(&self) -> Result<()> {
        let Some(nonstall) = self.nonstall() else {
            return Ok(());
        };
        nonstall.broadcast().map_err(|err| {
            log::error!("cic: last IRQ nonstall cond_broadcast failed: {}", err);
            err
        })
    }

    /// Bottom half finished with the non-stalling interrupt
    pub fn nonstall_handled(&self) {
        self.set_irq_nonstall(0);
        let _ = self.broadcast_last_irq_nonstall();
    }

    /// Wait until all non-stalling interrupts are handled
    pub fn wait_for_nonstall_interrupts(&self, timeout_ms: u32) -> Result<()> {
        match self.nonstall() {
            Some(nonstall) => nonstall.wait_for_drain(timeout_ms),
            None => Ok(()),
        }
    }

    /// Best-effort drain of both classes before reset or teardown
    pub fn wait_for_deferred_interrupts(&self) {
        if let Err(err) = self.wait_for_stall_interrupts(0) {
            log::error!("cic: wait for stall interrupts failed: {}", err);
        }
        if let Err(err) = self.wait_for_nonstall_interrupts(0) {
            log::error!("cic: wait for nonstall interrupts failed: {}", err);
        }
    }
}

impl Default for Cic {
    fn default() -> Self {
        Self::new()
    }
}
