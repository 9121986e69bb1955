//! # PMU Hardware Mutexes
//!
//! Mutual exclusion shared between the host driver and PMU firmware.
//!
//! Acquisition is a bounded handshake and may fail. Callers that only use
//! the mutex to keep firmware from observing half-updated state proceed
//! without it rather than block on the co-processor.

use magma_core::Result;

/// PMU mutex table entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MutexId {
    /// Reserved
    Rsvd1 = 0,
    /// GPU user
    GpUser = 1,
    /// BIOS queue
    QueueBios = 2,
    /// SMI queue
    QueueSmi = 3,
    /// GP mutex
    GpMutex = 4,
    /// I2C bus
    I2c = 5,
    /// RM lock
    RmLock = 6,
    /// Message box
    MsgBox = 7,
    /// FIFO scheduling state
    Fifo = 8,
    /// Power gating
    Pg = 9,
    /// Graphics
    Gr = 10,
    /// Clocks
    Clk = 11,
}

impl MutexId {
    /// Slot index in the hardware mutex array
    #[inline]
    pub const fn index(self) -> u32 {
        self as u32
    }
}

/// Ownership token returned by a successful acquire
///
/// Must be handed back to [`HwMutex::release`]; dropping it leaks the
/// hardware mutex and starves the firmware.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a held hardware mutex must be released"]
pub struct MutexToken(u32);

impl MutexToken {
    /// Wrap a raw token value
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw token value
    #[inline]
    pub const fn raw(&self) -> u32 {
        self.0
    }
}

/// Hardware mutex arbitration
pub trait HwMutex: Send + Sync {
    /// Try to take `id`, bounded number of handshake attempts
    fn acquire(&self, id: MutexId) -> Result<MutexToken>;

    /// Release `id`; only valid with the token from a successful acquire
    fn release(&self, id: MutexId, token: MutexToken) -> Result<()>;
}
