//! In-memory register file and fake clock for driving the Volta HAL in
//! tests, here and in the crates layered on top of it.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::vec::Vec;

use magma_hal::{RegisterIo, Timer};

// A panicking test thread must not hide the register state from the rest
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Register file; scripted reads are consumed before falling back to the
/// last written value
#[derive(Debug, Default)]
pub struct FakeRegs {
    values: Mutex<BTreeMap<u32, u32>>,
    scripts: Mutex<BTreeMap<u32, VecDeque<u32>>>,
    writes: Mutex<Vec<(u32, u32)>>,
}

impl FakeRegs {
    /// All registers read 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a register without recording a write
    pub fn set(&self, offset: u32, value: u32) {
        lock(&self.values).insert(offset, value);
    }

    /// Queue values returned by the next reads of `offset`
    pub fn script(&self, offset: u32, reads: &[u32]) {
        lock(&self.scripts)
            .entry(offset)
            .or_default()
            .extend(reads.iter().copied());
    }

    /// Current value, ignoring scripts
    pub fn get(&self, offset: u32) -> u32 {
        lock(&self.values).get(&offset).copied().unwrap_or(0)
    }

    /// Every value written to `offset`, oldest first
    pub fn writes_to(&self, offset: u32) -> Vec<u32> {
        lock(&self.writes)
            .iter()
            .filter(|(o, _)| *o == offset)
            .map(|(_, v)| *v)
            .collect()
    }
}

impl RegisterIo for FakeRegs {
    fn read32(&self, offset: u32) -> u32 {
        if let Some(value) = lock(&self.scripts)
            .get_mut(&offset)
            .and_then(VecDeque::pop_front)
        {
            return value;
        }
        self.get(offset)
    }

    fn write32(&self, offset: u32, value: u32) {
        lock(&self.writes).push((offset, value));
        self.set(offset, value);
    }
}

/// Clock that only moves when someone delays
#[derive(Debug, Default)]
pub struct FakeTimer {
    now: AtomicU64,
}

impl FakeTimer {
    /// Total time spent in [`Timer::delay_us`]
    pub fn elapsed_us(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

impl Timer for FakeTimer {
    fn now_us(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn delay_us(&self, us: u64) {
        self.now.fetch_add(us, Ordering::SeqCst);
    }
}
