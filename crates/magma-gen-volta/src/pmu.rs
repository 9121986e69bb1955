//! # GV11B PMU Mutex
//!
//! Token handshake against the PMU mutex block:
//!
//! 1. Read a fresh token from the mutex-id generator
//! 2. Write it into the mutex slot
//! 3. Read the slot back; if it still holds our token we own the mutex,
//!    otherwise give the token back and retry

use magma_core::{Error, Result};
use magma_hal::mmio::registers::{self, pmu_mutex};
use magma_hal::{HwMutex, MutexId, MutexToken, RegisterIo, Timer};

/// Handshake attempts before giving up
pub const MUTEX_ACQUIRE_RETRIES: u32 = 40;
/// Back-off between attempts
const RETRY_DELAY_MIN_US: u64 = 20;
const RETRY_DELAY_MAX_US: u64 = 40;

/// GV11B PMU mutex HAL
#[derive(Debug)]
pub struct Gv11bPmuMutex<R, T> {
    regs: R,
    timer: T,
}

impl<R: RegisterIo, T: Timer> Gv11bPmuMutex<R, T> {
    /// Create the HAL
    pub fn new(regs: R, timer: T) -> Self {
        Self { regs, timer }
    }

    fn slot(id: MutexId) -> Result<u32> {
        let index = id.index();
        if index >= registers::PWR_PMU_MUTEX_COUNT {
            return Err(Error::InvalidParameter);
        }
        Ok(registers::pwr_pmu_mutex(index))
    }

    fn owner(&self, slot: u32) -> u32 {
        self.regs.read32(slot) & pmu_mutex::VALUE_MASK
    }
}

impl<R: RegisterIo, T: Timer> HwMutex for Gv11bPmuMutex<R, T> {
    fn acquire(&self, id: MutexId) -> Result<MutexToken> {
        let slot = Self::slot(id)?;

        for _ in 0..MUTEX_ACQUIRE_RETRIES {
            let token = self.regs.read32(registers::PWR_PMU_MUTEX_ID) & pmu_mutex::VALUE_MASK;
            if token == pmu_mutex::ID_VALUE_INIT || token == pmu_mutex::ID_VALUE_NOT_AVAIL {
                log::warn!("pmu: fail to generate mutex token: val {:#010x}", token);
                self.timer.delay_range_us(RETRY_DELAY_MIN_US, RETRY_DELAY_MAX_US);
                continue;
            }

            self.regs.write32(slot, token);
            if self.owner(slot) == token {
                log::trace!("pmu: mutex {:?} acquired, token {:#x}", id, token);
                return Ok(MutexToken::new(token));
            }

            log::debug!("pmu: mutex {:?} contended, releasing token {:#x}", id, token);
            self.regs.write32(registers::PWR_PMU_MUTEX_ID_RELEASE, token);
            self.timer.delay_range_us(RETRY_DELAY_MIN_US, RETRY_DELAY_MAX_US);
        }

        Err(Error::HwMutexUnavailable)
    }

    fn release(&self, id: MutexId, token: MutexToken) -> Result<()> {
        let slot = Self::slot(id)?;
        let owner = self.owner(slot);

        if owner != token.raw() {
            log::error!(
                "pmu: requester {:#010x} NOT match owner {:#010x}",
                token.raw(),
                owner
            );
            return Err(Error::HwMutexNotOwner);
        }

        self.regs.write32(slot, pmu_mutex::VALUE_INITIAL_LOCK);
        self.regs
            .write32(registers::PWR_PMU_MUTEX_ID_RELEASE, token.raw());
        log::trace!("pmu: mutex {:?} released", id);
        Ok(())
    }
}
