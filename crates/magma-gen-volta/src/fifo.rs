//! # GV11B FIFO
//!
//! Preempt trigger, runlist scheduling control and preempt completion
//! polling for Volta.
//!
//! ## Completion
//!
//! The preempt register's pending bit is not authoritative on Volta. A
//! preempt is complete once the context is no longer resident on any PBDMA
//! or engine the runlist serves, so every unit is polled in turn:
//!
//! ```text
//! for pbdma in runlist.pbdmas:   poll until !resident(pbdma)
//! for engine in runlist.engines: poll until !resident(engine)
//!                                (resident + stall intr pending => reset)
//! ```

use arrayvec::ArrayVec;
use magma_core::{EngineMask, Error, IdType, Result, Runlist, RunlistEnable, TsgId};
use magma_hal::mmio::{insert_field, registers};
use magma_hal::{EngineStatus, FifoHal, PbdmaStatus, RegisterIo, Timer};

/// Maximum number of engines on a GV11B FIFO
pub const MAX_ENGINES: usize = 8;

// =============================================================================
// CONFIG
// =============================================================================

/// Poll budget for one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Time allowed for one PBDMA or engine to unload
    pub timeout_us: u64,
    /// First back-off delay
    pub delay_min_us: u64,
    /// Back-off ceiling
    pub delay_max_us: u64,
}

impl PollConfig {
    /// Default minimum back-off
    pub const DELAY_MIN_US: u64 = 10;
    /// Default back-off ceiling
    pub const DELAY_MAX_US: u64 = 1000;

    /// Poll budget with the default back-off window
    pub const fn with_timeout_us(timeout_us: u64) -> Self {
        Self {
            timeout_us,
            delay_min_us: Self::DELAY_MIN_US,
            delay_max_us: Self::DELAY_MAX_US,
        }
    }
}

/// Engine known to the FIFO
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineInfo {
    /// Engine ID (index into the engine status array)
    pub engine_id: u32,
    /// Stalling interrupt bit(s) of this engine in PMC_INTR_0
    pub intr_mask: u32,
}

// =============================================================================
// POLL OUTCOME
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Poll {
    Done,
    Pending,
}

// =============================================================================
// GV11B FIFO
// =============================================================================

/// GV11B FIFO HAL
#[derive(Debug)]
pub struct Gv11bFifo<R, T> {
    regs: R,
    timer: T,
    engines: ArrayVec<EngineInfo, MAX_ENGINES>,
    poll: PollConfig,
}

impl<R: RegisterIo, T: Timer> Gv11bFifo<R, T> {
    /// Create the HAL; engines beyond [`MAX_ENGINES`] are ignored
    pub fn new(regs: R, timer: T, engines: &[EngineInfo], poll: PollConfig) -> Self {
        let mut table = ArrayVec::new();
        for engine in engines {
            if table.try_push(*engine).is_err() {
                log::warn!("gv11b: engine {} dropped, table full", engine.engine_id);
            }
        }

        Self {
            regs,
            timer,
            engines: table,
            poll,
        }
    }

    /// Poll budget in use
    pub fn poll_config(&self) -> PollConfig {
        self.poll
    }

    fn engine(&self, engine_id: u32) -> Option<&EngineInfo> {
        self.engines.iter().find(|e| e.engine_id == engine_id)
    }

    /// Run `step` with exponential back-off until it reports done or the
    /// poll budget runs out. Returns whether it finished.
    fn poll_with_backoff(&self, mut step: impl FnMut() -> Poll) -> bool {
        let deadline = self.timer.now_us().saturating_add(self.poll.timeout_us);
        let mut delay = self.poll.delay_min_us.max(1);

        loop {
            if step() == Poll::Done {
                return true;
            }
            if self.timer.now_us() >= deadline {
                return false;
            }
            self.timer.delay_range_us(delay, delay.saturating_mul(2));
            delay = delay.saturating_mul(2).min(self.poll.delay_max_us.max(1));
        }
    }

    fn poll_pbdma(&self, id: u32, id_type: IdType, pbdma_id: u32) -> bool {
        self.poll_with_backoff(|| {
            let raw = self.regs.read32(registers::fifo_pbdma_status(pbdma_id));
            let status = PbdmaStatus::decode(raw);
            if status.is_resident(id, id_type) {
                log::trace!(
                    "gv11b: pbdma {} still holds {} ({:?})",
                    pbdma_id,
                    id,
                    status.chsw_status()
                );
                Poll::Pending
            } else {
                Poll::Done
            }
        })
    }

    fn poll_engine(
        &self,
        id: u32,
        id_type: IdType,
        engine_id: u32,
        reset_eng_bitmask: &mut EngineMask,
        is_last_attempt: bool,
    ) -> Result<()> {
        let intr_mask = self.engine(engine_id).map_or(0, |e| e.intr_mask);
        let mut flagged = false;

        let done = self.poll_with_backoff(|| {
            let raw = self.regs.read32(registers::fifo_engine_status(engine_id));
            let status = EngineStatus::decode(raw);
            if !status.is_resident(id, id_type) {
                return Poll::Done;
            }
            if status.ctxsw_in_progress() {
                log::trace!("gv11b: engine {} switching ({:?})", engine_id, status.ctx_status());
                return Poll::Pending;
            }

            // Loaded and stalled on an interrupt: the context can never be
            // saved, hand the engine to recovery.
            let intr = self.regs.read32(registers::PMC_INTR_0);
            if intr_mask != 0 && intr & intr_mask != 0 {
                log::info!("gv11b: engine {} has stall intr pending, flag for reset", engine_id);
                flagged = true;
                return Poll::Done;
            }
            Poll::Pending
        });

        if flagged {
            reset_eng_bitmask.insert(engine_id);
        }
        if done {
            return Ok(());
        }
        if !is_last_attempt {
            return Err(Error::TryAgain);
        }

        log::error!("gv11b: preempt timeout on engine {} for id {}", engine_id, id);
        reset_eng_bitmask.insert(engine_id);
        Err(Error::EngineHang(engine_id))
    }
}

impl<R: RegisterIo, T: Timer> FifoHal for Gv11bFifo<R, T> {
    fn preempt_trigger(&self, id: u32, id_type: IdType) {
        let type_bits = match id_type {
            IdType::Tsg => registers::preempt::TYPE_TSG,
            IdType::Channel => registers::preempt::TYPE_CHANNEL,
        };
        let value = insert_field(type_bits, id & registers::preempt::ID_MASK, 0, 11);
        log::trace!("gv11b: preempt {:?} {} ({:#010x})", id_type, id, value);
        self.regs.write32(registers::FIFO_PREEMPT, value);
    }

    fn preempt_runlists(&self, runlist_mask: u32) {
        log::trace!("gv11b: runlist preempt mask {:#x}", runlist_mask);
        self.regs.write32(registers::FIFO_RUNLIST_PREEMPT, runlist_mask);
    }

    fn is_preempt_pending(
        &self,
        runlist: &mut Runlist,
        id: u32,
        id_type: IdType,
        is_last_attempt: bool,
    ) -> Result<()> {
        let mut ret = Ok(());

        for pbdma_id in runlist.pbdma_bitmask.iter() {
            if self.poll_pbdma(id, id_type, pbdma_id) {
                continue;
            }
            let err = if is_last_attempt {
                log::error!("gv11b: preempt timeout on pbdma {} for id {}", pbdma_id, id);
                Error::PbdmaHang(pbdma_id)
            } else {
                Error::TryAgain
            };
            if ret.is_ok() {
                ret = Err(err);
            }
        }

        runlist.reset_eng_bitmask = EngineMask::EMPTY;
        for engine_id in runlist.eng_bitmask.iter() {
            let err = self.poll_engine(
                id,
                id_type,
                engine_id,
                &mut runlist.reset_eng_bitmask,
                is_last_attempt,
            );
            if ret.is_ok() {
                ret = err;
            }
        }

        ret
    }

    fn preempt_poll_pbdma(&self, tsg: TsgId, pbdma_id: u32) -> Result<()> {
        if self.poll_pbdma(tsg.0, IdType::Tsg, pbdma_id) {
            Ok(())
        } else {
            log::error!("gv11b: tsg {} still on pbdma {}", tsg, pbdma_id);
            Err(Error::Timeout)
        }
    }

    fn set_runlist_state(&self, runlist_mask: u32, state: RunlistEnable) {
        let value = match state {
            RunlistEnable::Disabled => runlist_mask,
            RunlistEnable::Enabled => 0,
        };
        self.regs
            .write32_masked(registers::FIFO_SCHED_DISABLE, value, runlist_mask);
    }
}
