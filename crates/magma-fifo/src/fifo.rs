//! # FIFO Device State
//!
//! Everything the preemption paths need for one GPU: the generation HAL,
//! the PMU mutex, the recovery hook, the runlist table, the deferred
//! interrupt counters and the chip capabilities resolved at attach.

use magma_core::{ChipInfo, Errata, Result};
use magma_hal::{FifoHal, HwMutex};

use crate::cic::Cic;
use crate::config::FifoConfig;
use crate::rc::RecoveryHandler;
use crate::runlist::{RunlistTable, RunlistsGuard};

/// FIFO subsystem of one GPU
#[derive(Debug)]
pub struct Fifo<H, M, R> {
    pub(crate) hal: H,
    pub(crate) pmu: M,
    pub(crate) recovery: R,
    pub(crate) runlists: RunlistTable,
    pub(crate) cic: Cic,
    pub(crate) config: FifoConfig,
    pub(crate) chip: ChipInfo,
    pub(crate) errata: Errata,
}

impl<H: FifoHal, M: HwMutex, R: RecoveryHandler> Fifo<H, M, R> {
    /// Bring up the FIFO subsystem
    ///
    /// Fails if `config` cannot be honored.
    pub fn new(
        hal: H,
        pmu: M,
        recovery: R,
        runlists: RunlistTable,
        chip: ChipInfo,
        config: FifoConfig,
    ) -> Result<Self> {
        config.validate()?;
        let errata = chip.errata();

        log::info!(
            "fifo: {} runlists (mask {:#x}), ctxsw timeout {} ms over {} attempts, \
             errata {:?}, {:?}",
            runlists.len(),
            runlists.active_mask(),
            config.ctxsw_timeout_ms,
            config.preempt_retry_count,
            errata,
            chip.platform
        );

        Ok(Self {
            hal,
            pmu,
            recovery,
            runlists,
            cic: Cic::new(),
            config,
            chip,
            errata,
        })
    }

    /// Generation HAL
    pub fn hal(&self) -> &H {
        &self.hal
    }

    /// PMU mutex
    pub fn pmu(&self) -> &M {
        &self.pmu
    }

    /// Recovery hook
    pub fn recovery(&self) -> &R {
        &self.recovery
    }

    /// Deferred interrupt counters, shared with the interrupt handlers
    pub fn cic(&self) -> &Cic {
        &self.cic
    }

    /// Runlist table
    pub fn runlists(&self) -> &RunlistTable {
        &self.runlists
    }

    /// Lock a set of runlists ahead of an RC preempt
    pub fn lock_runlists(&self, mask: u32) -> Result<RunlistsGuard<'_>> {
        self.runlists.lock_runlists(mask)
    }

    /// Configuration in use
    pub fn config(&self) -> &FifoConfig {
        &self.config
    }

    /// Chip descriptor
    pub fn chip(&self) -> ChipInfo {
        self.chip
    }

    /// Errata active on this device
    pub fn errata(&self) -> Errata {
        self.errata
    }

    /// Capability query
    #[inline]
    pub fn is_errata_present(&self, erratum: Errata) -> bool {
        self.errata.is_present(erratum)
    }
}
