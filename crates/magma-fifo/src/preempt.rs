//! # Preemption
//!
//! Drives the hardware to kick a TSG or channel off its runlist and waits
//! until the hardware confirms it, within a fixed attempt budget.
//!
//! ## One attempt
//!
//! ```text
//! lock(runlist)
//!   [errata 2016608] disable runlist scheduling
//!     try PMU FIFO mutex (failure is not fatal)
//!       preempt trigger
//!       poll PBDMAs and engines
//!     release PMU FIFO mutex if held
//!   [errata 2016608] re-enable runlist scheduling
//! unlock(runlist)
//! ```
//!
//! Every step after the lock is a guard, so scheduling is re-enabled and
//! the mutex released on every exit path, in that order.
//!
//! Only `TryAgain` is retried. Between attempts the caller waits for
//! in-flight stalling interrupts to be handled so the next poll does not
//! read status a handler is still changing.

use magma_core::{ChannelId, Errata, Error, IdType, PreemptTarget, Result, RunlistId, TsgId};
use magma_hal::{FifoHal, HwMutex, MutexId, MutexToken};

use crate::fifo::Fifo;
use crate::rc::RecoveryHandler;
use crate::runlist::{RunlistDisableGuard, RunlistsGuard};

// =============================================================================
// HW MUTEX GUARD
// =============================================================================

/// PMU mutex taken on a best-effort basis
///
/// Acquisition failure leaves the guard empty and the caller proceeds
/// without the mutex. Only a held mutex is released on drop.
#[derive(Debug)]
pub struct HwMutexGuard<'a, M: HwMutex + ?Sized> {
    pmu: &'a M,
    id: MutexId,
    token: Option<MutexToken>,
}

impl<'a, M: HwMutex + ?Sized> HwMutexGuard<'a, M> {
    /// Try to take `id`
    pub fn try_acquire(pmu: &'a M, id: MutexId) -> Self {
        let token = match pmu.acquire(id) {
            Ok(token) => Some(token),
            Err(err) => {
                log::debug!(
                    "fifo: pmu mutex {:?} not acquired ({}), proceeding without it",
                    id,
                    err
                );
                None
            }
        };
        Self { pmu, id, token }
    }

    /// Check if the mutex is held
    #[inline]
    pub fn is_held(&self) -> bool {
        self.token.is_some()
    }
}

impl<M: HwMutex + ?Sized> Drop for HwMutexGuard<'_, M> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            if let Err(err) = self.pmu.release(self.id, token) {
                log::error!("fifo: pmu mutex {:?} release failed: {}", self.id, err);
            }
        }
    }
}

// =============================================================================
// PREEMPT
// =============================================================================

impl<H: FifoHal, M: HwMutex, R: RecoveryHandler> Fifo<H, M, R> {
    /// Preempt a TSG and wait for the hardware to confirm it
    ///
    /// A TSG never bound to a runlist (`RunlistId::INVALID`) has nothing to
    /// preempt and returns `Ok` without touching hardware.
    pub fn preempt_tsg(&self, runlist_id: RunlistId, tsg: TsgId) -> Result<()> {
        self.preempt_id(runlist_id, PreemptTarget::Tsg(tsg))
    }

    /// Preempt a channel
    ///
    /// A channel bound to a TSG is preempted through its TSG.
    pub fn preempt_channel(
        &self,
        runlist_id: RunlistId,
        chid: ChannelId,
        tsg: Option<TsgId>,
    ) -> Result<()> {
        match tsg {
            Some(tsg) => self.preempt_tsg(runlist_id, tsg),
            None => self.preempt_id(runlist_id, PreemptTarget::Channel(chid)),
        }
    }

    /// Context-switch budget of one preempt call, in milliseconds
    pub fn preempt_get_timeout(&self) -> u32 {
        self.config.preempt_timeout_ms()
    }

    fn preempt_id(&self, runlist_id: RunlistId, target: PreemptTarget) -> Result<()> {
        if !runlist_id.is_valid() {
            return Ok(());
        }
        let (id, id_type) = target.id_and_type().ok_or(Error::InvalidParameter)?;
        if !self.runlists.contains(runlist_id) {
            log::error!("fifo: preempt {:?} on unknown runlist {}", target, runlist_id);
            return Err(Error::NotFound);
        }

        let retries = self.config.preempt_retry_count;
        let retry_timeout_ms = self.config.preempt_retry_timeout_ms();
        let disable_runlist = self.is_errata_present(Errata::ERRATA_2016608);

        let mut ret = Err(Error::TryAgain);
        for attempt in 1..=retries {
            let is_last_attempt = attempt == retries;
            ret = self.preempt_attempt(runlist_id, id, id_type, is_last_attempt, disable_runlist);
            if ret != Err(Error::TryAgain) {
                break;
            }

            if let Err(err) = self.cic.wait_for_stall_interrupts(retry_timeout_ms) {
                log::info!("fifo: wait for stall interrupts failed: {}", err);
            }
        }

        // Still switching after the whole budget
        if ret == Err(Error::TryAgain) {
            ret = Err(Error::Timeout);
        }

        if let Err(err) = ret {
            if self.chip.platform.is_silicon() {
                log::error!(
                    "fifo: preempt timed out for {:?} on runlist {} ({}); \
                     ctxsw timeout will trigger recovery if needed",
                    target,
                    runlist_id,
                    err
                );
            } else {
                log::warn!(
                    "fifo: preempt failed for {:?} on runlist {} ({}), starting recovery",
                    target,
                    runlist_id,
                    err
                );
                self.recovery.preempt_timeout(runlist_id, target);
            }
        }

        ret
    }

    fn preempt_attempt(
        &self,
        runlist_id: RunlistId,
        id: u32,
        id_type: IdType,
        is_last_attempt: bool,
        disable_runlist: bool,
    ) -> Result<()> {
        let mut locked = self.runlists.lock(runlist_id)?;
        let mut runlist = RunlistDisableGuard::new(&mut locked, &self.hal, disable_runlist);
        let _mutex = HwMutexGuard::try_acquire(&self.pmu, MutexId::Fifo);

        self.hal.preempt_trigger(id, id_type);
        self.hal
            .is_preempt_pending(&mut runlist, id, id_type, is_last_attempt)
    }

    /// Preempt whole runlists on the recovery path
    ///
    /// The caller already holds the runlist locks. Completion is not polled:
    /// every engine served by a preempted runlist is flagged for reset.
    /// Bits of `runlist_mask` not covered by `runlists` are skipped.
    pub fn preempt_runlists_for_rc(&self, runlists: &mut RunlistsGuard<'_>, runlist_mask: u32) {
        let _mutex = HwMutexGuard::try_acquire(&self.pmu, MutexId::Fifo);

        let unlocked = runlist_mask & !runlists.mask();
        if unlocked != 0 {
            log::warn!("fifo: rc preempt skips runlists {:#x}, not locked", unlocked);
        }
        let mask = runlist_mask & runlists.mask();
        if mask == 0 {
            return;
        }

        self.hal.preempt_runlists(mask);
        for runlist in runlists.iter_mut() {
            if mask & runlist.id.mask() != 0 {
                runlist.flag_all_engines_for_reset();
            }
        }
    }

    /// Wait for a recovered TSG to unload from the PBDMAs of its runlist
    ///
    /// Poll failures are reported and otherwise ignored.
    pub fn poll_tsg_on_pbdma(&self, runlist_id: RunlistId, tsg: TsgId) -> Result<()> {
        if !runlist_id.is_valid() {
            return Ok(());
        }
        let pbdmas = self.runlists.lock(runlist_id)?.pbdma_bitmask;

        for pbdma_id in pbdmas.iter() {
            if let Err(err) = self.hal.preempt_poll_pbdma(tsg, pbdma_id) {
                log::error!("fifo: tsg {} preempt on pbdma {} failed: {}", tsg, pbdma_id, err);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FifoConfig;
    use crate::mock::{HalCall, MockHal, MockPmu, MockRecovery};
    use crate::runlist::RunlistTable;
    use crate::timer::StdTimer;
    use magma_core::chip::chip_id;
    use magma_core::{ChipInfo, EngineMask, PbdmaMask, PlatformKind, Runlist, RunlistEnable};
    use std::sync::Barrier;
    use std::thread;
    use std::time::{Duration, Instant};

    const RL0: RunlistId = RunlistId::new(0);
    const RL1: RunlistId = RunlistId::new(1);

    fn chip(id: u8, platform: PlatformKind) -> ChipInfo {
        ChipInfo {
            chip_id: id,
            major_rev: 1,
            minor_rev: 0,
            platform,
        }
    }

    fn table() -> RunlistTable {
        RunlistTable::new([
            Runlist::new(RL0, EngineMask(0b011), PbdmaMask(0b101)),
            Runlist::new(RL1, EngineMask(0b100), PbdmaMask(0b010)),
        ])
        .unwrap()
    }

    fn fifo_with(
        pmu: MockPmu,
        chip: ChipInfo,
        config: FifoConfig,
    ) -> Fifo<MockHal, MockPmu, MockRecovery> {
        Fifo::new(MockHal::new(), pmu, MockRecovery::new(), table(), chip, config).unwrap()
    }

    /// Silicon without errata 2016608
    fn fifo() -> Fifo<MockHal, MockPmu, MockRecovery> {
        fifo_with(
            MockPmu::new(),
            chip(chip_id::T186, PlatformKind::Silicon),
            FifoConfig::default().with_ctxsw_timeout_ms(100),
        )
    }

    #[test]
    fn test_invalid_runlist_is_noop() {
        let fifo = fifo();
        for tsg in [0, 1, 511] {
            assert_eq!(fifo.preempt_tsg(RunlistId::INVALID, TsgId(tsg)), Ok(()));
        }
        assert!(fifo.hal().calls().is_empty());
        assert_eq!(fifo.pmu().acquires(), 0);
    }

    #[test]
    fn test_unknown_runlist() {
        let fifo = fifo();
        assert_eq!(fifo.preempt_tsg(RunlistId::new(5), TsgId(1)), Err(Error::NotFound));
        assert!(fifo.hal().calls().is_empty());
    }

    #[test]
    fn test_preempt_completes_first_attempt() {
        let fifo = fifo();
        assert_eq!(fifo.preempt_tsg(RL0, TsgId(3)), Ok(()));
        assert_eq!(
            fifo.hal().calls(),
            [
                HalCall::Trigger(3, IdType::Tsg),
                HalCall::Pending { id: 3, last: false },
            ]
        );
        assert_eq!(fifo.pmu().acquires(), 1);
        assert_eq!(fifo.pmu().releases(), 1);
        assert!(fifo.recovery().events().is_empty());
    }

    #[test]
    fn test_concurrent_preempts_on_one_runlist_serialize() {
        let fifo = fifo();
        fifo.hal().set_pending_delay(Duration::from_millis(2));

        thread::scope(|s| {
            let workers: Vec<_> = (0..4u32)
                .map(|tsg| {
                    let fifo = &fifo;
                    s.spawn(move || {
                        for _ in 0..3 {
                            assert_eq!(fifo.preempt_tsg(RL0, TsgId(tsg)), Ok(()));
                        }
                    })
                })
                .collect();
            for worker in workers {
                worker.join().unwrap();
            }
        });
        assert_eq!(fifo.hal().trigger_count(), 12);
    }

    #[test]
    fn test_preempts_on_different_runlists_overlap() {
        let fifo = fifo();
        fifo.hal().set_pending_delay(Duration::from_millis(100));
        let start = Barrier::new(2);

        thread::scope(|s| {
            let workers: Vec<_> = [(RL0, 1u32), (RL1, 2)]
                .into_iter()
                .map(|(runlist_id, tsg)| {
                    let (fifo, start) = (&fifo, &start);
                    s.spawn(move || {
                        start.wait();
                        fifo.preempt_tsg(runlist_id, TsgId(tsg))
                    })
                })
                .collect();
            for worker in workers {
                assert_eq!(worker.join().unwrap(), Ok(()));
            }
        });
        // Both polls ran inside their own runlist lock at the same time
        assert_eq!(fifo.hal().max_concurrent_polls(), 2);
        assert_eq!(fifo.hal().trigger_count(), 2);
    }

    #[test]
    fn test_errata_brackets_trigger_with_runlist_disable() {
        let fifo = fifo_with(
            MockPmu::new(),
            chip(chip_id::T194, PlatformKind::Silicon),
            FifoConfig::default(),
        );
        assert!(fifo.is_errata_present(Errata::ERRATA_2016608));

        assert_eq!(fifo.preempt_tsg(RL1, TsgId(9)), Ok(()));
        assert_eq!(
            fifo.hal().calls(),
            [
                HalCall::SetRunlistState(0b10, RunlistEnable::Disabled),
                HalCall::Trigger(9, IdType::Tsg),
                HalCall::Pending { id: 9, last: false },
                HalCall::SetRunlistState(0b10, RunlistEnable::Enabled),
            ]
        );
        assert!(fifo.runlists().lock(RL1).unwrap().is_enabled());
    }

    #[test]
    fn test_errata_reenables_after_failure() {
        let fifo = fifo_with(
            MockPmu::new(),
            chip(chip_id::T234, PlatformKind::Silicon),
            FifoConfig::default(),
        );
        fifo.hal().script_pending(&[Err(Error::EngineHang(0))]);

        assert_eq!(fifo.preempt_tsg(RL0, TsgId(1)), Err(Error::EngineHang(0)));
        assert_eq!(
            fifo.hal().calls().last(),
            Some(&HalCall::SetRunlistState(0b1, RunlistEnable::Enabled))
        );
        assert!(fifo.runlists().lock(RL0).unwrap().is_enabled());
    }

    #[test]
    fn test_no_errata_leaves_runlist_enabled() {
        let fifo = fifo();
        fifo.hal().script_pending(&[Err(Error::TryAgain)]);
        assert_eq!(fifo.preempt_tsg(RL0, TsgId(1)), Ok(()));
        assert!(!fifo
            .hal()
            .calls()
            .iter()
            .any(|call| matches!(call, HalCall::SetRunlistState(..))));
    }

    #[test]
    fn test_retry_budget_exhausted() {
        let fifo = fifo();
        fifo.hal().pending_always(Err(Error::TryAgain));

        assert_eq!(fifo.preempt_tsg(RL0, TsgId(4)), Err(Error::Timeout));
        assert_eq!(fifo.hal().trigger_count(), 10);

        let lasts: Vec<bool> = fifo
            .hal()
            .calls()
            .iter()
            .filter_map(|call| match call {
                HalCall::Pending { last, .. } => Some(*last),
                _ => None,
            })
            .collect();
        assert_eq!(lasts.len(), 10);
        assert!(lasts[..9].iter().all(|last| !last));
        assert!(lasts[9]);

        // Silicon leaves recovery to the ctxsw timeout watchdog
        assert!(fifo.recovery().events().is_empty());
    }

    #[test]
    fn test_hard_fault_not_retried() {
        let fifo = fifo();
        fifo.hal().script_pending(&[
            Err(Error::TryAgain),
            Err(Error::TryAgain),
            Err(Error::EngineHang(2)),
        ]);
        fifo.hal().pending_always(Err(Error::TryAgain));

        assert_eq!(fifo.preempt_tsg(RL0, TsgId(4)), Err(Error::EngineHang(2)));
        assert_eq!(fifo.hal().trigger_count(), 3);
    }

    #[test]
    fn test_mutex_failure_is_not_fatal() {
        let fifo = fifo_with(
            MockPmu::failing(),
            chip(chip_id::T186, PlatformKind::Silicon),
            FifoConfig::default().with_ctxsw_timeout_ms(50).with_preempt_retry_count(5),
        );
        fifo.hal().pending_always(Err(Error::TryAgain));

        assert_eq!(fifo.preempt_tsg(RL0, TsgId(2)), Err(Error::Timeout));
        assert_eq!(fifo.hal().trigger_count(), 5);
        assert_eq!(fifo.pmu().acquires(), 5);
        assert_eq!(fifo.pmu().releases(), 0);
    }

    #[test]
    fn test_mutex_released_every_attempt() {
        let fifo = fifo();
        fifo.hal().script_pending(&[Err(Error::TryAgain), Err(Error::TryAgain)]);

        assert_eq!(fifo.preempt_tsg(RL0, TsgId(2)), Ok(()));
        assert_eq!(fifo.pmu().acquires(), 3);
        assert_eq!(fifo.pmu().releases(), 3);
    }

    #[test]
    fn test_retry_waits_for_stall_interrupts() {
        let fifo = fifo_with(
            MockPmu::new(),
            chip(chip_id::T186, PlatformKind::Silicon),
            FifoConfig::default().with_ctxsw_timeout_ms(100).with_preempt_retry_count(5),
        );
        fifo.hal().script_pending(&[Err(Error::TryAgain)]);
        // Never handled: the wait times out and the retry goes ahead
        fifo.cic().set_irq_stall(1);

        let start = Instant::now();
        assert_eq!(fifo.preempt_tsg(RL0, TsgId(6)), Ok(()));
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(fifo.hal().trigger_count(), 2);
    }

    #[test]
    fn test_non_silicon_escalates_to_recovery() {
        let fifo = fifo_with(
            MockPmu::new(),
            chip(chip_id::T186, PlatformKind::Simulation),
            FifoConfig::default().with_ctxsw_timeout_ms(30).with_preempt_retry_count(3),
        );
        fifo.hal().pending_always(Err(Error::TryAgain));

        assert_eq!(fifo.preempt_tsg(RL1, TsgId(8)), Err(Error::Timeout));
        assert_eq!(
            fifo.recovery().events(),
            [(RL1, PreemptTarget::Tsg(TsgId(8)))]
        );
    }

    #[test]
    fn test_preempt_channel() {
        let fifo = fifo();
        assert_eq!(fifo.preempt_channel(RL0, ChannelId(17), Some(TsgId(2))), Ok(()));
        assert_eq!(fifo.preempt_channel(RL0, ChannelId(17), None), Ok(()));
        assert_eq!(fifo.preempt_channel(RunlistId::INVALID, ChannelId(17), None), Ok(()));

        let triggers: Vec<HalCall> = fifo
            .hal()
            .calls()
            .into_iter()
            .filter(|call| matches!(call, HalCall::Trigger(..)))
            .collect();
        assert_eq!(
            triggers,
            [
                HalCall::Trigger(2, IdType::Tsg),
                HalCall::Trigger(17, IdType::Channel),
            ]
        );
    }

    #[test]
    fn test_rc_preempt_flags_all_engines() {
        let fifo = fifo();
        {
            let mut locked = fifo.lock_runlists(0b11).unwrap();
            fifo.preempt_runlists_for_rc(&mut locked, 0b11);
        }

        assert_eq!(fifo.hal().calls(), [HalCall::PreemptRunlists(0b11)]);
        assert_eq!(fifo.pmu().acquires(), 1);
        assert_eq!(fifo.pmu().releases(), 1);
        assert_eq!(
            fifo.runlists().take_reset_eng_bitmask(RL0).unwrap(),
            EngineMask(0b011)
        );
        assert_eq!(
            fifo.runlists().take_reset_eng_bitmask(RL1).unwrap(),
            EngineMask(0b100)
        );
        assert!(fifo.runlists().take_reset_eng_bitmask(RL0).unwrap().is_empty());
    }

    #[test]
    fn test_rc_preempt_skips_unlocked_runlists() {
        let fifo = fifo();
        {
            let mut locked = fifo.lock_runlists(RL0.mask()).unwrap();
            fifo.preempt_runlists_for_rc(&mut locked, 0b11);
        }

        assert_eq!(fifo.hal().calls(), [HalCall::PreemptRunlists(0b01)]);
        assert!(fifo.runlists().take_reset_eng_bitmask(RL1).unwrap().is_empty());
    }

    #[test]
    fn test_poll_tsg_on_pbdma() {
        let fifo = fifo();
        fifo.hal().pbdma_poll_fails(Error::Timeout);

        assert_eq!(fifo.poll_tsg_on_pbdma(RL0, TsgId(5)), Ok(()));
        assert_eq!(
            fifo.hal().calls(),
            [
                HalCall::PollPbdma(TsgId(5), 0),
                HalCall::PollPbdma(TsgId(5), 2),
            ]
        );
        assert_eq!(fifo.poll_tsg_on_pbdma(RunlistId::new(7), TsgId(5)), Err(Error::NotFound));
    }

    #[test]
    fn test_config_rejected() {
        let ret = Fifo::new(
            MockHal::new(),
            MockPmu::new(),
            MockRecovery::new(),
            table(),
            chip(chip_id::T194, PlatformKind::Silicon),
            FifoConfig::default().with_preempt_retry_count(0),
        );
        assert!(matches!(ret, Err(Error::InvalidParameter)));
    }

    #[test]
    fn test_preempt_get_timeout() {
        assert_eq!(fifo().preempt_get_timeout(), 100);
    }

    // =========================================================================
    // Volta HAL end to end
    // =========================================================================

    mod volta {
        use super::*;
        use magma_gen_volta::testing::FakeRegs;
        use magma_gen_volta::{EngineInfo, Gv11bFifo, Gv11bPmuMutex, PollConfig};
        use magma_hal::mmio::registers;

        const TSG: u32 = 7;

        // Valid context `id`, TSG type
        fn resident(id: u32) -> u32 {
            (1 << 13) | (1 << 12) | id
        }

        fn volta_fifo(
            regs: &FakeRegs,
            platform: PlatformKind,
        ) -> Fifo<Gv11bFifo<&FakeRegs, StdTimer>, Gv11bPmuMutex<&FakeRegs, StdTimer>, MockRecovery>
        {
            let engines = [
                EngineInfo {
                    engine_id: 0,
                    intr_mask: 1 << 12,
                },
                EngineInfo {
                    engine_id: 1,
                    intr_mask: 1 << 5,
                },
            ];
            regs.set(registers::PWR_PMU_MUTEX_ID, 0x2A);

            Fifo::new(
                Gv11bFifo::new(regs, StdTimer::new(), &engines, PollConfig::with_timeout_us(200)),
                Gv11bPmuMutex::new(regs, StdTimer::new()),
                MockRecovery::new(),
                RunlistTable::new([Runlist::new(RL0, EngineMask(0b11), PbdmaMask(0b1))]).unwrap(),
                chip(chip_id::T194, platform),
                FifoConfig::default().with_ctxsw_timeout_ms(20),
            )
            .unwrap()
        }

        #[test]
        fn test_idle_units_preempt_cleanly() {
            let regs = FakeRegs::new();
            let fifo = volta_fifo(&regs, PlatformKind::Silicon);

            assert_eq!(fifo.preempt_tsg(RL0, TsgId(TSG)), Ok(()));
            assert_eq!(regs.writes_to(registers::FIFO_PREEMPT), [0x0100_0007]);
            // Errata 2016608: disabled then re-enabled
            assert_eq!(regs.writes_to(registers::FIFO_SCHED_DISABLE), [0b1, 0b0]);
            // PMU mutex taken and given back
            let slot = registers::pwr_pmu_mutex(MutexId::Fifo.index());
            assert_eq!(regs.writes_to(slot), [0x2A, 0]);
            assert_eq!(regs.writes_to(registers::PWR_PMU_MUTEX_ID_RELEASE), [0x2A]);
        }

        #[test]
        fn test_stuck_pbdma_escalates_off_silicon() {
            let regs = FakeRegs::new();
            let fifo = volta_fifo(&regs, PlatformKind::Fpga);
            regs.set(registers::fifo_pbdma_status(0), resident(TSG));

            assert_eq!(fifo.preempt_tsg(RL0, TsgId(TSG)), Err(Error::PbdmaHang(0)));
            assert_eq!(regs.writes_to(registers::FIFO_PREEMPT).len(), 10);
            assert_eq!(
                fifo.recovery().events(),
                [(RL0, PreemptTarget::Tsg(TsgId(TSG)))]
            );
            assert!(fifo.runlists().lock(RL0).unwrap().is_enabled());
        }

        #[test]
        fn test_stuck_engine_flagged_for_reset() {
            let regs = FakeRegs::new();
            let fifo = volta_fifo(&regs, PlatformKind::Silicon);
            regs.set(registers::fifo_engine_status(1), resident(TSG));

            assert_eq!(fifo.preempt_tsg(RL0, TsgId(TSG)), Err(Error::EngineHang(1)));
            assert_eq!(
                fifo.runlists().take_reset_eng_bitmask(RL0).unwrap(),
                EngineMask(0b10)
            );
            assert!(fifo.recovery().events().is_empty());
        }
    }
}
