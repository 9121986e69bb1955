//! Recording HAL, PMU mutex and recovery doubles for coordinator tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use magma_core::{Error, IdType, PreemptTarget, Result, Runlist, RunlistEnable, RunlistId, TsgId};
use magma_hal::{FifoHal, HwMutex, MutexId, MutexToken};

use crate::rc::RecoveryHandler;

/// One recorded HAL call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalCall {
    Trigger(u32, IdType),
    PreemptRunlists(u32),
    Pending { id: u32, last: bool },
    PollPbdma(TsgId, u32),
    SetRunlistState(u32, RunlistEnable),
}

/// FIFO HAL that records calls and replays scripted poll results
///
/// Panics if two polls on the same runlist overlap. Polls on different
/// runlists may overlap; the peak overlap is kept for inspection.
#[derive(Debug, Default)]
pub struct MockHal {
    calls: Mutex<Vec<HalCall>>,
    pending: Mutex<VecDeque<Result<()>>>,
    pending_default: Mutex<Option<Error>>,
    pbdma_result: Mutex<Option<Error>>,
    pending_delay: Mutex<Duration>,
    polling: Mutex<u32>,
    active_polls: AtomicU32,
    max_active_polls: AtomicU32,
}

impl MockHal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Results returned by successive polls before falling back
    pub fn script_pending(&self, results: &[Result<()>]) {
        self.pending.lock().unwrap().extend(results.iter().copied());
    }

    /// Poll result once the script is exhausted
    pub fn pending_always(&self, result: Result<()>) {
        *self.pending_default.lock().unwrap() = result.err();
    }

    pub fn pbdma_poll_fails(&self, err: Error) {
        *self.pbdma_result.lock().unwrap() = Some(err);
    }

    /// Time each poll holds the critical section
    pub fn set_pending_delay(&self, delay: Duration) {
        *self.pending_delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> Vec<HalCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn trigger_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, HalCall::Trigger(..)))
            .count()
    }

    /// Most polls seen running at once, across all runlists
    pub fn max_concurrent_polls(&self) -> u32 {
        self.max_active_polls.load(Ordering::SeqCst)
    }

    fn enter_poll(&self, runlist_id: RunlistId) {
        let overlapped = {
            let mut polling = self.polling.lock().unwrap();
            let overlapped = *polling & runlist_id.mask() != 0;
            *polling |= runlist_id.mask();
            overlapped
        };
        assert!(
            !overlapped,
            "preempt on runlist {} polled while another is still polling",
            runlist_id
        );
        let active = self.active_polls.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_polls.fetch_max(active, Ordering::SeqCst);
    }

    fn exit_poll(&self, runlist_id: RunlistId) {
        self.active_polls.fetch_sub(1, Ordering::SeqCst);
        *self.polling.lock().unwrap() &= !runlist_id.mask();
    }

    fn record(&self, call: HalCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl FifoHal for MockHal {
    fn preempt_trigger(&self, id: u32, id_type: IdType) {
        self.record(HalCall::Trigger(id, id_type));
    }

    fn preempt_runlists(&self, runlist_mask: u32) {
        self.record(HalCall::PreemptRunlists(runlist_mask));
    }

    fn is_preempt_pending(
        &self,
        runlist: &mut Runlist,
        id: u32,
        _id_type: IdType,
        is_last_attempt: bool,
    ) -> Result<()> {
        self.enter_poll(runlist.id);
        self.record(HalCall::Pending {
            id,
            last: is_last_attempt,
        });

        let delay = *self.pending_delay.lock().unwrap();
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let scripted = self.pending.lock().unwrap().pop_front();
        let ret = match scripted {
            Some(ret) => ret,
            None => match *self.pending_default.lock().unwrap() {
                Some(err) => Err(err),
                None => Ok(()),
            },
        };
        self.exit_poll(runlist.id);
        ret
    }

    fn preempt_poll_pbdma(&self, tsg: TsgId, pbdma_id: u32) -> Result<()> {
        self.record(HalCall::PollPbdma(tsg, pbdma_id));
        match *self.pbdma_result.lock().unwrap() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn set_runlist_state(&self, runlist_mask: u32, state: RunlistEnable) {
        self.record(HalCall::SetRunlistState(runlist_mask, state));
    }
}

/// PMU mutex that can be told to refuse every acquire
#[derive(Debug, Default)]
pub struct MockPmu {
    fail: AtomicBool,
    acquires: AtomicU32,
    releases: AtomicU32,
}

impl MockPmu {
    pub const TOKEN: u32 = 0x2A;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let pmu = Self::default();
        pmu.fail.store(true, Ordering::SeqCst);
        pmu
    }

    pub fn acquires(&self) -> u32 {
        self.acquires.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> u32 {
        self.releases.load(Ordering::SeqCst)
    }
}

impl HwMutex for MockPmu {
    fn acquire(&self, id: MutexId) -> Result<MutexToken> {
        assert_eq!(id, MutexId::Fifo);
        self.acquires.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::HwMutexUnavailable);
        }
        Ok(MutexToken::new(Self::TOKEN))
    }

    fn release(&self, id: MutexId, token: MutexToken) -> Result<()> {
        assert_eq!(id, MutexId::Fifo);
        assert_eq!(token.raw(), Self::TOKEN);
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Recovery handler that records escalations
#[derive(Debug, Default)]
pub struct MockRecovery {
    events: Mutex<Vec<(RunlistId, PreemptTarget)>>,
}

impl MockRecovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(RunlistId, PreemptTarget)> {
        self.events.lock().unwrap().clone()
    }
}

impl RecoveryHandler for MockRecovery {
    fn preempt_timeout(&self, runlist_id: RunlistId, target: PreemptTarget) {
        self.events.lock().unwrap().push((runlist_id, target));
    }
}
