//! # FIFO HAL
//!
//! Per-generation preempt programming and completion polling.

use magma_core::{IdType, Result, Runlist, RunlistEnable, TsgId};

/// FIFO operations implemented once per hardware generation
pub trait FifoHal: Send + Sync {
    /// Fire the preempt trigger for one TSG or channel
    ///
    /// A register write; cannot fail.
    fn preempt_trigger(&self, id: u32, id_type: IdType);

    /// Fire the preempt trigger for every runlist in `runlist_mask`
    fn preempt_runlists(&self, runlist_mask: u32);

    /// Poll until the preempted context has left every PBDMA and engine
    /// served by `runlist`
    ///
    /// Returns `Err(TryAgain)` while the switch is still in flight. Engines
    /// that never release the context are recorded in
    /// `runlist.reset_eng_bitmask`; on the last attempt that surfaces as a
    /// definite fault instead of `TryAgain`.
    fn is_preempt_pending(
        &self,
        runlist: &mut Runlist,
        id: u32,
        id_type: IdType,
        is_last_attempt: bool,
    ) -> Result<()>;

    /// Poll one PBDMA until `tsg` is no longer loaded on it
    fn preempt_poll_pbdma(&self, tsg: TsgId, pbdma_id: u32) -> Result<()>;

    /// Write the scheduling state of every runlist in `runlist_mask`
    fn set_runlist_state(&self, runlist_mask: u32, state: RunlistEnable);
}
