//! # Recovery Hook
//!
//! Entry point into the fault-recovery subsystem. The FIFO layer only
//! reports; teardown and engine reset live with the implementor.

use magma_core::{PreemptTarget, RunlistId};

/// Fault recovery entry points used by the FIFO layer
pub trait RecoveryHandler: Send + Sync {
    /// A preempt could not be confirmed within its budget
    ///
    /// Called on platforms without a reliable context-switch timeout
    /// watchdog. The return value is not consumed.
    fn preempt_timeout(&self, runlist_id: RunlistId, target: PreemptTarget);
}

impl<T: RecoveryHandler + ?Sized> RecoveryHandler for &T {
    fn preempt_timeout(&self, runlist_id: RunlistId, target: PreemptTarget) {
        (**self).preempt_timeout(runlist_id, target)
    }
}

/// Recovery handler that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyRecovery;

impl RecoveryHandler for LogOnlyRecovery {
    fn preempt_timeout(&self, runlist_id: RunlistId, target: PreemptTarget) {
        log::warn!(
            "rc: preempt timeout on runlist {} for {:?}, no recovery installed",
            runlist_id,
            target
        );
    }
}
