//! # Runlist Record
//!
//! Per-runlist state shared between the FIFO subsystem and the HAL.
//!
//! The record itself carries no lock: the FIFO subsystem wraps every
//! runlist in its own mutex and only hands `&mut Runlist` to the HAL while
//! that mutex is held.

use crate::types::{EngineMask, PbdmaMask, RunlistId};

/// Scheduling state of a runlist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunlistEnable {
    /// Hardware may schedule from this runlist
    Enabled,
    /// Scheduling suspended (sched-disable bit set)
    Disabled,
}

/// A hardware runlist and the units it feeds
#[derive(Debug, Clone)]
pub struct Runlist {
    /// Runlist ID
    pub id: RunlistId,
    /// Engines served by this runlist
    pub eng_bitmask: EngineMask,
    /// PBDMAs served by this runlist
    pub pbdma_bitmask: PbdmaMask,
    /// Last state written to hardware
    pub state: RunlistEnable,
    /// Engines flagged for reset by the last preempt poll or RC preempt.
    /// Written under the runlist lock, consumed by recovery.
    pub reset_eng_bitmask: EngineMask,
}

impl Runlist {
    /// Create a runlist record, initially enabled
    pub const fn new(id: RunlistId, eng_bitmask: EngineMask, pbdma_bitmask: PbdmaMask) -> Self {
        Self {
            id,
            eng_bitmask,
            pbdma_bitmask,
            state: RunlistEnable::Enabled,
            reset_eng_bitmask: EngineMask::EMPTY,
        }
    }

    /// Check if scheduling is enabled
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.state == RunlistEnable::Enabled
    }

    /// Flag every served engine for reset
    pub fn flag_all_engines_for_reset(&mut self) {
        self.reset_eng_bitmask = self.eng_bitmask;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_runlist_is_enabled_and_clean() {
        let rl = Runlist::new(RunlistId::new(1), EngineMask(0b11), PbdmaMask(0b1));
        assert!(rl.is_enabled());
        assert!(rl.reset_eng_bitmask.is_empty());
    }

    #[test]
    fn test_flag_all_engines() {
        let mut rl = Runlist::new(RunlistId::new(0), EngineMask(0b101), PbdmaMask(0b1));
        rl.flag_all_engines_for_reset();
        assert_eq!(rl.reset_eng_bitmask, EngineMask(0b101));
    }
}
