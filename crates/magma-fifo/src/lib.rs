//! # MAGMA FIFO
//!
//! Preemption and scheduling coordination for NVIDIA GPU command
//! submission.
//!
//! The subsystem preempts TSGs and channels off their runlists, serializes
//! every attempt against a runlist, coexists with PMU firmware through the
//! PMU FIFO mutex and stays out of the way of in-flight interrupt handlers.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                        Fifo<H, M, R>                           │
//! │  ┌──────────────┐  ┌──────────────┐  ┌───────────────────────┐ │
//! │  │  preempt     │  │  RunlistTable│  │  Cic (deferred IRQs)  │ │
//! │  │  tsg/channel │──│  lock/guard  │  │  stall / nonstall     │ │
//! │  │  rc          │  │              │  │                       │ │
//! │  └──────┬───────┘  └──────────────┘  └───────────────────────┘ │
//! └─────────┼──────────────────────────────────────────────────────┘
//!           │ FifoHal / HwMutex / RecoveryHandler
//!           ▼
//!     magma-gen-* (per generation)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! let fifo = Fifo::new(hal, pmu, recovery, runlists, chip, FifoConfig::default())?;
//! fifo.preempt_tsg(runlist_id, tsg)?;
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

// =============================================================================
// MODULE EXPORTS
// =============================================================================

pub mod cic;
pub mod config;
pub mod fifo;
pub mod preempt;
pub mod rc;
pub mod runlist;
pub mod timer;

#[cfg(test)]
mod mock;

// Re-exports for convenience
pub use cic::{Cic, DeferredIrqCounter};
pub use config::FifoConfig;
pub use fifo::Fifo;
pub use preempt::HwMutexGuard;
pub use rc::{LogOnlyRecovery, RecoveryHandler};
pub use runlist::{RunlistDisableGuard, RunlistTable, RunlistsGuard};
pub use timer::StdTimer;
