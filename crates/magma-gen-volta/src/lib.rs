//! # MAGMA Volta Support
//!
//! GV11B implementations of the FIFO and PMU mutex HAL traits.
//!
//! Volta moved preempt completion detection from a single pending bit to
//! per-unit polling: a preempt is complete once the context has left every
//! PBDMA and every engine that its runlist feeds.

#![cfg_attr(not(any(test, feature = "std", feature = "testing")), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod fifo;
pub mod pmu;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use fifo::{EngineInfo, Gv11bFifo, PollConfig};
pub use pmu::Gv11bPmuMutex;
