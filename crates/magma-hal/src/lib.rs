//! # MAGMA HAL
//!
//! Hardware abstraction for the FIFO subsystem.
//!
//! Every hardware generation provides one implementation of the traits
//! below; the FIFO subsystem is generic over them and never touches a
//! register directly.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       magma-fifo                         │
//! └───────────────┬───────────────────┬──────────────────────┘
//!                 │ FifoHal           │ HwMutex / Timer
//! ┌───────────────▼───────────────────▼──────────────────────┐
//! │   magma-gen-*  (register programming per generation)     │
//! └───────────────┬──────────────────────────────────────────┘
//!                 │ RegisterIo
//! ┌───────────────▼──────────────────────────────────────────┐
//! │                    BAR0 MMIO window                      │
//! └──────────────────────────────────────────────────────────┘
//! ```

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod fifo;
pub mod mmio;
pub mod pmu;
pub mod status;
pub mod timer;

// Re-exports
pub use fifo::FifoHal;
pub use mmio::{MmioRegion, RegisterIo};
pub use pmu::{HwMutex, MutexId, MutexToken};
pub use status::{ChannelStatus, EngineStatus, PbdmaStatus};
pub use timer::Timer;
