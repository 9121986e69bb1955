//! # MAGMA Core
//!
//! Foundational types shared by every layer of the FIFO stack.
//!
//! This crate carries no hardware access of its own: it only defines the
//! identifiers, records and error codes that the HAL, the generation
//! crates and the FIFO subsystem pass between each other.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      magma-core                             │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │   Types     │  │  Runlist    │  │  Chip / Errata      │  │
//! │  │ (RunlistId, │  │  record     │  │  Error              │  │
//! │  │  TsgId)     │  │             │  │                     │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

// =============================================================================
// MODULE EXPORTS
// =============================================================================

pub mod chip;
pub mod error;
pub mod runlist;
pub mod types;

// Re-exports for convenience
pub use chip::{ChipInfo, Errata, PlatformKind};
pub use error::{Error, Result};
pub use runlist::{Runlist, RunlistEnable};
pub use types::*;
