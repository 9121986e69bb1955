//! # MAGMA Core Types
//!
//! Fundamental identifiers used across the FIFO stack.
//!
//! These types provide:
//! - Strong typing for runlist, TSG and channel identifiers
//! - Sentinel values for "not bound" identifiers
//! - Engine and PBDMA bitmasks with set-bit iteration

use core::fmt;

// =============================================================================
// RUNLIST ID
// =============================================================================

/// Hardware runlist identifier
///
/// Fixed at device init. [`RunlistId::INVALID`] marks a TSG or channel that
/// was never bound to a runlist.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct RunlistId(u32);

impl RunlistId {
    /// Sentinel for "no runlist bound"
    pub const INVALID: Self = Self(u32::MAX);

    /// Create a new runlist ID
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw value
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Check against the sentinel
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }

    /// Single-bit mask for this runlist, empty for ids past bit 31
    #[inline]
    pub const fn mask(self) -> u32 {
        match 1u32.checked_shl(self.0) {
            Some(bit) => bit,
            None => 0,
        }
    }
}

impl fmt::Debug for RunlistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "RunlistId({})", self.0)
        } else {
            write!(f, "RunlistId(INVALID)")
        }
    }
}

impl fmt::Display for RunlistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// TSG / CHANNEL IDS
// =============================================================================

/// Time-slice group identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct TsgId(pub u32);

/// Channel identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ChannelId(pub u32);

impl fmt::Display for TsgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of context identifier held in status and preempt registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum IdType {
    /// Bare channel
    Channel = 0,
    /// Time-slice group
    Tsg = 1,
}

impl IdType {
    /// Decode the one-bit type field
    #[inline]
    pub const fn from_bit(bit: u32) -> Self {
        if bit & 1 == 0 {
            Self::Channel
        } else {
            Self::Tsg
        }
    }
}

// =============================================================================
// PREEMPT TARGET
// =============================================================================

/// What a preempt request is aimed at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreemptTarget {
    /// A single TSG
    Tsg(TsgId),
    /// A bare channel not bound to any TSG
    Channel(ChannelId),
    /// Every context on the runlist
    Runlist,
}

impl PreemptTarget {
    /// Raw id and type as written to the preempt register
    pub const fn id_and_type(self) -> Option<(u32, IdType)> {
        match self {
            Self::Tsg(tsg) => Some((tsg.0, IdType::Tsg)),
            Self::Channel(ch) => Some((ch.0, IdType::Channel)),
            Self::Runlist => None,
        }
    }
}

// =============================================================================
// BITMASKS
// =============================================================================

/// Iterator over set bit positions of a `u32`
#[derive(Debug, Clone)]
pub struct SetBits(u32);

impl Iterator for SetBits {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.0 == 0 {
            return None;
        }
        let bit = self.0.trailing_zeros();
        self.0 &= self.0 - 1;
        Some(bit)
    }
}

/// Iterate set bits of a raw mask, lowest first
#[inline]
pub const fn set_bits(mask: u32) -> SetBits {
    SetBits(mask)
}

/// Bitmask of engine IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(transparent)]
pub struct EngineMask(pub u32);

/// Bitmask of PBDMA IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(transparent)]
pub struct PbdmaMask(pub u32);

macro_rules! impl_mask {
    ($ty:ident) => {
        impl $ty {
            /// Empty mask
            pub const EMPTY: Self = Self(0);

            /// Check if no bit is set
            #[inline]
            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// Check if `id` is in the mask
            #[inline]
            pub const fn contains(self, id: u32) -> bool {
                id < 32 && self.0 & (1u32 << id) != 0
            }

            /// Add `id` to the mask
            #[inline]
            pub fn insert(&mut self, id: u32) {
                if id < 32 {
                    self.0 |= 1u32 << id;
                }
            }

            /// Iterate IDs in the mask, lowest first
            #[inline]
            pub const fn iter(self) -> SetBits {
                set_bits(self.0)
            }
        }
    };
}

impl_mask!(EngineMask);
impl_mask!(PbdmaMask);

// Identifiers are written straight into 32-bit register fields
static_assertions::assert_eq_size!(RunlistId, u32);
static_assertions::assert_eq_size!(TsgId, u32);
static_assertions::assert_eq_size!(ChannelId, u32);
