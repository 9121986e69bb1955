//! # PBDMA and Engine Status
//!
//! Pure decoders for the PBDMA and engine status registers. A snapshot is
//! read once per poll iteration and never mutated afterwards.
//!
//! Both registers share one layout for the context fields:
//!
//! ```text
//!  31   30    29  28       27:16     15:13      12      11:0
//! ┌────┬─────┬───┬────────┬─────────┬──────────┬───────┬──────┐
//! │busy│fault│   │next typ│ next id │ ctx stat │id type│  id  │
//! └────┴─────┴───┴────────┴─────────┴──────────┴───────┴──────┘
//! ```
//!
//! Busy and faulted are only meaningful in the engine status register.

use magma_core::IdType;

use crate::mmio::extract_field;

// =============================================================================
// CHANNEL STATUS
// =============================================================================

/// Context-switch state of a PBDMA or engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelStatus {
    /// Nothing loaded
    Invalid,
    /// A context is loaded and stable
    Valid,
    /// Loading a context into an empty slot
    Load,
    /// Saving the current context, nothing to load next
    Save,
    /// Switching between two contexts
    Switch,
}

impl ChannelStatus {
    /// Decode the 3-bit status field; unknown codes map to `Invalid`
    pub const fn from_field(code: u32) -> Self {
        match code {
            1 => Self::Valid,
            5 => Self::Load,
            6 => Self::Save,
            7 => Self::Switch,
            _ => Self::Invalid,
        }
    }

    /// Whether `id`/`id_type` are meaningful in this state
    #[inline]
    pub const fn has_id(self) -> bool {
        matches!(self, Self::Valid | Self::Save | Self::Switch)
    }

    /// Whether `next_id`/`next_id_type` are meaningful in this state
    #[inline]
    pub const fn has_next_id(self) -> bool {
        matches!(self, Self::Load | Self::Switch)
    }

    /// Whether a context switch is in flight
    #[inline]
    pub const fn is_switching(self) -> bool {
        matches!(self, Self::Load | Self::Save | Self::Switch)
    }
}

mod field {
    pub const ID: (u8, u8) = (0, 11);
    pub const ID_TYPE: (u8, u8) = (12, 12);
    pub const STATUS: (u8, u8) = (13, 15);
    pub const NEXT_ID: (u8, u8) = (16, 27);
    pub const NEXT_ID_TYPE: (u8, u8) = (28, 28);
    pub const FAULTED: (u8, u8) = (30, 30);
    pub const BUSY: (u8, u8) = (31, 31);
}

/// Context fields common to both status registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CtxFields {
    status: ChannelStatus,
    id: Option<(u32, IdType)>,
    next_id: Option<(u32, IdType)>,
}

impl CtxFields {
    const fn decode(raw: u32) -> Self {
        let code = extract_field(raw, field::STATUS.0, field::STATUS.1);
        let status = ChannelStatus::from_field(code);

        let id = if status.has_id() {
            Some((
                extract_field(raw, field::ID.0, field::ID.1),
                IdType::from_bit(extract_field(raw, field::ID_TYPE.0, field::ID_TYPE.1)),
            ))
        } else {
            None
        };

        let next_id = if status.has_next_id() {
            Some((
                extract_field(raw, field::NEXT_ID.0, field::NEXT_ID.1),
                IdType::from_bit(extract_field(raw, field::NEXT_ID_TYPE.0, field::NEXT_ID_TYPE.1)),
            ))
        } else {
            None
        };

        Self {
            status,
            id,
            next_id,
        }
    }

    fn is_resident(&self, id: u32, id_type: IdType) -> bool {
        self.id == Some((id, id_type)) || self.next_id == Some((id, id_type))
    }
}

// =============================================================================
// PBDMA STATUS
// =============================================================================

/// Decoded PBDMA status register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PbdmaStatus {
    raw: u32,
    ctx: CtxFields,
}

impl PbdmaStatus {
    /// Decode a raw register value
    pub const fn decode(raw: u32) -> Self {
        Self {
            raw,
            ctx: CtxFields::decode(raw),
        }
    }

    /// Raw register value
    #[inline]
    pub const fn raw(&self) -> u32 {
        self.raw
    }

    /// Context-switch state
    #[inline]
    pub const fn chsw_status(&self) -> ChannelStatus {
        self.ctx.status
    }

    /// Raw 3-bit context-switch status code
    #[inline]
    pub const fn channel_status_field(&self) -> u32 {
        extract_field(self.raw, field::STATUS.0, field::STATUS.1)
    }

    /// Current context, if any
    #[inline]
    pub const fn id(&self) -> Option<(u32, IdType)> {
        self.ctx.id
    }

    /// Incoming context, if any
    #[inline]
    pub const fn next_id(&self) -> Option<(u32, IdType)> {
        self.ctx.next_id
    }

    /// Context switch in flight
    #[inline]
    pub const fn chsw_in_progress(&self) -> bool {
        self.ctx.status.is_switching()
    }

    /// Whether the context is loaded or about to be
    pub fn is_resident(&self, id: u32, id_type: IdType) -> bool {
        self.ctx.is_resident(id, id_type)
    }
}

// =============================================================================
// ENGINE STATUS
// =============================================================================

/// Decoded engine status register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineStatus {
    raw: u32,
    ctx: CtxFields,
    busy: bool,
    faulted: bool,
}

impl EngineStatus {
    /// Decode a raw register value
    pub const fn decode(raw: u32) -> Self {
        Self {
            raw,
            ctx: CtxFields::decode(raw),
            busy: extract_field(raw, field::BUSY.0, field::BUSY.1) != 0,
            faulted: extract_field(raw, field::FAULTED.0, field::FAULTED.1) != 0,
        }
    }

    /// Raw register value
    #[inline]
    pub const fn raw(&self) -> u32 {
        self.raw
    }

    /// Context state
    #[inline]
    pub const fn ctx_status(&self) -> ChannelStatus {
        self.ctx.status
    }

    /// Current context, if any
    #[inline]
    pub const fn id(&self) -> Option<(u32, IdType)> {
        self.ctx.id
    }

    /// Incoming context, if any
    #[inline]
    pub const fn next_id(&self) -> Option<(u32, IdType)> {
        self.ctx.next_id
    }

    /// Engine is executing
    #[inline]
    pub const fn is_busy(&self) -> bool {
        self.busy
    }

    /// Engine reported a fault
    #[inline]
    pub const fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// Context switch in flight
    #[inline]
    pub const fn ctxsw_in_progress(&self) -> bool {
        self.ctx.status.is_switching()
    }

    /// Whether the context is loaded or about to be
    pub fn is_resident(&self, id: u32, id_type: IdType) -> bool {
        self.ctx.is_resident(id, id_type)
    }
}
