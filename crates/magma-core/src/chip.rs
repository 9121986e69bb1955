//! # Chip Descriptor and Errata
//!
//! The SoC descriptor is resolved exactly once at device attach from the
//! HIDREV register and then handed out by value. Errata are a capability
//! table resolved from the chip ID at device init.

use spin::Once;

// =============================================================================
// PLATFORM
// =============================================================================

/// Platform the driver is running on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformKind {
    /// Production silicon
    Silicon,
    /// QuickTurn emulator
    Qt,
    /// FPGA prototype
    Fpga,
    /// Software simulator (linsim/asim)
    Simulation,
    /// Unrecognized pre-silicon platform code
    Unknown(u8),
}

impl PlatformKind {
    /// Decode the pre-silicon platform field
    pub const fn from_pre_si(code: u8) -> Self {
        match code {
            0 => Self::Silicon,
            1 => Self::Qt,
            2 | 3 => Self::Fpga,
            4..=6 => Self::Simulation,
            other => Self::Unknown(other),
        }
    }

    /// Check for production silicon
    #[inline]
    pub const fn is_silicon(self) -> bool {
        matches!(self, Self::Silicon)
    }
}

// =============================================================================
// CHIP INFO
// =============================================================================

/// Known SoC chip IDs
pub mod chip_id {
    //! HIDREV chip ID values

    /// Tegra186 (Parker, GP10B)
    pub const T186: u8 = 0x18;
    /// Tegra194 (Xavier, GV11B)
    pub const T194: u8 = 0x19;
    /// Tegra234 (Orin, GA10B)
    pub const T234: u8 = 0x23;
}

/// SoC chip descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipInfo {
    /// Chip ID (HIDREV bits 15:8)
    pub chip_id: u8,
    /// Major revision (HIDREV bits 7:4), zero on pre-silicon
    pub major_rev: u8,
    /// Minor revision (HIDREV bits 19:16)
    pub minor_rev: u8,
    /// Platform kind
    pub platform: PlatformKind,
}

impl ChipInfo {
    /// Decode a raw HIDREV register value
    pub const fn from_hidrev(hidrev: u32) -> Self {
        let chip_id = ((hidrev >> 8) & 0xFF) as u8;
        let major_rev = ((hidrev >> 4) & 0xF) as u8;
        let minor_rev = ((hidrev >> 16) & 0xF) as u8;
        let pre_si = ((hidrev >> 20) & 0xF) as u8;

        // Silicon always reports a non-zero major revision
        let platform = if major_rev != 0 {
            PlatformKind::Silicon
        } else {
            PlatformKind::from_pre_si(pre_si)
        };

        Self {
            chip_id,
            major_rev,
            minor_rev,
            platform,
        }
    }

    /// Errata that apply to this chip
    #[inline]
    pub const fn errata(&self) -> Errata {
        Errata::for_chip(self.chip_id)
    }
}

static CHIP_INFO: Once<ChipInfo> = Once::new();

/// Resolve the process-wide chip descriptor
///
/// Only the first call decodes `hidrev`; every later call returns the
/// descriptor resolved by that first call.
pub fn init(hidrev: u32) -> ChipInfo {
    let info = *CHIP_INFO.call_once(|| ChipInfo::from_hidrev(hidrev));
    log::debug!(
        "chip: id {:#04x} rev {}.{} on {:?}",
        info.chip_id,
        info.major_rev,
        info.minor_rev,
        info.platform
    );
    info
}

/// The chip descriptor, if [`init`] has run
pub fn info() -> Option<ChipInfo> {
    CHIP_INFO.get().copied()
}

// =============================================================================
// ERRATA
// =============================================================================

bitflags::bitflags! {
    /// Hardware errata needing a software workaround
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Errata: u32 {
        /// Runlist must be disabled around a TSG preempt trigger
        const ERRATA_2016608 = 1 << 0;
        /// Engine context reset needed after a PBDMA preempt timeout
        const ERRATA_200601972 = 1 << 1;
        /// Stale LTC state after engine reset
        const ERRATA_1547668 = 1 << 2;
    }
}

impl Errata {
    /// Errata table keyed by chip ID
    pub const fn for_chip(chip_id: u8) -> Self {
        match chip_id {
            chip_id::T186 => Self::ERRATA_1547668,
            chip_id::T194 => Self::ERRATA_2016608.union(Self::ERRATA_200601972),
            chip_id::T234 => Self::ERRATA_2016608,
            _ => Self::empty(),
        }
    }

    /// Capability query
    #[inline]
    pub const fn is_present(self, erratum: Errata) -> bool {
        self.contains(erratum)
    }
}
