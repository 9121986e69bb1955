//! # Memory-Mapped I/O Operations
//!
//! Register access for the FIFO, PBDMA, engine status and PMU mutex blocks.

// =============================================================================
// MMIO REGISTER BLOCKS
// =============================================================================

/// GPU register offsets in BAR0 used by the FIFO stack
///
/// Offsets are in bytes from BAR0 base.
pub mod registers {
    //! GPU register offsets and field layouts

    /// Master control
    pub const PMC: u32 = 0x0000_0000;
    /// FIFO control
    pub const PFIFO: u32 = 0x0000_2000;
    /// PMU falcon
    pub const PPWR: u32 = 0x0010_A000;

    /// PMC register: Stalling interrupt status
    pub const PMC_INTR_0: u32 = PMC + 0x100;

    /// PFIFO: Per-runlist scheduling disable (bit set = disabled)
    pub const FIFO_SCHED_DISABLE: u32 = PFIFO + 0x630;
    /// PFIFO: TSG/channel preempt trigger
    pub const FIFO_PREEMPT: u32 = PFIFO + 0x634;
    /// PFIFO: Runlist preempt trigger (runlist bitmask)
    pub const FIFO_RUNLIST_PREEMPT: u32 = PFIFO + 0x638;
    /// PFIFO: Engine status array base
    pub const FIFO_ENGINE_STATUS_BASE: u32 = PFIFO + 0x640;
    /// Stride between engine status registers
    pub const FIFO_ENGINE_STATUS_STRIDE: u32 = 8;
    /// PFIFO: PBDMA status array base
    pub const FIFO_PBDMA_STATUS_BASE: u32 = PFIFO + 0x1080;
    /// Stride between PBDMA status registers
    pub const FIFO_PBDMA_STATUS_STRIDE: u32 = 4;

    /// PPWR: Mutex token generator
    pub const PWR_PMU_MUTEX_ID: u32 = PPWR + 0x488;
    /// PPWR: Mutex token release
    pub const PWR_PMU_MUTEX_ID_RELEASE: u32 = PPWR + 0x48C;
    /// PPWR: Mutex slot array base
    pub const PWR_PMU_MUTEX_BASE: u32 = PPWR + 0x580;
    /// Number of PMU mutex slots
    pub const PWR_PMU_MUTEX_COUNT: u32 = 16;

    /// Engine status register for engine `id`
    #[inline]
    pub const fn fifo_engine_status(id: u32) -> u32 {
        FIFO_ENGINE_STATUS_BASE + id * FIFO_ENGINE_STATUS_STRIDE
    }

    /// PBDMA status register for PBDMA `id`
    #[inline]
    pub const fn fifo_pbdma_status(id: u32) -> u32 {
        FIFO_PBDMA_STATUS_BASE + id * FIFO_PBDMA_STATUS_STRIDE
    }

    /// PMU mutex slot register
    #[inline]
    pub const fn pwr_pmu_mutex(index: u32) -> u32 {
        PWR_PMU_MUTEX_BASE + index * 4
    }

    /// FIFO_PREEMPT fields
    pub mod preempt {
        //! Preempt register layout

        /// Context ID field (11:0)
        pub const ID_MASK: u32 = 0xFFF;
        /// Preempt still pending (read)
        pub const PENDING: u32 = 1 << 20;
        /// Type field: channel
        pub const TYPE_CHANNEL: u32 = 0;
        /// Type field: TSG
        pub const TYPE_TSG: u32 = 1 << 24;
    }

    /// PMU mutex register values
    pub mod pmu_mutex {
        //! PMU mutex register layout

        /// Token/value field (7:0)
        pub const VALUE_MASK: u32 = 0xFF;
        /// Token generator not initialized
        pub const ID_VALUE_INIT: u32 = 0x00;
        /// Token generator exhausted
        pub const ID_VALUE_NOT_AVAIL: u32 = 0xFF;
        /// Slot value meaning "unlocked"
        pub const VALUE_INITIAL_LOCK: u32 = 0x00;
    }
}

// =============================================================================
// REGISTER I/O
// =============================================================================

/// 32-bit register access
///
/// Implemented by [`MmioRegion`] for real hardware and by in-memory
/// register files in tests.
pub trait RegisterIo: Send + Sync {
    /// Read 32-bit register
    fn read32(&self, offset: u32) -> u32;

    /// Write 32-bit register
    fn write32(&self, offset: u32, value: u32);

    /// Write with mask (read-modify-write)
    fn write32_masked(&self, offset: u32, value: u32, mask: u32) {
        let current = self.read32(offset);
        self.write32(offset, (current & !mask) | (value & mask));
    }
}

impl<R: RegisterIo + ?Sized> RegisterIo for &R {
    fn read32(&self, offset: u32) -> u32 {
        (**self).read32(offset)
    }

    fn write32(&self, offset: u32, value: u32) {
        (**self).write32(offset, value)
    }
}

// =============================================================================
// MMIO REGION
// =============================================================================

/// Mapped BAR0 window
#[derive(Debug)]
pub struct MmioRegion {
    /// Virtual address of the mapping
    virt_addr: usize,
    /// Mapping size in bytes
    size: usize,
}

impl MmioRegion {
    /// Wrap an existing BAR0 mapping
    ///
    /// # Safety
    /// `virt_addr..virt_addr + size` must be a live uncached device mapping
    /// for as long as this region exists.
    pub unsafe fn new(virt_addr: usize, size: usize) -> Self {
        Self { virt_addr, size }
    }

    /// Region size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    fn check(&self, offset: u32) -> bool {
        offset % 4 == 0 && (offset as usize) + 4 <= self.size
    }
}

// SAFETY: register accesses are single volatile word operations
unsafe impl Send for MmioRegion {}
// SAFETY: same as above
unsafe impl Sync for MmioRegion {}

impl RegisterIo for MmioRegion {
    fn read32(&self, offset: u32) -> u32 {
        if !self.check(offset) {
            log::error!("mmio: read32 out of range {:#x}", offset);
            return u32::MAX;
        }
        let ptr = (self.virt_addr + offset as usize) as *const u32;
        // SAFETY: bounds and alignment checked, mapping guaranteed by `new`
        let value = unsafe { core::ptr::read_volatile(ptr) };
        fence::mmio_read_barrier();
        value
    }

    fn write32(&self, offset: u32, value: u32) {
        if !self.check(offset) {
            log::error!("mmio: write32 out of range {:#x}", offset);
            return;
        }
        fence::mmio_write_barrier();
        let ptr = (self.virt_addr + offset as usize) as *mut u32;
        // SAFETY: bounds and alignment checked, mapping guaranteed by `new`
        unsafe { core::ptr::write_volatile(ptr, value) }
    }
}

// =============================================================================
// MMIO UTILS
// =============================================================================

/// Helper to extract fields from register values
pub const fn extract_field(value: u32, low_bit: u8, high_bit: u8) -> u32 {
    let width = (high_bit - low_bit + 1) as u32;
    let mask = if width >= 32 { u32::MAX } else { (1u32 << width) - 1 };
    (value >> low_bit) & mask
}

/// Helper to insert field into register value
pub const fn insert_field(value: u32, field: u32, low_bit: u8, high_bit: u8) -> u32 {
    let width = (high_bit - low_bit + 1) as u32;
    let mask = if width >= 32 { u32::MAX } else { ((1u32 << width) - 1) << low_bit };
    (value & !mask) | ((field << low_bit) & mask)
}

// =============================================================================
// MEMORY FENCE OPERATIONS
// =============================================================================

/// Memory barrier types for MMIO
pub mod fence {
    //! Memory barrier operations

    /// Compiler fence (prevents reordering)
    #[inline(always)]
    pub fn compiler() {
        core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
    }

    /// Memory barrier before MMIO write
    #[inline(always)]
    pub fn mmio_write_barrier() {
        #[cfg(target_arch = "aarch64")]
        {
            // SAFETY: This is a memory barrier instruction
            unsafe {
                core::arch::asm!("dmb st", options(nostack, preserves_flags));
            }
        }

        #[cfg(not(target_arch = "aarch64"))]
        {
            // x86_64 has strong memory model, compiler fence is sufficient
            compiler();
        }
    }

    /// Memory barrier after MMIO read
    #[inline(always)]
    pub fn mmio_read_barrier() {
        #[cfg(target_arch = "aarch64")]
        {
            // SAFETY: This is a memory barrier instruction
            unsafe {
                core::arch::asm!("dmb ld", options(nostack, preserves_flags));
            }
        }

        #[cfg(not(target_arch = "aarch64"))]
        {
            compiler();
        }
    }
}
