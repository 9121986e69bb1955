//! # Runlist Table
//!
//! One lock per active runlist. Every preempt attempt against a runlist
//! runs with that runlist's lock held, so attempts on the same runlist never
//! interleave their register writes while different runlists proceed in
//! parallel.
//!
//! Multi-runlist operations take the locks in ascending runlist id order
//! through [`RunlistTable::lock_runlists`].
//!
//! A preempt can hold a runlist lock for a full context-switch timeout, so
//! contending threads sleep on the lock instead of spinning. A lock poisoned
//! by a panicking holder is reported as [`Error::Internal`].

use core::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard};

use magma_core::{EngineMask, Error, Result, Runlist, RunlistEnable, RunlistId};
use magma_hal::FifoHal;

/// Runlist ids must fit a `u32` runlist mask
pub const MAX_RUNLISTS: usize = 32;

// =============================================================================
// TABLE
// =============================================================================

/// Active runlists of one device, indexed by id
#[derive(Debug)]
pub struct RunlistTable {
    slots: Vec<Option<Mutex<Runlist>>>,
    active_mask: u32,
}

impl RunlistTable {
    /// Build the table from the runlists discovered at device init
    ///
    /// Fails on an out-of-range or duplicated id.
    pub fn new(runlists: impl IntoIterator<Item = Runlist>) -> Result<Self> {
        let mut slots: Vec<Option<Mutex<Runlist>>> = Vec::new();
        let mut active_mask = 0u32;

        for runlist in runlists {
            let index = runlist.id.raw() as usize;
            if !runlist.id.is_valid() || index >= MAX_RUNLISTS {
                log::error!("runlist: id {:?} out of range", runlist.id);
                return Err(Error::InvalidParameter);
            }
            if active_mask & runlist.id.mask() != 0 {
                log::error!("runlist: id {} registered twice", runlist.id);
                return Err(Error::InvalidParameter);
            }

            if slots.len() <= index {
                slots.resize_with(index + 1, || None);
            }
            active_mask |= runlist.id.mask();
            slots[index] = Some(Mutex::new(runlist));
        }

        Ok(Self { slots, active_mask })
    }

    /// Bitmask of active runlist ids
    #[inline]
    pub fn active_mask(&self) -> u32 {
        self.active_mask
    }

    /// Number of active runlists
    pub fn len(&self) -> usize {
        self.active_mask.count_ones() as usize
    }

    /// Check if the table has no runlist
    pub fn is_empty(&self) -> bool {
        self.active_mask == 0
    }

    fn slot(&self, id: RunlistId) -> Option<&Mutex<Runlist>> {
        if !id.is_valid() {
            return None;
        }
        self.slots.get(id.raw() as usize)?.as_ref()
    }

    /// Check if `id` is an active runlist
    pub fn contains(&self, id: RunlistId) -> bool {
        self.slot(id).is_some()
    }

    /// Lock one runlist
    pub fn lock(&self, id: RunlistId) -> Result<MutexGuard<'_, Runlist>> {
        let slot = self.slot(id).ok_or(Error::NotFound)?;
        slot.lock().map_err(|_| {
            log::error!("runlist: lock on runlist {} poisoned", id);
            Error::Internal
        })
    }

    /// Lock every active runlist in `mask`, lowest id first
    ///
    /// Bits naming inactive runlists are ignored; [`RunlistsGuard::mask`]
    /// reports what was actually locked. Locks already taken are released
    /// again if a later one turns out poisoned.
    pub fn lock_runlists(&self, mask: u32) -> Result<RunlistsGuard<'_>> {
        let mut guards = Vec::new();
        let mut locked = 0u32;

        for (index, slot) in self.slots.iter().enumerate() {
            let bit = 1u32 << index;
            if mask & bit == 0 {
                continue;
            }
            if let Some(runlist) = slot {
                let guard = runlist.lock().map_err(|_| {
                    log::error!("runlist: lock on runlist {} poisoned", index);
                    Error::Internal
                })?;
                guards.push(guard);
                locked |= bit;
            }
        }

        Ok(RunlistsGuard {
            guards,
            mask: locked,
        })
    }

    /// Hand the engines flagged for reset on `id` to recovery, clearing them
    pub fn take_reset_eng_bitmask(&self, id: RunlistId) -> Result<EngineMask> {
        let mut runlist = self.lock(id)?;
        Ok(core::mem::replace(
            &mut runlist.reset_eng_bitmask,
            EngineMask::EMPTY,
        ))
    }
}

// =============================================================================
// MULTI-RUNLIST GUARD
// =============================================================================

/// Locks held on a set of runlists
///
/// Released in reverse acquisition order when dropped.
#[derive(Debug)]
pub struct RunlistsGuard<'a> {
    guards: Vec<MutexGuard<'a, Runlist>>,
    mask: u32,
}

impl RunlistsGuard<'_> {
    /// Runlists actually locked
    #[inline]
    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// Check if `id` is locked by this guard
    pub fn holds(&self, id: RunlistId) -> bool {
        id.is_valid() && id.raw() < MAX_RUNLISTS as u32 && self.mask & id.mask() != 0
    }

    /// Locked runlists, lowest id first
    pub fn iter(&self) -> impl Iterator<Item = &Runlist> {
        self.guards.iter().map(|guard| &**guard)
    }

    /// Locked runlists, mutable
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Runlist> {
        self.guards.iter_mut().map(|guard| &mut **guard)
    }
}

impl Drop for RunlistsGuard<'_> {
    fn drop(&mut self) {
        while let Some(guard) = self.guards.pop() {
            drop(guard);
        }
    }
}

// =============================================================================
// DISABLE GUARD
// =============================================================================

/// Scheduling disabled on a runlist for the life of the guard
///
/// Only touches hardware when `active`; otherwise the runlist stays
/// enabled throughout. Dropping the guard re-enables scheduling on every
/// exit path.
#[derive(Debug)]
pub struct RunlistDisableGuard<'a, H: FifoHal + ?Sized> {
    runlist: &'a mut Runlist,
    hal: &'a H,
    active: bool,
}

impl<'a, H: FifoHal + ?Sized> RunlistDisableGuard<'a, H> {
    /// Disable scheduling on `runlist` if `active`
    pub fn new(runlist: &'a mut Runlist, hal: &'a H, active: bool) -> Self {
        if active {
            hal.set_runlist_state(runlist.id.mask(), RunlistEnable::Disabled);
            runlist.state = RunlistEnable::Disabled;
        }
        Self {
            runlist,
            hal,
            active,
        }
    }

    /// Check if this guard disabled the runlist
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl<H: FifoHal + ?Sized> Deref for RunlistDisableGuard<'_, H> {
    type Target = Runlist;

    fn deref(&self) -> &Runlist {
        self.runlist
    }
}

impl<H: FifoHal + ?Sized> DerefMut for RunlistDisableGuard<'_, H> {
    fn deref_mut(&mut self) -> &mut Runlist {
        self.runlist
    }
}

impl<H: FifoHal + ?Sized> Drop for RunlistDisableGuard<'_, H> {
    fn drop(&mut self) {
        if self.active {
            self.hal
                .set_runlist_state(self.runlist.id.mask(), RunlistEnable::Enabled);
            self.runlist.state = RunlistEnable::Enabled;
        }
    }
}
