// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The versioned lock table: a fixed-size array of 64-bit atomic words, indexed by a hash
//! of (object identity, field offset). A single atomic load classifies a slot as either
//! free-with-version or owned-by-thread, by sign: bit 63 is the owner flag, the remaining
//! 63 bits hold either the committed version or the owning thread's id.

use log::trace;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::TxError;

/// Bit 63 marks a slot as owned. When clear, the whole word is the committed version.
const OWNED_BIT: u64 = 1 << 63;

#[inline]
pub(crate) fn is_owned(word: u64) -> bool {
    word & OWNED_BIT != 0
}

#[inline]
pub(crate) fn owner_of(word: u64) -> u64 {
    word & !OWNED_BIT
}

#[inline]
fn owned_by(thread_id: u64) -> u64 {
    debug_assert_eq!(thread_id & OWNED_BIT, 0, "thread id must fit in 63 bits");
    OWNED_BIT | thread_id
}

/// A fixed-size, power-of-two-sized array of versioned locks.
pub struct LockTable {
    slots: Box<[AtomicU64]>,
    mask: u64,
}

impl LockTable {
    /// Creates a new lock table. `size` is rounded up to the next power of two.
    pub fn new(size: usize) -> Self {
        let size = size.next_power_of_two().max(1);
        let slots = (0..size).map(|_| AtomicU64::new(0)).collect::<Vec<_>>().into_boxed_slice();

        Self {
            slots,
            mask: (size - 1) as u64,
        }
    }

    /// Number of slots in the table.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Deterministically hashes a location to a slot index. Stable for the life of `obj`.
    pub fn slot_for(&self, obj: u64, field: u64) -> usize {
        let mut h = obj.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        h ^= field.wrapping_mul(0xBF58_476D_1CE4_E5B9);
        h ^= h >> 33;
        h = h.wrapping_mul(0xFF51_AFD7_ED55_8CCD);
        h ^= h >> 33;
        (h & self.mask) as usize
    }

    /// Loads the slot's word without classifying ownership. Never fails.
    #[inline]
    pub fn peek(&self, slot: usize) -> u64 {
        self.slots[slot].load(Ordering::Acquire)
    }

    /// Loads the slot's word, returning it unchanged if free or owned by `self_id`.
    /// Fails with [`TxError::LockedByOther`] if owned by anyone else. Never blocks.
    pub fn check_lock(&self, slot: usize, self_id: u64) -> Result<u64, TxError> {
        let word = self.slots[slot].load(Ordering::Acquire);
        if is_owned(word) && owner_of(word) != self_id {
            trace!("check_lock: slot {slot} locked by {}", owner_of(word));
            return Err(TxError::LockedByOther);
        }
        Ok(word)
    }

    /// Attempts to transition a free slot to owned-by-`self_id` with a single CAS.
    ///
    /// Returns the previous free-with-version value on success, or the unchanged
    /// owned-encoded value if the slot was already owned by `self_id`. Fails with
    /// [`TxError::LockedByOther`] if owned by another thread, or if the CAS lost a race
    /// to a concurrent locker -- there is no retry beyond the single CAS.
    pub fn lock(&self, slot: usize, self_id: u64) -> Result<u64, TxError> {
        let current = self.slots[slot].load(Ordering::Acquire);
        if is_owned(current) {
            if owner_of(current) == self_id {
                return Ok(current);
            }
            trace!("lock: slot {slot} already locked by {}", owner_of(current));
            return Err(TxError::LockedByOther);
        }

        let new = owned_by(self_id);
        self.slots[slot]
            .compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| current)
            .map_err(|_| {
                trace!("lock: slot {slot} CAS lost the race");
                TxError::LockedByOther
            })
    }

    /// Stores `version` into `slot`, clearing ownership. The caller must currently own
    /// the slot. Used both to publish a new version on commit and to restore the previous
    /// version on rollback.
    #[inline]
    pub fn set_and_release(&self, slot: usize, version: u64) {
        debug_assert!(!is_owned(version), "release value must be a free-with-version word");
        self.slots[slot].store(version, Ordering::Release);
    }
}
