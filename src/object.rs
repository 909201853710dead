// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! [`TObject`] stands in for "a block of word-addressable memory the engine manages". The
//! bytecode instrumentation that would normally rewrite field accesses against arbitrary
//! user objects is out of scope (see the crate's top-level docs); this is the minimal
//! concrete memory shape the core protocol needs to operate on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A zero-based index into a [`TObject`]'s fields.
pub type FieldOffset = u64;

struct Fields {
    cells: Box<[AtomicU64]>,
}

/// A handle to a fixed-size block of word-sized (64-bit) transactional storage cells.
///
/// Object identity, as used by the lock table's hash, is the address of the backing
/// allocation -- stable for as long as any clone of this handle is reachable.
#[derive(Clone)]
pub struct TObject {
    inner: Arc<Fields>,
}

impl TObject {
    /// Allocates a new object with `field_count` zero-initialized word cells.
    pub fn new(field_count: usize) -> Self {
        let cells = (0..field_count).map(|_| AtomicU64::new(0)).collect::<Vec<_>>().into_boxed_slice();

        Self {
            inner: Arc::new(Fields { cells }),
        }
    }

    /// Allocates a new object with `field_count` cells, initializing a single field.
    pub fn with_initial(field_count: usize, field: FieldOffset, bits: u64) -> Self {
        let obj = Self::new(field_count);
        obj.inner.cells[field as usize].store(bits, Ordering::SeqCst);
        obj
    }

    /// A stable identity token for this object, used by the lock table's hash. Stable for
    /// the lifetime of the backing allocation.
    #[inline]
    pub fn id(&self) -> u64 {
        Arc::as_ptr(&self.inner) as u64
    }

    /// Number of word cells this object has.
    pub fn field_count(&self) -> usize {
        self.inner.cells.len()
    }

    /// Reads the live bit pattern of `field` directly, bypassing the transaction
    /// protocol. Used internally once a slot is confirmed to be owned by the reading
    /// transaction, and externally for inspecting committed state between transactions.
    #[inline]
    pub fn load_raw(&self, field: FieldOffset) -> u64 {
        self.inner.cells[field as usize].load(Ordering::SeqCst)
    }

    #[inline]
    pub(crate) fn store_raw(&self, field: FieldOffset, bits: u64) {
        self.inner.cells[field as usize].store(bits, Ordering::SeqCst);
    }
}

impl PartialEq for TObject {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for TObject {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_objects_have_distinct_ids() {
        let a = TObject::new(1);
        let b = TObject::new(1);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn clone_shares_identity() {
        let a = TObject::new(1);
        let b = a.clone();
        assert_eq!(a.id(), b.id());
        assert_eq!(a, b);
    }

    #[test]
    fn with_initial_seeds_field() {
        let obj = TObject::with_initial(2, 0, 42);
        assert_eq!(obj.load_raw(0), 42);
        assert_eq!(obj.load_raw(1), 0);
    }
}
