// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Access descriptors: the small per-location records a transaction keeps while it runs,
//! discarded on commit or rollback.

use crate::object::{FieldOffset, TObject};
use crate::word::TypeTag;

/// A single recorded read: the location, which slot it hashed to, and the lock word
/// observed at the time of the read.
pub(crate) struct ReadAccess {
    pub(crate) obj: TObject,
    pub(crate) field: FieldOffset,
    pub(crate) slot: usize,
    pub(crate) observed_lock: u64,
}

impl ReadAccess {
    pub(crate) fn matches(&self, obj: &TObject, field: FieldOffset) -> bool {
        self.obj.id() == obj.id() && self.field == field
    }
}

/// A single pending write: the location, its declared type, the pending bit pattern, and
/// the lock word that was present on the slot before this transaction acquired it.
pub(crate) struct WriteAccess {
    pub(crate) obj: TObject,
    pub(crate) field: FieldOffset,
    pub(crate) tag: TypeTag,
    pub(crate) pending_value: u64,
    pub(crate) previous_lock: u64,
}

impl WriteAccess {
    pub(crate) fn matches(&self, obj: &TObject, field: FieldOffset) -> bool {
        self.obj.id() == obj.id() && self.field == field
    }
}

/// The chain of writes rooted at one lock-table slot. More than one entry means distinct
/// locations hashed to the same slot within this transaction; they share the slot's single
/// ownership and are all published (or all rolled back) together.
pub(crate) struct WriteChain {
    entries: Vec<WriteAccess>,
}

impl WriteChain {
    pub(crate) fn new(first: WriteAccess) -> Self {
        Self { entries: vec![first] }
    }

    /// The lock value the slot held before this transaction's chain first acquired it --
    /// shared by every entry in the chain, since only the first acquisition observed it.
    pub(crate) fn previous_lock(&self) -> u64 {
        self.entries[0].previous_lock
    }

    pub(crate) fn find(&self, obj: &TObject, field: FieldOffset) -> Option<&WriteAccess> {
        self.entries.iter().find(|w| w.matches(obj, field))
    }

    pub(crate) fn find_mut(&mut self, obj: &TObject, field: FieldOffset) -> Option<&mut WriteAccess> {
        self.entries.iter_mut().find(|w| w.matches(obj, field))
    }

    pub(crate) fn push(&mut self, obj: TObject, field: FieldOffset, tag: TypeTag, pending_value: u64) {
        let previous_lock = self.previous_lock();
        self.entries.push(WriteAccess {
            obj,
            field,
            tag,
            pending_value,
            previous_lock,
        });
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &WriteAccess> {
        self.entries.iter()
    }
}
