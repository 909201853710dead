// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The per-thread transaction context: the state machine that ties the lock table, the
//! global clock and the read-only hint table together into begin/read/write/commit/rollback.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, trace, warn};

use crate::access::{ReadAccess, WriteChain};
use crate::error::TxError;
use crate::hint::BlockId;
use crate::lock_table::{is_owned, owner_of};
use crate::object::{FieldOffset, TObject};
use crate::runtime::Runtime;
use crate::word::TxWord;

/// The transaction context's lifecycle. At most one transaction is active per thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Idle,
    Active,
    Committed,
    Aborted,
}

/// A per-thread handle into a [`Runtime`]. Create one per thread and reuse it across many
/// `begin`/`commit`/`rollback` cycles -- the thread id it owns is stable for its lifetime,
/// matching "ownership is per thread, not per transaction instance".
pub struct TransactionContext {
    runtime: Arc<Runtime>,
    self_id: u64,

    state: TxState,
    block_id: BlockId,
    start_time: u64,
    end_time: u64,
    read_write_hint: bool,

    read_set: Vec<ReadAccess>,
    write_set: HashMap<usize, WriteChain>,

    /// Scratch slot populated by `before_read_access` and consumed by the paired
    /// `add_read_access` call, mirroring the two-step instrumentation calling convention.
    scratch_read: Option<(usize, u64)>,
}

impl TransactionContext {
    pub fn new(runtime: Arc<Runtime>) -> Self {
        let self_id = runtime.next_thread_id();
        Self {
            runtime,
            self_id,
            state: TxState::Idle,
            block_id: 0,
            start_time: 0,
            end_time: 0,
            read_write_hint: true,
            read_set: Vec::new(),
            write_set: HashMap::new(),
            scratch_read: None,
        }
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    /// Starts a new transaction attempt for `block_id`. Legal from any state -- this is
    /// how the surrounding retry loop begins the next attempt after an abort.
    pub fn begin(&mut self, block_id: BlockId) {
        self.read_set.clear();
        self.write_set.clear();
        self.scratch_read = None;

        let now = self.runtime.clock.current();
        self.start_time = now;
        self.end_time = now;
        self.block_id = block_id;

        self.read_write_hint = if self.runtime.config.read_only_hint_enabled {
            self.runtime.hints.get(block_id)
        } else {
            true
        };

        self.state = TxState::Active;
        trace!("tx({}): begin block {block_id} at version {now}", self.self_id);
    }

    /// Stage one of a read: classify the slot's lock word without reading the field yet.
    pub fn before_read_access(&mut self, obj: &TObject, field: FieldOffset) -> Result<(), TxError> {
        debug_assert_eq!(self.state, TxState::Active);

        let slot = self.runtime.lock_table.slot_for(obj.id(), field);
        let word = self.runtime.lock_table.check_lock(slot, self.self_id)?;

        if self.runtime.config.read_locked_mode && is_owned(word) {
            warn!("tx({}): read-locked mode aborts on any owned slot {slot}", self.self_id);
            return Err(TxError::LockedByOther);
        }

        self.scratch_read = Some((slot, word));
        Ok(())
    }

    /// Stage two of a read: consult the scratch lock word staged by `before_read_access`
    /// and either return a pending value from our own write set, or perform the LSA
    /// "timestamp sandwich" against the live field, extending the snapshot if necessary.
    pub fn add_read_access<W: TxWord>(&mut self, obj: &TObject, field: FieldOffset) -> Result<W, TxError> {
        let (slot, mut word) = self.scratch_read.take().expect("before_read_access must precede add_read_access");

        loop {
            if is_owned(word) {
                // check_lock already rejected ownership by anyone but us.
                if let Some(chain) = self.write_set.get(&slot) {
                    if let Some(w) = chain.find(obj, field) {
                        return Ok(W::from_bits(w.pending_value));
                    }
                }
                // Owned by us but never written: read the live value directly. No read-set
                // entry is recorded -- commit-time ownership already implies validation.
                return Ok(W::from_bits(obj.load_raw(field)));
            }

            let version = word;
            if version <= self.end_time {
                let value = obj.load_raw(field);
                let recheck = self.runtime.lock_table.check_lock(slot, self.self_id)?;
                if recheck != word {
                    trace!("tx({}): read sandwich restarted on slot {slot}", self.self_id);
                    word = recheck;
                    continue;
                }

                if self.read_write_hint {
                    self.read_set.push(ReadAccess {
                        obj: obj.clone(),
                        field,
                        slot,
                        observed_lock: word,
                    });
                }
                return Ok(W::from_bits(value));
            }

            debug!("tx({}): version {version} beyond end_time {}, extending", self.self_id, self.end_time);
            if self.extend() {
                word = self.runtime.lock_table.check_lock(slot, self.self_id)?;
                continue;
            }
            return Err(TxError::ExtendFailure);
        }
    }

    /// Reads `field` of `obj` as a `W`, combining `before_read_access`/`add_read_access`.
    pub fn read<W: TxWord>(&mut self, obj: &TObject, field: FieldOffset) -> Result<W, TxError> {
        self.before_read_access(obj, field)?;
        self.add_read_access(obj, field)
    }

    /// Records a pending write of `value` to `field` of `obj`.
    pub fn write<W: TxWord>(&mut self, obj: &TObject, field: FieldOffset, value: W) -> Result<(), TxError> {
        debug_assert_eq!(self.state, TxState::Active);

        if !self.read_write_hint {
            self.runtime.hints.insert(self.block_id, true);
            warn!("tx({}): first write under read-only hint on block {}", self.self_id, self.block_id);
            return Err(TxError::ReadOnlyHintFailure);
        }

        let slot = self.runtime.lock_table.slot_for(obj.id(), field);
        let prev = self.runtime.lock_table.lock(slot, self.self_id)?;

        if is_owned(prev) {
            debug_assert_eq!(owner_of(prev), self.self_id, "lock() only yields Ok on free or self-owned slots");
            let chain = self.write_set.get_mut(&slot).expect("slot owned by self must have a write chain");
            if let Some(existing) = chain.find_mut(obj, field) {
                existing.pending_value = value.to_bits();
            } else {
                chain.push(obj.clone(), field, W::TAG, value.to_bits());
            }
            return Ok(());
        }

        let version = prev;
        if version > self.end_time && self.read_set.iter().any(|r| r.matches(obj, field)) {
            self.runtime.lock_table.set_and_release(slot, version);
            warn!("tx({}): write-after-read hazard on slot {slot}", self.self_id);
            return Err(TxError::WriteAfterReadFailure);
        }

        debug_assert!(
            !self.write_set.contains_key(&slot),
            "a free slot we just locked cannot already have a write chain"
        );
        self.write_set.insert(
            slot,
            WriteChain::new(crate::access::WriteAccess {
                obj: obj.clone(),
                field,
                tag: W::TAG,
                pending_value: value.to_bits(),
                previous_lock: version,
            }),
        );

        Ok(())
    }

    /// Revalidates every entry in the read set against the lock table's current state.
    pub fn validate(&self) -> bool {
        for r in &self.read_set {
            let word = self.runtime.lock_table.peek(r.slot);
            if is_owned(word) {
                if owner_of(word) != self.self_id {
                    return false;
                }
                // Owned by us (a later write acquired the slot): valid.
            } else if word != r.observed_lock {
                return false;
            }
        }
        true
    }

    /// Raises `end_time` to the clock's current value if the read set still validates.
    pub fn extend(&mut self) -> bool {
        let now = self.runtime.clock.current();
        if self.validate() {
            self.end_time = now;
            trace!("tx({}): extended snapshot to {now}", self.self_id);
            true
        } else {
            debug!("tx({}): extension failed validation", self.self_id);
            false
        }
    }

    /// Attempts to commit. Returns `true` on success, `false` on validation failure (after
    /// rolling back). A transaction with an empty write set always succeeds without
    /// touching the global clock.
    pub fn commit(&mut self) -> bool {
        debug_assert_eq!(self.state, TxState::Active);

        if self.write_set.is_empty() {
            self.state = TxState::Committed;
            trace!("tx({}): read-only commit", self.self_id);
            return true;
        }

        let new_clock = self.runtime.clock.increment_and_get();
        let implicitly_valid = new_clock == self.start_time + 1;

        if !implicitly_valid && !self.validate() {
            warn!("tx({}): commit-time validation failed", self.self_id);
            self.rollback();
            return false;
        }

        for (slot, chain) in &self.write_set {
            for w in chain.iter() {
                trace!("tx({}): publishing {:?} to slot {slot} field {}", self.self_id, w.tag, w.field);
                w.obj.store_raw(w.field, w.pending_value);
            }
            self.runtime.lock_table.set_and_release(*slot, new_clock);
        }

        debug!("tx({}): committed at version {new_clock}", self.self_id);
        self.read_set.clear();
        self.write_set.clear();
        self.state = TxState::Committed;
        true
    }

    /// Discards the transaction's effects, restoring every locked slot to the version it
    /// held before this transaction touched it.
    pub fn rollback(&mut self) {
        for (slot, chain) in &self.write_set {
            self.runtime.lock_table.set_and_release(*slot, chain.previous_lock());
        }

        self.read_set.clear();
        self.write_set.clear();
        self.state = TxState::Aborted;
        debug!("tx({}): rolled back", self.self_id);
    }
}
