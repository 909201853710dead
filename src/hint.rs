// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The read-only hint table: a process-wide map from an atomic-block identifier to whether
//! that block has ever written. Staleness is benign -- the worst case is one extra spurious
//! `ReadOnlyHintFailure` abort, which self-corrects on the next attempt.

use std::collections::HashMap;
use std::sync::RwLock;

/// Identifies an atomic block (the unit of instrumentation the surrounding harness
/// rewrites). Opaque to the engine beyond being a stable key.
pub type BlockId = u64;

#[derive(Default)]
pub struct ReadOnlyHintTable {
    hints: RwLock<HashMap<BlockId, bool>>,
}

impl ReadOnlyHintTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether `id` has ever been observed to write. Defaults to `false` (treated
    /// as read-only) for a block never seen before.
    pub fn get(&self, id: BlockId) -> bool {
        self.hints.read().expect("hint table poisoned").get(&id).copied().unwrap_or(false)
    }

    /// Idempotently marks `id` as a write-performing block.
    pub fn insert(&self, id: BlockId, value: bool) {
        self.hints.write().expect("hint table poisoned").insert(id, value);
    }
}
