// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The explicitly-constructed, shareable bundle of process-wide transactional state.
//! Every [`crate::context::TransactionContext`] borrows one of these; there is no hidden
//! global, so each test (or each independent subsystem within a process) can build its own
//! isolated `Runtime`.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::clock::GlobalClock;
use crate::config::Config;
use crate::hint::ReadOnlyHintTable;
use crate::lock_table::LockTable;

pub struct Runtime {
    pub(crate) lock_table: LockTable,
    pub(crate) clock: GlobalClock,
    pub(crate) hints: ReadOnlyHintTable,
    pub(crate) config: Config,
    next_thread_id: AtomicU64,
}

impl Runtime {
    pub fn new(config: Config) -> Self {
        Self {
            lock_table: LockTable::new(config.lock_table_size),
            clock: GlobalClock::new(),
            hints: ReadOnlyHintTable::new(),
            config,
            next_thread_id: AtomicU64::new(0),
        }
    }

    /// Mints a fresh thread id for a new [`crate::context::TransactionContext`]. Ownership
    /// in the lock table is per thread, not per transaction instance, so this is called
    /// once per context, not once per `begin`.
    pub(crate) fn next_thread_id(&self) -> u64 {
        self.next_thread_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Exposes the global clock for introspection (tests, metrics, benches). The core
    /// protocol itself only ever calls `current`/`increment_and_get` internally.
    pub fn clock(&self) -> &GlobalClock {
        &self.clock
    }

    /// Exposes the lock table for introspection (tests, metrics, benches).
    pub fn lock_table(&self) -> &LockTable {
        &self.lock_table
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_ids_are_distinct() {
        let runtime = Runtime::default();
        let a = runtime.next_thread_id();
        let b = runtime.next_thread_id();
        assert_ne!(a, b);
    }
}
