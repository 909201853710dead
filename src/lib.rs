// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! # Lazy Snapshot Algorithm software transactional memory
//!
//! This crate implements the core runtime of a word-based software transactional memory
//! engine following the Lazy Snapshot Algorithm (LSA) with 64-bit version locks: concurrent
//! threads run blocks of memory reads and writes as speculative transactions that either
//! atomically commit or abort with no observable effect, using optimistic concurrency
//! control and read-set validation against a global logical clock.
//!
//! The engine is deliberately narrow. Out of scope: the bytecode instrumentation that would
//! rewrite a hosted language's field accesses into calls against [`TransactionContext`]; the
//! workload/benchmark harness built on top of it; anything about how a concrete "object" is
//! laid out in memory beyond the minimal [`TObject`] shape this crate needs to operate on.
//! What's in scope is everything correctness-critical: the versioned lock table, the
//! read/write sets, and the begin/read/write/validate/extend/commit/rollback protocol that
//! ties them together.
#![allow(clippy::type_complexity)]

mod access;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod hint;
pub mod lock_table;
pub mod object;
pub mod retry;
pub mod runtime;
pub mod word;

pub use clock::GlobalClock;
pub use config::Config;
pub use context::{TransactionContext, TxState};
pub use error::TxError;
pub use hint::{BlockId, ReadOnlyHintTable};
pub use lock_table::LockTable;
pub use object::{FieldOffset, TObject};
pub use retry::atomically;
pub use runtime::Runtime;
pub use word::{ObjectRef, TxWord, TypeTag};
