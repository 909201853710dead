// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error as DeriveError;

/// The internal abort taxonomy of the engine.
///
/// Every variant is a non-fatal abort: the transaction's effects are discarded and the
/// caller is expected to retry from `begin`. The variant only matters for instrumentation
/// and for deciding whether the read-only hint table needs to flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, DeriveError)]
pub enum TxError {
    /// A read or write observed a slot owned by another thread.
    #[error("slot is locked by another thread")]
    LockedByOther,

    /// A read saw a version beyond `endTime` and `extend()` failed to validate.
    #[error("snapshot extension failed validation")]
    ExtendFailure,

    /// A write found a newer committed version than the snapshot on a location already
    /// present in the read set.
    #[error("write observed a newer version of a location already in the read set")]
    WriteAfterReadFailure,

    /// The first write in a transaction that began under the read-only-hint optimization.
    #[error("first write under a read-only hint")]
    ReadOnlyHintFailure,

    /// Commit-time read-set revalidation failed.
    #[error("commit-time validation failed")]
    ValidationFailure,
}
