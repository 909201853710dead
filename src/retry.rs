// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! A convenience retry loop for driving a [`TransactionContext`] to completion.
//!
//! This is explicitly *not* part of the core protocol: the core's contract ends at
//! signalling an abort via `Result<_, TxError>`. Deciding how (or whether) to retry is "the
//! surrounding harness's" job -- see the crate's top-level docs. This module exists only so
//! tests and examples have somewhere to drive transactions from without hand-writing the
//! loop every time.

use log::trace;

use crate::context::TransactionContext;
use crate::error::TxError;
use crate::hint::BlockId;

/// Retries `body` against `ctx` under `block_id` until it commits, discarding intermediate
/// aborts. `body` should be idempotent with respect to anything outside the transaction,
/// since it may run more than once.
pub fn atomically<T>(
    ctx: &mut TransactionContext,
    block_id: BlockId,
    mut body: impl FnMut(&mut TransactionContext) -> Result<T, TxError>,
) -> T {
    loop {
        ctx.begin(block_id);
        match body(ctx) {
            Ok(value) => {
                if ctx.commit() {
                    return value;
                }
                trace!("atomically: commit-time validation failed, retrying block {block_id}");
            }
            Err(_) => {
                ctx.rollback();
                trace!("atomically: transaction body aborted, retrying block {block_id}");
            }
        }
    }
}
