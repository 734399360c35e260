// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Coordinator error types

use crate::txn::context::{TransactionId, TransactionStatus};
use thiserror::Error;

/// Errors surfaced by the transaction coordinator
#[derive(Error, Debug)]
pub enum TxnError {
    /// A `begin` would push the chain past its configured nesting depth.
    /// Recoverable: the caller must not open another nested scope.
    #[error("nesting limit exceeded: chain already holds {depth} contexts (limit {limit})")]
    NestingLimitExceeded { depth: usize, limit: usize },

    /// The referenced context is not in the current chain's stack. Usually a
    /// caller bug: a context from another chain, or one already dropped by a
    /// rollback truncation.
    #[error("unknown transaction context: {0}")]
    UnknownContext(TransactionId),

    /// Double commit/rollback on the same context.
    #[error("transaction context {id} already completed as {status}")]
    AlreadyCompleted {
        id: TransactionId,
        status: TransactionStatus,
    },

    /// The physical flush at level 0 failed. The context has already been
    /// forced to ROLLED_BACK by the time this is surfaced.
    #[error("underlying commit failed: {0}")]
    UnderlyingCommitFailure(String),

    /// Infrastructure failure reported by the session provider
    /// (fork/flush/clear or native transactional execution).
    #[error("session provider error: {0}")]
    Provider(String),

    /// `begin` was called on a task with no chain scope installed. Task-local
    /// storage cannot be installed retroactively by a callee; wrap the entry
    /// point in [`chain_scope`](crate::chain_scope) or use `run_scoped`.
    #[error("no transaction chain scope is active on this task")]
    NoChainScope,
}

/// Result alias for coordinator operations
pub type TxnResult<T> = Result<T, TxnError>;
