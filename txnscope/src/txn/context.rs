// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Transaction context state management
//!
//! A [`TransactionContext`] is one entry in a chain's nesting stack: immutable
//! identity (id, nesting level, resource handle) plus mutable completion
//! state. Status transitions are forward-only: `Active -> Committed` or
//! `Active -> RolledBack`, never back.

use crate::session::provider::SessionHandle;
use crate::txn::error::{TxnError, TxnResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant, SystemTime};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Unique identifier for a transaction context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Generate a new unique transaction id
    pub fn new() -> Self {
        TransactionId(Uuid::new_v4())
    }

    /// Get the underlying id value
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn_{}", self.0.simple())
    }
}

/// Transaction context lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Context is active and can be committed or rolled back
    Active,
    /// Context has been committed
    Committed,
    /// Context has been rolled back (explicitly, by poison propagation, or by
    /// a deadline timer)
    RolledBack,
}

impl TransactionStatus {
    /// Get string representation for display
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Active => "ACTIVE",
            TransactionStatus::Committed => "COMMITTED",
            TransactionStatus::RolledBack => "ROLLED_BACK",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mutable completion state, guarded by one mutex so a status decision and its
/// transition are a single atomic step.
struct ContextInner {
    status: TransactionStatus,
    end_time: Option<SystemTime>,
    /// Deadline timer task, present only on an armed level-0 context.
    timer: Option<JoinHandle<()>>,
}

/// One entry in a chain's transaction nesting stack
///
/// The level-0 context owns its resource handle; nested contexts borrow the
/// same handle and never release or re-fork it.
pub struct TransactionContext {
    id: TransactionId,
    nesting_level: usize,
    handle: SessionHandle,
    owns_handle: bool,
    start_time: SystemTime,
    deadline: Option<Instant>,
    inner: Mutex<ContextInner>,
}

impl TransactionContext {
    /// Create the outermost (level-0) context of a chain. It owns the handle
    /// and carries the chain's deadline.
    pub(crate) fn new_root(handle: SessionHandle, deadline: Instant) -> Self {
        Self {
            id: TransactionId::new(),
            nesting_level: 0,
            handle,
            owns_handle: true,
            start_time: SystemTime::now(),
            deadline: Some(deadline),
            inner: Mutex::new(ContextInner {
                status: TransactionStatus::Active,
                end_time: None,
                timer: None,
            }),
        }
    }

    /// Create a nested context that borrows the ambient resource handle.
    /// Nested contexts carry no independent deadline.
    pub(crate) fn new_nested(nesting_level: usize, handle: SessionHandle) -> Self {
        Self {
            id: TransactionId::new(),
            nesting_level,
            handle,
            owns_handle: false,
            start_time: SystemTime::now(),
            deadline: None,
            inner: Mutex::new(ContextInner {
                status: TransactionStatus::Active,
                end_time: None,
                timer: None,
            }),
        }
    }

    /// Get the context id
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Get the nesting level (0 = outermost)
    pub fn nesting_level(&self) -> usize {
        self.nesting_level
    }

    /// Get the resource handle this context is attached to
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Whether this context owns the resource handle (level 0 only)
    pub fn owns_handle(&self) -> bool {
        self.owns_handle
    }

    /// Wall-clock time this context was created
    pub fn start_time(&self) -> SystemTime {
        self.start_time
    }

    /// Deadline after which an active level-0 context is eligible for forced
    /// rollback. `None` for nested contexts.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Get the current status
    pub fn status(&self) -> TransactionStatus {
        self.inner.lock().status
    }

    /// Check if the context is still active
    pub fn is_active(&self) -> bool {
        self.status() == TransactionStatus::Active
    }

    /// Check if the context has been committed or rolled back
    pub fn is_completed(&self) -> bool {
        self.status() != TransactionStatus::Active
    }

    /// How long this context has been (or was) open
    pub fn duration(&self) -> Duration {
        let end_time = self.inner.lock().end_time.unwrap_or_else(SystemTime::now);
        end_time.duration_since(self.start_time).unwrap_or_default()
    }

    /// Transition `Active -> Committed`. The status read and the transition
    /// are one atomic step; a completed context is rejected.
    pub(crate) fn mark_committed(&self) -> TxnResult<()> {
        let mut inner = self.inner.lock();
        if inner.status != TransactionStatus::Active {
            return Err(TxnError::AlreadyCompleted {
                id: self.id,
                status: inner.status,
            });
        }
        inner.status = TransactionStatus::Committed;
        inner.end_time = Some(SystemTime::now());
        Ok(())
    }

    /// Transition `Active -> RolledBack`, rejecting a completed context.
    pub(crate) fn mark_rolled_back(&self) -> TxnResult<()> {
        let mut inner = self.inner.lock();
        if inner.status != TransactionStatus::Active {
            return Err(TxnError::AlreadyCompleted {
                id: self.id,
                status: inner.status,
            });
        }
        inner.status = TransactionStatus::RolledBack;
        inner.end_time = Some(SystemTime::now());
        Ok(())
    }

    /// Force the status to `RolledBack` regardless of the current state.
    ///
    /// Used by the poison-propagation sweep (where a second sweep over an
    /// already rolled-back context is a no-op) and by the flush-failure path
    /// at level 0 (which overrides a just-recorded commit). Returns whether a
    /// transition actually happened.
    pub(crate) fn force_rolled_back(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.status == TransactionStatus::RolledBack {
            return false;
        }
        inner.status = TransactionStatus::RolledBack;
        inner.end_time = Some(SystemTime::now());
        true
    }

    /// Attach the deadline timer task to this context.
    pub(crate) fn arm_timer(&self, timer: JoinHandle<()>) {
        self.inner.lock().timer = Some(timer);
    }

    /// Abort and drop any pending deadline timer. Mandatory on normal
    /// commit/rollback so a stale timer cannot roll back a handle that has
    /// already been reused.
    pub(crate) fn cancel_timer(&self) {
        if let Some(timer) = self.inner.lock().timer.take() {
            timer.abort();
        }
    }

    /// Detach the timer without aborting it. Called by the timer task itself
    /// before running the forced rollback: aborting its own task would cancel
    /// the rollback at the next await point.
    pub(crate) fn take_timer(&self) -> Option<JoinHandle<()>> {
        self.inner.lock().timer.take()
    }
}

impl std::fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionContext")
            .field("id", &self.id)
            .field("nesting_level", &self.nesting_level)
            .field("owns_handle", &self.owns_handle)
            .field("status", &self.status())
            .finish()
    }
}
