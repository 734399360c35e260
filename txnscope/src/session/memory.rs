// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory session provider
//!
//! Instance-owned provider with no external backend. Every fork, flush,
//! clear, and native commit/rollback is counted, and flush/clear can be made
//! to fail on demand, which is what the coordinator's failure-path tests are
//! built on. Also serves as the embedded default for code that wants
//! coordinator semantics without a real persistence layer.

use crate::session::provider::{ResourceSession, ScopedBody, SessionHandle, SessionProvider};
use crate::txn::error::{TxnError, TxnResult};
use crate::txn::options::TransactionOptions;
use async_trait::async_trait;
use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// One in-memory unit-of-work session
pub struct MemorySession {
    id: Uuid,
    flushes: AtomicUsize,
    clears: AtomicUsize,
}

impl MemorySession {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            flushes: AtomicUsize::new(0),
            clears: AtomicUsize::new(0),
        }
    }

    /// Unique id of this session
    pub fn session_id(&self) -> Uuid {
        self.id
    }

    /// Number of successful flushes performed on this session
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    /// Number of successful clears performed on this session
    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl ResourceSession for MemorySession {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Downcast a generic handle to the in-memory session type.
pub fn as_memory_session(handle: &SessionHandle) -> Option<&MemorySession> {
    handle.as_any().downcast_ref::<MemorySession>()
}

/// Instance-owned in-memory session provider
///
/// Each provider instance owns its own counters, so independent coordinators
/// in one process never observe each other's traffic.
#[derive(Default)]
pub struct MemorySessionProvider {
    forks: AtomicUsize,
    native_commits: AtomicUsize,
    native_rollbacks: AtomicUsize,
    fail_fork: AtomicBool,
    fail_flush: AtomicBool,
    fail_clear: AtomicBool,
}

impl MemorySessionProvider {
    /// Create a new provider with clean counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions forked from this provider
    pub fn fork_count(&self) -> usize {
        self.forks.load(Ordering::SeqCst)
    }

    /// Number of native transactional executions that committed
    pub fn native_commit_count(&self) -> usize {
        self.native_commits.load(Ordering::SeqCst)
    }

    /// Number of native transactional executions that rolled back
    pub fn native_rollback_count(&self) -> usize {
        self.native_rollbacks.load(Ordering::SeqCst)
    }

    /// Make subsequent forks fail
    pub fn set_fail_fork(&self, fail: bool) {
        self.fail_fork.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent flushes fail
    pub fn set_fail_flush(&self, fail: bool) {
        self.fail_flush.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent clears fail
    pub fn set_fail_clear(&self, fail: bool) {
        self.fail_clear.store(fail, Ordering::SeqCst);
    }

    fn own_session<'a>(&self, handle: &'a SessionHandle) -> TxnResult<&'a MemorySession> {
        as_memory_session(handle)
            .ok_or_else(|| TxnError::Provider("foreign session handle".to_string()))
    }
}

#[async_trait]
impl SessionProvider for MemorySessionProvider {
    async fn fork(&self) -> TxnResult<SessionHandle> {
        if self.fail_fork.load(Ordering::SeqCst) {
            return Err(TxnError::Provider("fork refused".to_string()));
        }
        self.forks.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemorySession::new()))
    }

    async fn flush(&self, handle: &SessionHandle) -> TxnResult<()> {
        let session = self.own_session(handle)?;
        if self.fail_flush.load(Ordering::SeqCst) {
            return Err(TxnError::Provider(format!(
                "flush failed for session {}",
                session.session_id()
            )));
        }
        session.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self, handle: &SessionHandle) -> TxnResult<()> {
        let session = self.own_session(handle)?;
        if self.fail_clear.load(Ordering::SeqCst) {
            return Err(TxnError::Provider(format!(
                "clear failed for session {}",
                session.session_id()
            )));
        }
        session.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn run_transactional<T>(
        &self,
        handle: SessionHandle,
        _options: &TransactionOptions,
        body: ScopedBody<T>,
    ) -> TxnResult<T>
    where
        T: Send + 'static,
    {
        self.own_session(&handle)?;
        let result = body(handle).await;
        match &result {
            Ok(_) => self.native_commits.fetch_add(1, Ordering::SeqCst),
            Err(_) => self.native_rollbacks.fetch_add(1, Ordering::SeqCst),
        };
        result
    }
}
