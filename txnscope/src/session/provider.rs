// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Session provider abstraction for pluggable persistence backends
//!
//! This module provides a trait-based abstraction over the persistence
//! layer's session pool, allowing different backends (a real connection
//! pool in production, [`MemorySessionProvider`](crate::MemorySessionProvider)
//! in tests and embedded use).

use crate::txn::error::TxnResult;
use crate::txn::options::TransactionOptions;
use async_trait::async_trait;
use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Opaque session object representing one physical unit-of-work
///
/// The coordinator never inspects a session; backends downcast through
/// `as_any` to reach their concrete type.
pub trait ResourceSession: Send + Sync {
    /// Downcast to the concrete session type
    fn as_any(&self) -> &dyn Any;
}

/// Shared reference to a resource session
///
/// Exactly one (level-0) context owns a handle; every nested context holds a
/// non-owning clone of the same handle.
pub type SessionHandle = Arc<dyn ResourceSession>;

/// Boxed unit of work executed inside a provider-native transaction
pub type ScopedBody<T> =
    Box<dyn FnOnce(SessionHandle) -> Pin<Box<dyn Future<Output = TxnResult<T>> + Send>> + Send>;

/// Abstract session provider interface
///
/// This trait defines the contract between the transaction coordinator and
/// the persistence layer. The coordinator treats it as an opaque capability:
/// it forks sessions, flushes or clears them, and delegates scoped execution
/// to the provider's own native transaction mechanism.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Fork a fresh transactional session from the shared pool
    ///
    /// # Returns
    /// * `Ok(handle)` - A session owned by the caller's level-0 context
    /// * `Err(e)` - Infrastructure failure acquiring a session
    async fn fork(&self) -> TxnResult<SessionHandle>;

    /// Flush pending work on the session (the physical commit)
    ///
    /// Invoked only when a level-0 context commits.
    async fn flush(&self, handle: &SessionHandle) -> TxnResult<()>;

    /// Invalidate the session so no partial state leaks into a later reuse
    /// of the underlying connection
    ///
    /// Invoked only when a level-0 context rolls back.
    async fn clear(&self, handle: &SessionHandle) -> TxnResult<()>;

    /// Execute `body` inside the provider's native transaction
    ///
    /// Isolation level and access mode from `options` are honored by the
    /// underlying engine itself. The provider commits on `Ok` and rolls back
    /// on `Err`; the body's error is returned unchanged.
    async fn run_transactional<T>(
        &self,
        handle: SessionHandle,
        options: &TransactionOptions,
        body: ScopedBody<T>,
    ) -> TxnResult<T>
    where
        T: Send + 'static;
}
