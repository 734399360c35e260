// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Chain-local context stacks
//!
//! Each logical call chain (one incoming request, one job, one test body)
//! owns a [`ContextStack`]: the ordered sequence of transaction contexts the
//! chain has begun and not yet resolved. The stack is installed in
//! `tokio::task_local!` storage so everything awaited inside a chain scope
//! inherits it implicitly, while tasks spawned with `tokio::spawn` start
//! fresh and can never observe another chain's stack.
//!
//! The stack payload itself is `Arc`-shared rather than purely task-local:
//! the detached deadline-timer task must be able to roll back a stuck chain
//! from outside the chain's own task.

use crate::txn::context::{TransactionContext, TransactionId};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;

/// Ordered stack of transaction contexts for one logical chain
///
/// Cloning is cheap and shares the same underlying storage. All compound
/// bookkeeping (depth check + push, find + sweep + truncate) runs under a
/// single lock acquisition with no await points, so no other logical step can
/// interleave between a decision and its matching mutation.
#[derive(Clone, Default)]
pub(crate) struct ContextStack {
    entries: Arc<Mutex<Vec<Arc<TransactionContext>>>>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the entries under the stack lock.
    pub fn with_entries<R>(&self, f: impl FnOnce(&mut Vec<Arc<TransactionContext>>) -> R) -> R {
        f(&mut self.entries.lock())
    }

    /// Current top of the stack, if any
    pub fn top(&self) -> Option<Arc<TransactionContext>> {
        self.entries.lock().last().cloned()
    }

    /// Number of unresolved contexts in the chain
    pub fn depth(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Find a context by id
    pub fn find(&self, id: TransactionId) -> Option<Arc<TransactionContext>> {
        self.entries.lock().iter().find(|c| c.id() == id).cloned()
    }

    /// Remove a single context by id, leaving the rest untouched
    pub fn remove(&self, id: TransactionId) -> Option<Arc<TransactionContext>> {
        let mut entries = self.entries.lock();
        let pos = entries.iter().position(|c| c.id() == id)?;
        Some(entries.remove(pos))
    }
}

tokio::task_local! {
    /// Stack of the current logical chain. Follows the task across thread
    /// boundaries in work-stealing runtimes.
    static CHAIN_STACK: ContextStack;
}

/// Get the current chain's stack, if this task is inside a chain scope.
pub(crate) fn current_stack() -> Option<ContextStack> {
    CHAIN_STACK.try_with(|stack| stack.clone()).ok()
}

/// Check whether a chain scope is installed on this task.
pub(crate) fn in_chain() -> bool {
    CHAIN_STACK.try_with(|_| ()).is_ok()
}

/// Run a future as a fresh logical chain.
///
/// This is the propagation boundary: everything `fut` awaits (directly or
/// transitively) shares one context stack; sibling chains started with their
/// own `chain_scope` or via `tokio::spawn` are fully isolated. Entry points
/// that accept external work (request handlers, job runners) wrap each unit
/// in its own scope.
pub async fn chain_scope<F>(fut: F) -> F::Output
where
    F: Future,
{
    CHAIN_STACK.scope(ContextStack::new(), fut).await
}

/// Run a future in the current chain if one is installed, otherwise as a
/// fresh chain. Used by `run_scoped`, which must work from bare entry points.
pub(crate) async fn chain_scope_if_absent<F>(fut: F) -> F::Output
where
    F: Future,
{
    if in_chain() {
        fut.await
    } else {
        chain_scope(fut).await
    }
}
