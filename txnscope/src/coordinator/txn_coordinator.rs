// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Transaction coordinator implementation
//!
//! The coordinator guarantees at-most-one physical session per logical call
//! chain: the first `begin` (or `run_scoped`) in a chain forks a session and
//! installs a level-0 context; every deeper scope reuses that session through
//! a nested context. Within one chain contexts resolve in LIFO order, and a
//! rollback anywhere poisons every enclosing context, since the underlying
//! engine offers no real savepoints here.

use crate::session::provider::{ScopedBody, SessionHandle, SessionProvider};
use crate::txn::context::{TransactionContext, TransactionId, TransactionStatus};
use crate::txn::error::{TxnError, TxnResult};
use crate::txn::options::TransactionOptions;
use crate::txn::stack::{self, ContextStack};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Maximum nesting depth unless overridden in [`CoordinatorConfig`]
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 5;

/// Deadline applied to level-0 contexts that specify no timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Coordinator tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Maximum number of unresolved contexts per chain
    pub max_nesting_depth: usize,
    /// Deadline for level-0 contexts whose options carry no timeout
    pub default_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            default_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl CoordinatorConfig {
    /// Override the nesting limit
    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    /// Override the default deadline
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}

/// Transaction statistics for monitoring
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransactionStatistics {
    pub begun: u64,
    pub committed: u64,
    pub rolled_back: u64,
    /// Contexts rolled back by poison propagation rather than by their owner
    pub poisoned: u64,
    /// Level-0 contexts rolled back by their deadline timer
    pub timed_out: u64,
    pub nesting_limit_hits: u64,
}

#[derive(Default)]
struct Counters {
    begun: AtomicU64,
    committed: AtomicU64,
    rolled_back: AtomicU64,
    poisoned: AtomicU64,
    timed_out: AtomicU64,
    nesting_limit_hits: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> TransactionStatistics {
        TransactionStatistics {
            begun: self.begun.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            rolled_back: self.rolled_back.load(Ordering::Relaxed),
            poisoned: self.poisoned.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            nesting_limit_hits: self.nesting_limit_hits.load(Ordering::Relaxed),
        }
    }
}

/// Nested transaction coordinator
///
/// Cheap to clone; clones share the provider, configuration, and statistics.
/// The per-chain state lives in task-local storage (see
/// [`chain_scope`](crate::chain_scope)), so one coordinator instance serves
/// any number of concurrent chains without them observing each other.
pub struct TransactionCoordinator<P> {
    provider: Arc<P>,
    config: CoordinatorConfig,
    counters: Arc<Counters>,
}

impl<P> Clone for TransactionCoordinator<P> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            config: self.config.clone(),
            counters: self.counters.clone(),
        }
    }
}

impl<P> TransactionCoordinator<P>
where
    P: SessionProvider + 'static,
{
    /// Create a coordinator with default configuration
    pub fn new(provider: Arc<P>) -> Self {
        Self::with_config(provider, CoordinatorConfig::default())
    }

    /// Create a coordinator with explicit configuration
    pub fn with_config(provider: Arc<P>, config: CoordinatorConfig) -> Self {
        Self {
            provider,
            config,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Get the active configuration
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Get the injected session provider
    pub fn provider(&self) -> Arc<P> {
        self.provider.clone()
    }

    /// Snapshot of lifetime statistics across all chains
    pub fn statistics(&self) -> TransactionStatistics {
        self.counters.snapshot()
    }

    /// Begin a transaction context in the current chain
    ///
    /// With an empty chain this forks a fresh session, installs a level-0
    /// context that owns it, and arms a deadline timer. With a non-empty
    /// chain it pushes a nested context that reuses the ambient session; no
    /// new physical resource is created and `options` beyond the record of
    /// intent are not re-applied.
    ///
    /// # Errors
    /// * [`TxnError::NestingLimitExceeded`] - the chain is already at its depth limit
    /// * [`TxnError::NoChainScope`] - this task is not inside a chain scope
    /// * [`TxnError::Provider`] - the session fork failed
    pub async fn begin(&self, options: TransactionOptions) -> TxnResult<Arc<TransactionContext>> {
        let stack = stack::current_stack().ok_or(TxnError::NoChainScope)?;
        let limit = self.config.max_nesting_depth;

        // Depth check and the reuse-vs-fork decision read one snapshot: a
        // nested begin decides and pushes under a single lock acquisition.
        if let Some(ctx) = self.try_begin_nested(&stack, limit)? {
            self.counters.begun.fetch_add(1, Ordering::Relaxed);
            debug!(
                "transaction {} begun at level {} (session reused)",
                ctx.id(),
                ctx.nesting_level()
            );
            return Ok(ctx);
        }

        // Empty chain: fork a session. The fork suspends, so the stack is
        // re-checked under the lock before level 0 is installed.
        let handle = self.provider.fork().await?;
        let timeout = options.timeout.unwrap_or(self.config.default_timeout);

        let (ctx, fork_unused) = stack.with_entries(|entries| {
            if entries.len() >= limit {
                self.counters.nesting_limit_hits.fetch_add(1, Ordering::Relaxed);
                return Err(TxnError::NestingLimitExceeded {
                    depth: entries.len(),
                    limit,
                });
            }
            if let Some(top) = entries.last() {
                // A sibling installed level 0 while the fork was in flight;
                // fold into its transaction. One owner per handle.
                let ctx = Arc::new(TransactionContext::new_nested(
                    entries.len(),
                    top.handle().clone(),
                ));
                entries.push(ctx.clone());
                Ok((ctx, true))
            } else {
                let ctx = Arc::new(TransactionContext::new_root(
                    handle.clone(),
                    Instant::now() + timeout,
                ));
                entries.push(ctx.clone());
                Ok((ctx, false))
            }
        })?;

        if fork_unused {
            if let Err(e) = self.provider.clear(&handle).await {
                debug!("failed to release unused forked session: {}", e);
            }
        } else {
            self.arm_deadline(&stack, &ctx, timeout);
        }

        self.counters.begun.fetch_add(1, Ordering::Relaxed);
        debug!(
            "transaction {} begun at level {}",
            ctx.id(),
            ctx.nesting_level()
        );
        Ok(ctx)
    }

    fn try_begin_nested(
        &self,
        stack: &ContextStack,
        limit: usize,
    ) -> TxnResult<Option<Arc<TransactionContext>>> {
        stack.with_entries(|entries| {
            if entries.len() >= limit {
                self.counters.nesting_limit_hits.fetch_add(1, Ordering::Relaxed);
                return Err(TxnError::NestingLimitExceeded {
                    depth: entries.len(),
                    limit,
                });
            }
            match entries.last() {
                Some(top) => {
                    let ctx = Arc::new(TransactionContext::new_nested(
                        entries.len(),
                        top.handle().clone(),
                    ));
                    entries.push(ctx.clone());
                    Ok(Some(ctx))
                }
                None => Ok(None),
            }
        })
    }

    /// Commit a transaction context
    ///
    /// Cancels the deadline timer, marks the context committed, and pops it
    /// (and nothing else) from the chain. Only a level-0 commit performs the
    /// physical flush; if that flush fails the context is forced to
    /// ROLLED_BACK, the session is cleared best-effort, and
    /// [`TxnError::UnderlyingCommitFailure`] is surfaced. A nested context
    /// can never retroactively un-commit an outer one, so this failure path
    /// exists only at level 0.
    pub async fn commit(&self, ctx: &Arc<TransactionContext>) -> TxnResult<()> {
        // A context popped by an earlier resolution reports completion, not
        // absence: double commit is a state-machine violation.
        let status = ctx.status();
        if status != TransactionStatus::Active {
            return Err(TxnError::AlreadyCompleted {
                id: ctx.id(),
                status,
            });
        }

        let stack = stack::current_stack().ok_or(TxnError::UnknownContext(ctx.id()))?;
        let found = stack
            .find(ctx.id())
            .ok_or(TxnError::UnknownContext(ctx.id()))?;

        found.cancel_timer();
        found.mark_committed()?;

        let flush_result = if found.owns_handle() {
            self.provider.flush(found.handle()).await
        } else {
            Ok(())
        };
        stack.remove(found.id());

        match flush_result {
            Ok(()) => {
                self.counters.committed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "transaction {} committed at level {}",
                    found.id(),
                    found.nesting_level()
                );
                Ok(())
            }
            Err(e) => {
                found.force_rolled_back();
                self.counters.rolled_back.fetch_add(1, Ordering::Relaxed);
                if let Err(clear_err) = self.provider.clear(found.handle()).await {
                    warn!(
                        "failed to clear session after commit failure for {}: {}",
                        found.id(),
                        clear_err
                    );
                }
                Err(TxnError::UnderlyingCommitFailure(e.to_string()))
            }
        }
    }

    /// Roll back a transaction context
    ///
    /// Marks the context rolled back and poisons every enclosing context in
    /// the same chain, then empties the chain. Contexts that were pushed
    /// *after* the one being rolled back are dropped unresolved (their owners
    /// will observe [`TxnError::UnknownContext`] if they try to resolve them
    /// later). The session is invalidated only when the context passed in is
    /// itself level 0.
    pub async fn rollback(&self, ctx: &Arc<TransactionContext>) -> TxnResult<()> {
        let status = ctx.status();
        if status != TransactionStatus::Active {
            return Err(TxnError::AlreadyCompleted {
                id: ctx.id(),
                status,
            });
        }
        let stack = stack::current_stack().ok_or(TxnError::UnknownContext(ctx.id()))?;
        Self::rollback_on_stack(&self.provider, &self.counters, &stack, ctx.id(), false).await
    }

    /// Rollback bookkeeping shared by the public path and the deadline timer,
    /// which operates on the owning chain's stack from a detached task.
    async fn rollback_on_stack(
        provider: &Arc<P>,
        counters: &Arc<Counters>,
        stack: &ContextStack,
        id: TransactionId,
        from_timer: bool,
    ) -> TxnResult<()> {
        let (target, poisoned) = stack.with_entries(|entries| {
            let idx = entries
                .iter()
                .position(|c| c.id() == id)
                .ok_or(TxnError::UnknownContext(id))?;
            let target = entries[idx].clone();
            if from_timer {
                // The timer must not abort itself mid-rollback.
                drop(target.take_timer());
            } else {
                target.cancel_timer();
            }
            target.mark_rolled_back()?;

            // Poison propagation: every enclosing context is forced to roll
            // back, in place of a real savepoint mechanism. A context already
            // swept is skipped.
            let mut poisoned = 0u64;
            for below in entries[..idx].iter() {
                if below.force_rolled_back() {
                    poisoned += 1;
                }
            }
            // Contexts pushed above the rolled-back one were never resolved
            // by their owners; they are dropped from the chain as-is.
            for orphan in entries[idx + 1..].iter() {
                warn!(
                    "transaction {} was still unresolved when {} rolled back; dropping it from the chain",
                    orphan.id(),
                    id
                );
            }
            entries.clear();
            Ok((target, poisoned))
        })?;

        counters.rolled_back.fetch_add(1 + poisoned, Ordering::Relaxed);
        counters.poisoned.fetch_add(poisoned, Ordering::Relaxed);
        debug!(
            "transaction {} rolled back ({} enclosing contexts poisoned)",
            id, poisoned
        );

        if target.owns_handle() {
            provider.clear(target.handle()).await?;
        }
        Ok(())
    }

    /// Arm the deadline safety net on a level-0 context. Errors from the
    /// forced rollback are swallowed: no caller is waiting on the timer.
    fn arm_deadline(&self, stack: &ContextStack, ctx: &Arc<TransactionContext>, timeout: Duration) {
        let stack = stack.clone();
        let provider = self.provider.clone();
        let counters = self.counters.clone();
        let id = ctx.id();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            match Self::rollback_on_stack(&provider, &counters, &stack, id, true).await {
                Ok(()) => {
                    counters.timed_out.fetch_add(1, Ordering::Relaxed);
                    warn!("transaction {} exceeded its deadline and was rolled back", id);
                }
                // Normal case: the context resolved and the timer lost the race.
                Err(e) => debug!("deadline rollback for {} skipped: {}", id, e),
            }
        });
        ctx.arm_timer(timer);
    }

    /// Run a unit of work as one transaction scope
    ///
    /// Inside an ambient transaction the work runs directly against the
    /// current session: no new context, no isolation boundary, purely
    /// cooperative. Otherwise a chain scope is installed if absent, a session
    /// is forked, and the work executes inside the provider's native
    /// transactional callback so isolation level and access mode are honored
    /// by the engine itself. Either the work's result is returned (a durable
    /// commit happened) or its error is returned unchanged (nothing durable
    /// happened); the chain is left empty in both cases.
    pub async fn run_scoped<T, F, Fut>(
        &self,
        options: TransactionOptions,
        work: F,
    ) -> TxnResult<T>
    where
        F: FnOnce(SessionHandle) -> Fut + Send + 'static,
        Fut: Future<Output = TxnResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        if let Some(top) = stack::current_stack().and_then(|s| s.top()) {
            return work(top.handle().clone()).await;
        }
        let coordinator = self.clone();
        stack::chain_scope_if_absent(async move {
            coordinator.run_scoped_root(options, work).await
        })
        .await
    }

    async fn run_scoped_root<T, F, Fut>(&self, options: TransactionOptions, work: F) -> TxnResult<T>
    where
        F: FnOnce(SessionHandle) -> Fut + Send + 'static,
        Fut: Future<Output = TxnResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let stack = stack::current_stack().ok_or(TxnError::NoChainScope)?;
        let handle = self.provider.fork().await?;
        let timeout = options.timeout.unwrap_or(self.config.default_timeout);
        let ctx = Arc::new(TransactionContext::new_root(
            handle.clone(),
            Instant::now() + timeout,
        ));
        stack.with_entries(|entries| entries.push(ctx.clone()));
        self.arm_deadline(&stack, &ctx, timeout);
        self.counters.begun.fetch_add(1, Ordering::Relaxed);

        let body: ScopedBody<T> = Box::new(move |h| Box::pin(work(h)));
        let result = self.provider.run_transactional(handle, &options, body).await;

        ctx.cancel_timer();
        let result = match result {
            Ok(value) => match ctx.mark_committed() {
                Ok(()) => {
                    self.counters.committed.fetch_add(1, Ordering::Relaxed);
                    Ok(value)
                }
                // The deadline fired while the work was finishing; the scope
                // cannot report success for a rolled-back transaction.
                Err(e) => Err(e),
            },
            Err(e) => {
                if ctx.force_rolled_back() {
                    self.counters.rolled_back.fetch_add(1, Ordering::Relaxed);
                }
                Err(e)
            }
        };
        // The chain is left empty whatever the outcome.
        stack.with_entries(|entries| entries.clear());
        result
    }

    /// Top of the current chain's stack, if any
    pub fn current_context(&self) -> Option<Arc<TransactionContext>> {
        stack::current_stack().and_then(|s| s.top())
    }

    /// Whether the current chain has an unresolved transaction
    ///
    /// Repositories use this to decide between attaching to the ambient
    /// session and opening a short-lived one of their own.
    pub fn is_in_transaction(&self) -> bool {
        stack::current_stack().map(|s| !s.is_empty()).unwrap_or(false)
    }

    /// Depth of the current chain's stack (0 outside a transaction)
    pub fn current_depth(&self) -> usize {
        stack::current_stack().map(|s| s.depth()).unwrap_or(0)
    }
}
