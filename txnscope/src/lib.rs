// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! TxnScope - A nested transaction coordinator for async call chains
//!
//! TxnScope manages transactional scopes across one logical call chain: one
//! incoming request, one background job, one test body. The first scope in a
//! chain forks a physical session from an injected provider; every deeper
//! scope reuses that same session through a nested context, so a chain never
//! holds more than one physical unit-of-work.
//!
//! # Features
//!
//! - **Nested scopes**: Inner transactional code folds into the enclosing
//!   transaction instead of opening a second session
//! - **Chain isolation**: Stacks live in task-local storage; concurrent
//!   chains and spawned tasks never observe each other
//! - **Poison propagation**: A rollback anywhere rolls back the whole chain,
//!   in place of real savepoints
//! - **Deadline safety net**: Level-0 contexts carry a timer that rolls back
//!   transactions abandoned past their timeout
//! - **Pluggable backends**: The persistence layer is an injected
//!   [`SessionProvider`]; [`MemorySessionProvider`] ships as the embedded
//!   default
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use txnscope::{chain_scope, MemorySessionProvider, TransactionCoordinator, TransactionOptions};
//!
//! # async fn example() -> txnscope::TxnResult<()> {
//! let coordinator = TransactionCoordinator::new(Arc::new(MemorySessionProvider::new()));
//!
//! chain_scope(async {
//!     let ctx = coordinator.begin(TransactionOptions::default()).await?;
//!     // ... work against ctx.handle() ...
//!     coordinator.commit(&ctx).await
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

// Public modules - exposed to external users
pub mod coordinator;

// Internal modules - only visible within the txnscope crate
pub(crate) mod session;
pub(crate) mod txn;

// Re-export the public API - the coordinator is the entry point
pub use coordinator::{CoordinatorConfig, TransactionCoordinator, TransactionStatistics};

// Session provider contract and the embedded in-memory backend
pub use session::memory::{as_memory_session, MemorySession, MemorySessionProvider};
pub use session::provider::{ResourceSession, ScopedBody, SessionHandle, SessionProvider};

// Context primitives (needed to hold and inspect begun transactions)
pub use txn::context::{TransactionContext, TransactionId, TransactionStatus};
pub use txn::error::{TxnError, TxnResult};
pub use txn::options::{AccessMode, IsolationLevel, TransactionOptions};
pub use txn::stack::chain_scope;

/// TxnScope version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// TxnScope crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
