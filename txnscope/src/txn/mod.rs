// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Transaction context primitives
//!
//! This module provides the building blocks the coordinator works with:
//!
//! # Features
//! - Transaction context lifecycle (ACTIVE, COMMITTED, ROLLED_BACK)
//! - Per-chain context stacks held in task-local storage
//! - Transaction options (isolation level, access mode, timeout)
//! - The coordinator error taxonomy

pub mod context;
pub mod error;
pub mod options;
pub mod stack;

pub use context::{TransactionContext, TransactionId, TransactionStatus};
pub use error::{TxnError, TxnResult};
pub use options::{AccessMode, IsolationLevel, TransactionOptions};
