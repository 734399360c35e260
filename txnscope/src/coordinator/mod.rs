// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Transaction Coordinator - Central orchestration for unit-of-work scopes
//!
//! The TransactionCoordinator is the entry point application code talks to:
//! it decides whether a scope forks a fresh session or folds into the ambient
//! one, enforces nesting limits and deadlines, and propagates rollback.

pub mod txn_coordinator;

pub use txn_coordinator::{CoordinatorConfig, TransactionCoordinator, TransactionStatistics};
