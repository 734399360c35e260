// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Session provider abstraction
//!
//! The coordinator never creates or releases persistence sessions itself; it
//! works through an injected [`SessionProvider`] capability. This module
//! defines that contract plus an in-memory provider used as the embedded
//! default and as the test double.

pub mod memory;
pub mod provider;

pub use memory::{MemorySession, MemorySessionProvider};
pub use provider::{ResourceSession, ScopedBody, SessionHandle, SessionProvider};
