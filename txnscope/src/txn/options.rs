// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Transaction options: isolation level, access mode, deadline
//!
//! These are passed through to the session provider; the coordinator itself
//! only interprets the timeout.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Transaction isolation levels as defined in SQL standard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IsolationLevel {
    /// READ UNCOMMITTED - Allows dirty reads, non-repeatable reads, and phantom reads
    ReadUncommitted,
    /// READ COMMITTED - Prevents dirty reads, but allows non-repeatable reads and phantom reads
    ReadCommitted,
    /// REPEATABLE READ - Prevents dirty reads and non-repeatable reads, but allows phantom reads
    RepeatableRead,
    /// SERIALIZABLE - Prevents dirty reads, non-repeatable reads, and phantom reads
    Serializable,
}

impl IsolationLevel {
    /// Get string representation for display
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }

    /// Get the strictness level (higher number = more strict)
    pub fn strictness_level(&self) -> u8 {
        match self {
            IsolationLevel::ReadUncommitted => 0,
            IsolationLevel::ReadCommitted => 1,
            IsolationLevel::RepeatableRead => 2,
            IsolationLevel::Serializable => 3,
        }
    }

    /// Check if this isolation level is at least as strict as another
    pub fn is_at_least_as_strict_as(&self, other: &IsolationLevel) -> bool {
        self.strictness_level() >= other.strictness_level()
    }
}

impl Default for IsolationLevel {
    fn default() -> Self {
        IsolationLevel::ReadCommitted
    }
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for IsolationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "READ UNCOMMITTED" | "READ_UNCOMMITTED" => Ok(IsolationLevel::ReadUncommitted),
            "READ COMMITTED" | "READ_COMMITTED" => Ok(IsolationLevel::ReadCommitted),
            "REPEATABLE READ" | "REPEATABLE_READ" => Ok(IsolationLevel::RepeatableRead),
            "SERIALIZABLE" => Ok(IsolationLevel::Serializable),
            _ => Err(format!("Unknown isolation level: {}", s)),
        }
    }
}

/// Transaction access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

impl AccessMode {
    /// Check if this mode forbids writes
    pub fn is_read_only(&self) -> bool {
        matches!(self, AccessMode::ReadOnly)
    }
}

impl Default for AccessMode {
    fn default() -> Self {
        AccessMode::ReadWrite
    }
}

/// Options for beginning a transaction scope
///
/// `timeout` applies to the level-0 context only; nested contexts inherit no
/// independent deadline. Isolation level and access mode are honored by the
/// session provider's native transactional execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionOptions {
    /// Deadline for the level-0 context; falls back to the coordinator's
    /// configured default when unset.
    pub timeout: Option<Duration>,
    /// Isolation level requested from the provider; provider default when unset.
    pub isolation_level: Option<IsolationLevel>,
    /// Access mode requested from the provider.
    pub access_mode: AccessMode,
}

impl TransactionOptions {
    /// Create options with all defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the level-0 deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the isolation level
    pub fn with_isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = Some(level);
        self
    }

    /// Mark the transaction read-only
    pub fn read_only(mut self) -> Self {
        self.access_mode = AccessMode::ReadOnly;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolation_level_strictness() {
        assert!(
            IsolationLevel::Serializable.is_at_least_as_strict_as(&IsolationLevel::ReadCommitted)
        );
        assert!(IsolationLevel::ReadCommitted
            .is_at_least_as_strict_as(&IsolationLevel::ReadUncommitted));
        assert!(!IsolationLevel::ReadUncommitted
            .is_at_least_as_strict_as(&IsolationLevel::Serializable));
    }

    #[test]
    fn test_isolation_level_parsing() {
        assert_eq!(
            "READ COMMITTED".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::ReadCommitted
        );
        assert_eq!(
            "serializable".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::Serializable
        );
        assert!("SNAPSHOT".parse::<IsolationLevel>().is_err());
    }

    #[test]
    fn test_options_builder() {
        let options = TransactionOptions::new()
            .with_timeout(Duration::from_millis(250))
            .with_isolation_level(IsolationLevel::Serializable)
            .read_only();

        assert_eq!(options.timeout, Some(Duration::from_millis(250)));
        assert_eq!(options.isolation_level, Some(IsolationLevel::Serializable));
        assert!(options.access_mode.is_read_only());
    }

    #[test]
    fn test_default_options() {
        let options = TransactionOptions::default();
        assert!(options.timeout.is_none());
        assert!(options.isolation_level.is_none());
        assert_eq!(options.access_mode, AccessMode::ReadWrite);
    }
}
