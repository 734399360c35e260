//! Shared fixture for coordinator integration tests

#![allow(dead_code)]

use std::sync::Arc;
use txnscope::{CoordinatorConfig, MemorySessionProvider, TransactionCoordinator};

pub struct TestFixture {
    pub provider: Arc<MemorySessionProvider>,
    pub coordinator: TransactionCoordinator<MemorySessionProvider>,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_config(CoordinatorConfig::default())
    }

    pub fn with_config(config: CoordinatorConfig) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let provider = Arc::new(MemorySessionProvider::new());
        let coordinator = TransactionCoordinator::with_config(provider.clone(), config);
        Self {
            provider,
            coordinator,
        }
    }
}
