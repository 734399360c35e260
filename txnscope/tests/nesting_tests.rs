//! Nesting behavior: session reuse, depth limits, stack tracking

#[path = "testutils/mod.rs"]
mod testutils;

use testutils::TestFixture;
use txnscope::{as_memory_session, chain_scope, TransactionOptions, TxnError};

#[tokio::test]
async fn test_nested_begin_reuses_outer_session() {
    let fixture = TestFixture::new();
    let coordinator = fixture.coordinator.clone();
    let provider = fixture.provider.clone();

    chain_scope(async move {
        let outer = coordinator
            .begin(TransactionOptions::default())
            .await
            .expect("outer begin should succeed");
        let inner = coordinator
            .begin(TransactionOptions::default())
            .await
            .expect("inner begin should succeed");

        // One physical session for the whole chain.
        assert_eq!(provider.fork_count(), 1);
        assert_eq!(outer.nesting_level(), 0);
        assert_eq!(inner.nesting_level(), 1);
        assert!(outer.owns_handle());
        assert!(!inner.owns_handle());
        assert_eq!(
            as_memory_session(outer.handle()).unwrap().session_id(),
            as_memory_session(inner.handle()).unwrap().session_id()
        );

        // Inner commit is bookkeeping only; outer commit flushes.
        let session = as_memory_session(outer.handle()).unwrap();
        coordinator.commit(&inner).await.expect("inner commit");
        assert_eq!(session.flush_count(), 0);
        coordinator.commit(&outer).await.expect("outer commit");
        assert_eq!(session.flush_count(), 1);

        let stats = coordinator.statistics();
        assert_eq!(stats.begun, 2);
        assert_eq!(stats.committed, 2);
        assert_eq!(stats.rolled_back, 0);
    })
    .await;
}

#[tokio::test]
async fn test_nesting_depth_limit() {
    let fixture = TestFixture::new();
    let coordinator = fixture.coordinator.clone();

    chain_scope(async move {
        let mut contexts = Vec::new();
        for level in 0..5 {
            let ctx = coordinator
                .begin(TransactionOptions::default())
                .await
                .expect("begin within the limit should succeed");
            assert_eq!(ctx.nesting_level(), level);
            contexts.push(ctx);
        }

        let err = coordinator
            .begin(TransactionOptions::default())
            .await
            .expect_err("sixth begin must be rejected");
        match err {
            TxnError::NestingLimitExceeded { depth, limit } => {
                assert_eq!(depth, 5);
                assert_eq!(limit, 5);
            }
            other => panic!("expected NestingLimitExceeded, got {:?}", other),
        }

        // The rejection leaves the chain intact; all five still resolve.
        assert_eq!(coordinator.current_depth(), 5);
        for ctx in contexts.iter().rev() {
            coordinator.commit(ctx).await.expect("commit after limit hit");
        }
        assert!(!coordinator.is_in_transaction());
        assert_eq!(coordinator.statistics().nesting_limit_hits, 1);
    })
    .await;
}

#[tokio::test]
async fn test_current_context_tracks_stack_top() {
    let fixture = TestFixture::new();
    let coordinator = fixture.coordinator.clone();

    chain_scope(async move {
        assert!(coordinator.current_context().is_none());
        assert!(!coordinator.is_in_transaction());

        let outer = coordinator.begin(TransactionOptions::default()).await.unwrap();
        assert_eq!(coordinator.current_context().unwrap().id(), outer.id());

        let inner = coordinator.begin(TransactionOptions::default()).await.unwrap();
        assert_eq!(coordinator.current_context().unwrap().id(), inner.id());
        assert!(coordinator.is_in_transaction());

        coordinator.commit(&inner).await.unwrap();
        assert_eq!(coordinator.current_context().unwrap().id(), outer.id());

        coordinator.commit(&outer).await.unwrap();
        assert!(coordinator.current_context().is_none());
        assert!(!coordinator.is_in_transaction());
    })
    .await;
}

#[tokio::test]
async fn test_begin_surfaces_fork_failure() {
    let fixture = TestFixture::new();
    let coordinator = fixture.coordinator.clone();
    let provider = fixture.provider.clone();

    chain_scope(async move {
        provider.set_fail_fork(true);
        let err = coordinator
            .begin(TransactionOptions::default())
            .await
            .expect_err("begin must fail when the fork fails");
        assert!(matches!(err, TxnError::Provider(_)));

        // Nothing was installed; the chain recovers once forks work again.
        assert!(!coordinator.is_in_transaction());
        provider.set_fail_fork(false);
        let ctx = coordinator.begin(TransactionOptions::default()).await.unwrap();
        coordinator.commit(&ctx).await.unwrap();
    })
    .await;
}
