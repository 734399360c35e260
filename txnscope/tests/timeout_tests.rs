//! Deadline timer: forced rollback of abandoned transactions

#[path = "testutils/mod.rs"]
mod testutils;

use serial_test::serial;
use std::time::Duration;
use testutils::TestFixture;
use txnscope::{
    as_memory_session, chain_scope, TransactionOptions, TransactionStatus, TxnError,
};

#[tokio::test]
#[serial]
async fn test_deadline_rolls_back_abandoned_transaction() {
    let fixture = TestFixture::new();
    let coordinator = fixture.coordinator.clone();

    chain_scope(async move {
        let ctx = coordinator
            .begin(TransactionOptions::default().with_timeout(Duration::from_millis(20)))
            .await
            .unwrap();

        // Abandon the transaction past its deadline.
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(ctx.status(), TransactionStatus::RolledBack);
        assert!(!coordinator.is_in_transaction());
        assert_eq!(as_memory_session(ctx.handle()).unwrap().clear_count(), 1);

        let stats = coordinator.statistics();
        assert_eq!(stats.timed_out, 1);
        assert_eq!(stats.rolled_back, 1);

        // The owner's late commit observes the forced rollback.
        let err = coordinator.commit(&ctx).await.unwrap_err();
        match err {
            TxnError::AlreadyCompleted { status, .. } => {
                assert_eq!(status, TransactionStatus::RolledBack);
            }
            other => panic!("expected AlreadyCompleted, got {:?}", other),
        }
    })
    .await;
}

#[tokio::test]
#[serial]
async fn test_commit_cancels_deadline_timer() {
    let fixture = TestFixture::new();
    let coordinator = fixture.coordinator.clone();

    chain_scope(async move {
        let ctx = coordinator
            .begin(TransactionOptions::default().with_timeout(Duration::from_millis(20)))
            .await
            .unwrap();
        coordinator.commit(&ctx).await.unwrap();

        // Well past the deadline; the cancelled timer must not fire.
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(ctx.status(), TransactionStatus::Committed);
        let session = as_memory_session(ctx.handle()).unwrap();
        assert_eq!(session.flush_count(), 1);
        assert_eq!(session.clear_count(), 0);
        assert_eq!(coordinator.statistics().timed_out, 0);
    })
    .await;
}

#[tokio::test]
#[serial]
async fn test_deadline_poisons_whole_chain() {
    let fixture = TestFixture::new();
    let coordinator = fixture.coordinator.clone();

    chain_scope(async move {
        let outer = coordinator
            .begin(TransactionOptions::default().with_timeout(Duration::from_millis(20)))
            .await
            .unwrap();
        let inner = coordinator.begin(TransactionOptions::default()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;

        // The timer rolls back its own level-0 context; the nested context
        // above it is dropped from the chain unresolved.
        assert_eq!(outer.status(), TransactionStatus::RolledBack);
        assert!(!coordinator.is_in_transaction());
        let err = coordinator.commit(&inner).await.unwrap_err();
        assert!(matches!(err, TxnError::UnknownContext(_)));
    })
    .await;
}

#[tokio::test]
#[serial]
async fn test_run_scoped_deadline_overtakes_slow_work() {
    let fixture = TestFixture::new();
    let coordinator = fixture.coordinator.clone();

    let result = coordinator
        .run_scoped::<u32, _, _>(
            TransactionOptions::default().with_timeout(Duration::from_millis(20)),
            |_session| async move {
                tokio::time::sleep(Duration::from_millis(150)).await;
                Ok(7)
            },
        )
        .await;

    // The work finished, but its transaction had already been rolled back;
    // the scope must not report success for discarded work.
    let err = result.expect_err("deadline must win over slow work");
    match err {
        TxnError::AlreadyCompleted { status, .. } => {
            assert_eq!(status, TransactionStatus::RolledBack);
        }
        other => panic!("expected AlreadyCompleted, got {:?}", other),
    }
    assert_eq!(coordinator.statistics().timed_out, 1);
    assert!(!coordinator.is_in_transaction());
}
