//! Drives the side-batch stage/integrate/rollback error paths with a
//! [`FaultyStore`] wrapping a [`MemoryStore`], since a correct planner
//! never trips `MemoryStore`'s own write-cap error on its own.

use melonfire_sync::store::faulty::{FailMode, FaultyStore};
use melonfire_sync::store::memory::MemoryStore;
use melonfire_sync::store::DocPath;
use melonfire_sync::{push, Changes, Error, PushArgs, Row, SyncConfig, TableChanges};

fn row(id: &str) -> Row {
    Row {
        id: id.to_string(),
        fields: serde_json::Map::new(),
    }
}

fn creates(table: &str, n: usize) -> Changes {
    let mut map = Changes::new();
    map.insert(
        table.to_string(),
        TableChanges {
            created: (0..n).map(|i| row(&format!("id{i}"))).collect(),
            updated: vec![],
            deleted: vec![],
        },
    );
    map
}

#[tokio::test]
async fn stage_failure_surfaces_as_stage_failed_and_writes_nothing_to_root() {
    let store = FaultyStore::new(MemoryStore::new(4));
    let cfg = SyncConfig::with_max_batch_writes(4);
    let root = DocPath::root("ctx");

    // Five rows over a cap of four forces the side-batch path, whose stage
    // phase always ends in at least one batch commit.
    store.fail_batch_commit(FailMode::Once).await;

    let err = push(
        &store,
        &cfg,
        &root,
        PushArgs {
            last_pulled_at: 1,
            changes: creates("entries", 5),
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::StageFailed(_)));
    assert!(store.inner().get(&root).await.unwrap().is_none());
    assert!(store.inner().dump().await.is_empty());
}

#[tokio::test]
async fn integrate_failure_triggers_rollback_and_leaves_no_orphaned_documents() {
    let store = FaultyStore::new(MemoryStore::new(4));
    let cfg = SyncConfig::with_max_batch_writes(4);
    let root = DocPath::root("ctx");

    store.fail_commit_transaction(FailMode::Once).await;

    let err = push(
        &store,
        &cfg,
        &root,
        PushArgs {
            last_pulled_at: 1,
            changes: creates("entries", 5),
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::IntegrateFailed(_)));
    // Rollback deleted every staged document and the failed integrate
    // transaction never touched the root, so the store is exactly as it
    // was before this push started.
    assert!(store.inner().dump().await.is_empty());
}

#[tokio::test]
async fn rollback_failure_after_integrate_failure_reports_both_errors() {
    let store = FaultyStore::new(MemoryStore::new(4));
    let cfg = SyncConfig::with_max_batch_writes(4);
    let root = DocPath::root("ctx");

    // Five rows over a cap of four stages in exactly two batch commits
    // (one at the W-th row, one for the one-row remainder); let both
    // through, then fail every batch commit after that — which catches
    // rollback's own delete batch once integrate fails.
    store.fail_batch_commit(FailMode::AfterN(2)).await;
    store.fail_commit_transaction(FailMode::Once).await;

    let err = push(
        &store,
        &cfg,
        &root,
        PushArgs {
            last_pulled_at: 1,
            changes: creates("entries", 5),
        },
    )
    .await
    .unwrap_err();

    match err {
        Error::RollbackFailed { integrate_error, rollback_error } => {
            assert!(integrate_error.0.to_string().contains("commit_transaction"));
            assert!(rollback_error.0.to_string().contains("batch commit"));
        }
        other => panic!("expected RollbackFailed, got {other:?}"),
    }
}
