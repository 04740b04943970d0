//! Quantified invariant properties (monotonicity, idempotent re-pull, id
//! fidelity, delete occlusion), run with `proptest` against a small `W` so
//! the side-batch path gets exercised without needing thousands of
//! generated rows per case.
//!
//! `proptest!` closures are synchronous, so each case opens a fresh
//! single-threaded Tokio runtime and blocks on the async engine calls —
//! there is no executor-reentrancy risk here since each case's runtime is
//! entirely local to that case.

use std::collections::{BTreeSet, HashSet};

use proptest::prelude::*;

use melonfire_sync::store::memory::MemoryStore;
use melonfire_sync::store::DocPath;
use melonfire_sync::{push, pull, Changes, PullArgs, PushArgs, Row, SyncConfig, TableChanges};

const TEST_W: usize = 8;

fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(fut)
}

fn row(id: &str) -> Row {
    Row {
        id: id.to_string(),
        fields: serde_json::Map::new(),
    }
}

fn creates(table: &str, ids: &[String]) -> Changes {
    let mut map = Changes::new();
    map.insert(
        table.to_string(),
        TableChanges {
            created: ids.iter().map(|id| row(id)).collect(),
            updated: vec![],
            deleted: vec![],
        },
    );
    map
}

fn deletes(table: &str, ids: &[String]) -> Changes {
    let mut map = Changes::new();
    map.insert(
        table.to_string(),
        TableChanges {
            created: vec![],
            updated: vec![],
            deleted: ids.to_vec(),
        },
    );
    map
}

proptest! {
    /// P1 — after N successful pushes, `melonLatestRevision` equals N.
    #[test]
    fn monotonicity_over_n_pushes(batch_sizes in prop::collection::vec(1usize..5, 1..6)) {
        block_on(async {
            let store = MemoryStore::new(TEST_W);
            let cfg = SyncConfig::with_max_batch_writes(TEST_W);
            let root = DocPath::root("ctx");

            for (i, size) in batch_sizes.iter().enumerate() {
                let last_pulled_at = (i + 1) as u64;
                let ids: Vec<String> = (0..*size).map(|j| format!("r{i}_{j}")).collect();
                push(&store, &cfg, &root, PushArgs {
                    last_pulled_at,
                    changes: creates("entries", &ids),
                }).await.unwrap();
            }

            let root_doc = store.get(&root).await.unwrap().unwrap();
            let latest = root_doc.data.get("melonLatestRevision").unwrap().as_u64().unwrap();
            prop_assert_eq!(latest, batch_sizes.len() as u64);
            Ok(())
        })?;
    }

    /// P3 — two consecutive pulls with the same watermark return
    /// structurally equal changes and the same timestamp.
    #[test]
    fn idempotent_repull(ids in prop::collection::vec("[a-z]{1,8}", 1..6)) {
        block_on(async {
            let store = MemoryStore::new(TEST_W);
            let cfg = SyncConfig::with_max_batch_writes(TEST_W);
            let root = DocPath::root("ctx");
            let ids: Vec<String> = ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
            if ids.is_empty() {
                return Ok(());
            }

            push(&store, &cfg, &root, PushArgs {
                last_pulled_at: 1,
                changes: creates("entries", &ids),
            }).await.unwrap();

            let tables = vec!["entries".to_string()];
            let first = pull(&store, &tables, &root, PullArgs { last_pulled_at: Some(1) }).await.unwrap();
            let second = pull(&store, &tables, &root, PullArgs { last_pulled_at: Some(1) }).await.unwrap();

            prop_assert_eq!(first.timestamp, second.timestamp);
            prop_assert_eq!(first.changes, second.changes);
            Ok(())
        })?;
    }

    /// P5 — arbitrary logical ids, including key-unsafe characters, round
    /// trip through push -> pull unchanged.
    #[test]
    fn id_fidelity(id in "[ -~]{1,16}") {
        block_on(async {
            let store = MemoryStore::new(TEST_W);
            let cfg = SyncConfig::with_max_batch_writes(TEST_W);
            let root = DocPath::root("ctx");

            push(&store, &cfg, &root, PushArgs {
                last_pulled_at: 1,
                changes: creates("entries", &[id.clone()]),
            }).await.unwrap();

            let result = pull(&store, &["entries".to_string()], &root, PullArgs { last_pulled_at: Some(1) })
                .await
                .unwrap();
            prop_assert_eq!(&result.changes["entries"].updated[0].id, &id);
            Ok(())
        })?;
    }

    /// P7 — an id appearing in both `updated` and `deleted` within the
    /// pulled range appears only in `deleted`.
    #[test]
    fn delete_occlusion(ids in prop::collection::vec("[a-z]{1,8}", 1..6)) {
        block_on(async {
            let store = MemoryStore::new(TEST_W);
            let cfg = SyncConfig::with_max_batch_writes(TEST_W);
            let root = DocPath::root("ctx");
            let ids: Vec<String> = ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
            if ids.is_empty() {
                return Ok(());
            }

            push(&store, &cfg, &root, PushArgs {
                last_pulled_at: 1,
                changes: creates("entries", &ids),
            }).await.unwrap();

            push(&store, &cfg, &root, PushArgs {
                last_pulled_at: 2,
                changes: deletes("entries", &ids),
            }).await.unwrap();

            let result = pull(&store, &["entries".to_string()], &root, PullArgs { last_pulled_at: None })
                .await
                .unwrap();
            let entries = &result.changes["entries"];
            let updated_ids: HashSet<&str> = entries.updated.iter().map(|r| r.id.as_str()).collect();
            let deleted_ids: HashSet<&str> = entries.deleted.iter().map(String::as_str).collect();
            for id in &ids {
                prop_assert!(deleted_ids.contains(id.as_str()));
                prop_assert!(!updated_ids.contains(id.as_str()));
            }
            Ok(())
        })?;
    }
}

/// P6 — two pushes racing against the same `lastPulledAt` never both
/// commit: exactly one observes `Error::OutOfSync`, whether the race is
/// lost before the root is even re-read or lost at the commit itself.
#[tokio::test]
async fn concurrent_pushes_on_the_same_watermark_never_both_succeed() {
    let store = MemoryStore::new(TEST_W);
    let cfg = SyncConfig::with_max_batch_writes(TEST_W);
    let root = DocPath::root("ctx");

    let first = push(&store, &cfg, &root, PushArgs {
        last_pulled_at: 1,
        changes: creates("entries", &["a".to_string()]),
    });
    let second = push(&store, &cfg, &root, PushArgs {
        last_pulled_at: 1,
        changes: creates("entries", &["b".to_string()]),
    });

    let (first_result, second_result) = tokio::join!(first, second);
    let outcomes = [first_result.is_ok(), second_result.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1, "exactly one racing push should commit");

    let loser = if first_result.is_ok() { second_result } else { first_result };
    assert!(matches!(loser.unwrap_err(), melonfire_sync::Error::OutOfSync { .. }));
}
