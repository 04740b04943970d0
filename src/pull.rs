// Copyright 2024 melonfire-sync contributors
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License. You may obtain a copy of
// the License at http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the
// License for the specific language governing permissions and limitations under
// the License.

//! Pull merger and its `mergeCreatesAndUpdates` helper.
//!
//! Walks the revision range in contiguous runs: a run of consecutive root
//! revisions is merged in one range query per table, queried in parallel
//! across tables; a side-batch revision is handled on its own, because a
//! later root revision may depend on a row a side-batch created, so
//! cross-run ordering must be preserved.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::adapter::{Changes, PullArgs, PullResult, Row, TableChanges};
use crate::error::{Error, Result};
use crate::id::decode_id;
use crate::record::row_from_doc;
use crate::revision::RootState;
use crate::store::{DocPath, RemoteStore};
use crate::wire::{COLLECTION_BATCHES, COLLECTION_DELETES, FIELD_DELETES, FIELD_DELETE_RECORD_REVISION, FIELD_FIRE_REVISION};

#[derive(Default)]
struct TableAccum {
    /// decoded id -> (revision that last wrote it, reconstructed row)
    updated: BTreeMap<String, (u64, Row)>,
    /// decoded ids seen in a delete set anywhere in the walked range
    deleted: BTreeSet<String>,
}

/// Fetch all remote changes since `args.last_pulled_at` for `tables`.
pub async fn pull(
    store: &dyn RemoteStore,
    tables: &[String],
    root: &DocPath,
    args: PullArgs,
) -> Result<PullResult> {
    let root_snapshot = store.get(root).await.map_err(Error::StoreUnavailable)?;
    let root_state = RootState::from_snapshot(root_snapshot.as_ref());
    let end_revision_exclusive = root_state.end_revision_exclusive();
    let batch_tokens = root_state.batch_tokens();
    let start_revision = args.last_pulled_at.unwrap_or(1);

    let mut change_map: BTreeMap<String, TableAccum> =
        tables.iter().map(|t| (t.clone(), TableAccum::default())).collect();

    let mut start = start_revision;
    while start < end_revision_exclusive {
        let mut end = start;
        while end < end_revision_exclusive && !batch_tokens.contains_key(&end) {
            end += 1;
        }

        if end == start {
            // A side-batch revision: exactly one revision's worth of
            // writes, held in its own document.
            let token = batch_tokens
                .get(&end)
                .expect("end is a key of batch_tokens by construction");
            end += 1;
            let batch_path = root.child(COLLECTION_BATCHES).child(token.clone());
            merge_creates_and_updates(store, &batch_path, tables, &mut change_map).await?;
            if let Some(batch_doc) = store.get(&batch_path).await.map_err(Error::StoreUnavailable)? {
                apply_deletes(batch_doc.data.get(FIELD_DELETES), &mut change_map);
            }
        } else {
            merge_creates_and_updates_in_range(store, root, tables, start, end, &mut change_map).await?;
            let delete_records = store
                .list_children(&root.child(COLLECTION_DELETES))
                .await
                .map_err(Error::StoreUnavailable)?;
            for doc in delete_records {
                let revision = doc
                    .data
                    .get(FIELD_DELETE_RECORD_REVISION)
                    .and_then(Value::as_u64);
                if matches!(revision, Some(r) if r >= start && r < end) {
                    apply_deletes(doc.data.get(FIELD_DELETES), &mut change_map);
                }
            }
        }

        start = end;
    }

    let mut changes = Changes::new();
    for (table, accum) in change_map {
        let mut updated: Vec<(u64, Row)> = accum
            .updated
            .into_iter()
            .filter(|(id, _)| !accum.deleted.contains(id))
            .map(|(_, entry)| entry)
            .collect();
        updated.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));

        changes.insert(
            table,
            TableChanges {
                created: Vec::new(),
                updated: updated.into_iter().map(|(_, row)| row).collect(),
                deleted: accum.deleted.into_iter().collect(),
            },
        );
    }

    Ok(PullResult {
        changes,
        timestamp: end_revision_exclusive,
    })
}

/// Merge a side-batch's single revision of writes: every document under
/// `batch_path/<table>` belongs to that one revision, so no range filter is
/// needed.
async fn merge_creates_and_updates(
    store: &dyn RemoteStore,
    batch_path: &DocPath,
    tables: &[String],
    change_map: &mut BTreeMap<String, TableAccum>,
) -> Result<()> {
    let per_table = futures::future::join_all(tables.iter().map(|table| {
        let collection = batch_path.child(table.clone());
        async move {
            let docs = store.list_children(&collection).await;
            (table.clone(), docs)
        }
    }))
    .await;

    for (table, docs) in per_table {
        let docs = docs.map_err(Error::StoreUnavailable)?;
        fold_docs_into(change_map.entry(table).or_default(), docs);
    }
    Ok(())
}

/// Merge a contiguous root run `[start, end)`: one `melonFireRevision`
/// range query per table, issued in parallel.
async fn merge_creates_and_updates_in_range(
    store: &dyn RemoteStore,
    root: &DocPath,
    tables: &[String],
    start: u64,
    end: u64,
    change_map: &mut BTreeMap<String, TableAccum>,
) -> Result<()> {
    let per_table = futures::future::join_all(tables.iter().map(|table| {
        let collection = root.child(table.clone());
        async move {
            let docs = store.query_by_revision(&collection, start, end).await;
            (table.clone(), docs)
        }
    }))
    .await;

    for (table, docs) in per_table {
        let docs = docs.map_err(Error::StoreUnavailable)?;
        fold_docs_into(change_map.entry(table).or_default(), docs);
    }
    Ok(())
}

fn fold_docs_into(accum: &mut TableAccum, docs: Vec<crate::store::DocSnapshot>) {
    for doc in docs {
        let revision = doc
            .data
            .get(FIELD_FIRE_REVISION)
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let row = row_from_doc(doc.data);
        // Ascending iteration order (guaranteed by the store for range
        // queries, and trivially true for a single-revision side-batch)
        // means the last insert for a given id wins.
        accum.updated.insert(row.id.clone(), (revision, row));
    }
}

fn apply_deletes(value: Option<&Value>, change_map: &mut BTreeMap<String, TableAccum>) {
    let Some(obj) = value.and_then(Value::as_object) else {
        return;
    };
    for (table, ids) in obj {
        let Some(accum) = change_map.get_mut(table) else {
            continue;
        };
        let Some(ids) = ids.as_array() else { continue };
        for id in ids {
            if let Some(encoded) = id.as_str() {
                accum.deleted.insert(decode_id(encoded));
            }
        }
    }
}
