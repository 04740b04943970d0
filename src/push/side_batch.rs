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

//! Side-batch push: stage the changeset under a private side-batch
//! document, then integrate it by linking the batch's token from the root.
//! Used whenever a changeset has more effective writes than the inline path
//! can fit in one transaction.

use std::collections::BTreeMap;

use chrono::Utc;
use log::warn;
use serde_json::{Map, Value};

use crate::adapter::PushArgs;
use crate::batch_writer::BatchWriter;
use crate::config::SyncConfig;
use crate::error::{Error, Result, StoreError};
use crate::id::encode_id;
use crate::record::prepare_for_write;
use crate::revision::RootState;
use crate::store::{CommitOutcome, DocPath, RemoteStore, RootPrecondition, TransactionPlan, TxnOp};
use crate::wire::{
    COLLECTION_BATCHES, FIELD_BATCH_TOKENS, FIELD_DELETES, FIELD_LATEST_DATE, FIELD_LATEST_REVISION,
};

use super::deletes::DeleteRefs;

pub async fn push_side_batch(
    store: &dyn RemoteStore,
    cfg: &SyncConfig,
    root: &DocPath,
    root_state: &RootState,
    args: PushArgs,
    delete_refs: DeleteRefs,
) -> Result<()> {
    let revision = root_state.next_revision_to_write();

    let token = store.auto_id().await.map_err(Error::StoreUnavailable)?;
    let batch_path = root.child(COLLECTION_BATCHES).child(token.clone());

    let table_deletes = stage(store, cfg, &batch_path, revision, &args, &delete_refs)
        .await
        .map_err(|e| Error::StageFailed(e.into_store_error()))?;

    // Integrate.
    if revision != args.last_pulled_at {
        return Err(Error::OutOfSync {
            expected: args.last_pulled_at,
            found: revision,
        });
    }

    let now = Utc::now().to_rfc3339();

    let mut batch_doc = Map::new();
    batch_doc.insert(FIELD_LATEST_REVISION.to_string(), Value::from(revision));
    batch_doc.insert(FIELD_LATEST_DATE.to_string(), Value::String(now.clone()));
    batch_doc.insert(FIELD_DELETES.to_string(), table_deletes_to_value(&table_deletes));

    let mut new_tokens = root_state.batch_tokens();
    new_tokens.insert(revision, token);
    let mut root_update = Map::new();
    root_update.insert(FIELD_LATEST_REVISION.to_string(), Value::from(revision));
    root_update.insert(FIELD_LATEST_DATE.to_string(), Value::String(now));
    root_update.insert(FIELD_BATCH_TOKENS.to_string(), tokens_to_value(&new_tokens));

    let plan = TransactionPlan {
        precondition: RootPrecondition {
            root: root.clone(),
            expected_latest_revision: root_state.latest_revision(),
        },
        ops: vec![
            TxnOp::Set {
                path: batch_path.clone(),
                data: batch_doc,
                merge: false,
            },
            TxnOp::Set {
                path: root.clone(),
                data: root_update,
                merge: true,
            },
        ],
    };

    match store.commit_transaction(plan).await {
        Ok(CommitOutcome::Committed) => Ok(()),
        // A race lost between our pre-check above and this commit is, like
        // the pre-check itself, an OUT_OF_SYNC condition rather than an
        // INTEGRATE_FAILED one (see DESIGN.md) — no rollback is run; the
        // orphaned batch is simply never linked from the root, same as a
        // stage failure.
        Ok(CommitOutcome::StaleRoot {
            found_latest_revision,
        }) => Err(Error::OutOfSync {
            expected: args.last_pulled_at,
            found: found_latest_revision.map(|r| r + 1).unwrap_or(1),
        }),
        Err(store_err) => {
            warn!("side-batch integrate failed for {batch_path}, rolling back: {store_err}");
            let written_tables: Vec<String> = args
                .changes
                .iter()
                .filter(|(_, c)| !c.created.is_empty() || !c.updated.is_empty())
                .map(|(table, _)| table.clone())
                .collect();
            match rollback(store, cfg, &batch_path, &written_tables).await {
                Ok(()) => Err(Error::IntegrateFailed(store_err)),
                Err(rollback_err) => {
                    warn!("rollback of {batch_path} also failed: {rollback_err}");
                    Err(Error::RollbackFailed {
                        integrate_error: store_err.into(),
                        rollback_error: rollback_err.into(),
                    })
                }
            }
        }
    }
}

/// Serially feed every created/updated/deleted row through a
/// [`BatchWriter`] bound to the freshly allocated (not yet linked)
/// side-batch document. Returns the per-table distinct deleted-id lists to
/// record on the side-batch document at integrate time.
async fn stage(
    store: &dyn RemoteStore,
    cfg: &SyncConfig,
    batch_path: &DocPath,
    revision: u64,
    args: &PushArgs,
    delete_refs: &DeleteRefs,
) -> Result<BTreeMap<String, Vec<String>>> {
    let mut writer = BatchWriter::new(store, *cfg);
    let mut table_deletes: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (table, changes) in &args.changes {
        for row in changes.created.iter().chain(changes.updated.iter()) {
            let path = batch_path.child(table.clone()).child(encode_id(&row.id));
            let data = prepare_for_write(row, revision);
            writer.add(path, data).await?;
        }
        if let Some(refs) = delete_refs.refs.get(table) {
            writer.add_deletes(refs.iter().cloned()).await?;
        }
        if let Some(ids) = delete_refs.encoded_ids.get(table) {
            if !ids.is_empty() {
                table_deletes.insert(table.clone(), ids.clone());
            }
        }
    }

    writer.flush().await?;
    Ok(table_deletes)
}

/// Delete every document this attempt wrote under `batch_path`, in
/// W-sized batches, after a failed integrate.
async fn rollback(
    store: &dyn RemoteStore,
    cfg: &SyncConfig,
    batch_path: &DocPath,
    written_tables: &[String],
) -> std::result::Result<(), StoreError> {
    let mut writer = BatchWriter::new(store, *cfg);
    for table in written_tables {
        let collection = batch_path.child(table.clone());
        let docs = store.list_children(&collection).await?;
        let paths: Vec<DocPath> = docs.into_iter().map(|doc| doc.path).collect();
        writer
            .add_deletes(paths)
            .await
            .map_err(Error::into_store_error)?;
    }
    writer.flush().await.map_err(Error::into_store_error)?;
    Ok(())
}

fn table_deletes_to_value(map: &BTreeMap<String, Vec<String>>) -> Value {
    let mut obj = Map::new();
    for (table, ids) in map {
        obj.insert(
            table.clone(),
            Value::Array(ids.iter().cloned().map(Value::String).collect()),
        );
    }
    Value::Object(obj)
}

fn tokens_to_value(tokens: &BTreeMap<u64, String>) -> Value {
    let mut obj = Map::new();
    for (revision, token) in tokens {
        obj.insert(revision.to_string(), Value::String(token.clone()));
    }
    Value::Object(obj)
}
