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

//! Inline push: the whole changeset fits in one remote transaction.

use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::{Map, Value};

use crate::adapter::PushArgs;
use crate::error::{Error, Result};
use crate::id::encode_id;
use crate::record::prepare_for_write;
use crate::revision::RootState;
use crate::store::{CommitOutcome, DocPath, RemoteStore, RootPrecondition, TransactionPlan, TxnOp};
use crate::wire::{
    COLLECTION_DELETES, FIELD_DELETES, FIELD_DELETE_RECORD_REVISION, FIELD_LATEST_DATE,
    FIELD_LATEST_REVISION,
};

use super::deletes::DeleteRefs;

pub async fn push_inline(
    store: &dyn RemoteStore,
    root: &DocPath,
    root_state: &RootState,
    args: PushArgs,
    delete_refs: DeleteRefs,
) -> Result<()> {
    let revision = root_state.next_revision_to_write();
    if revision != args.last_pulled_at {
        return Err(Error::OutOfSync {
            expected: args.last_pulled_at,
            found: revision,
        });
    }

    let mut ops = Vec::new();
    let mut table_deletes: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (table, changes) in &args.changes {
        for row in changes.created.iter().chain(changes.updated.iter()) {
            // Always `set`, never `update`: the row may not yet exist at
            // the root even for an "update", if a prior big push placed it
            // in a side-batch instead.
            let path = root.child(table.clone()).child(encode_id(&row.id));
            let data = prepare_for_write(row, revision);
            ops.push(TxnOp::Set {
                path,
                data,
                merge: false,
            });
        }
        if let Some(refs) = delete_refs.refs.get(table) {
            for r in refs {
                ops.push(TxnOp::Delete { path: r.clone() });
            }
        }
        if let Some(ids) = delete_refs.encoded_ids.get(table) {
            if !ids.is_empty() {
                table_deletes.insert(table.clone(), ids.clone());
            }
        }
    }

    if !table_deletes.is_empty() {
        let delete_record_id = store.auto_id().await.map_err(Error::StoreUnavailable)?;
        let path = root.child(COLLECTION_DELETES).child(delete_record_id);
        let mut data = Map::new();
        data.insert(
            FIELD_DELETE_RECORD_REVISION.to_string(),
            Value::from(revision),
        );
        data.insert(FIELD_DELETES.to_string(), table_deletes_to_value(&table_deletes));
        ops.push(TxnOp::Set {
            path,
            data,
            merge: false,
        });
    }

    let mut root_update = Map::new();
    root_update.insert(FIELD_LATEST_REVISION.to_string(), Value::from(revision));
    root_update.insert(
        FIELD_LATEST_DATE.to_string(),
        Value::String(Utc::now().to_rfc3339()),
    );
    ops.push(TxnOp::Set {
        path: root.clone(),
        data: root_update,
        merge: true,
    });

    let plan = TransactionPlan {
        precondition: RootPrecondition {
            root: root.clone(),
            expected_latest_revision: root_state.latest_revision(),
        },
        ops,
    };

    match store
        .commit_transaction(plan)
        .await
        .map_err(Error::StoreUnavailable)?
    {
        CommitOutcome::Committed => Ok(()),
        CommitOutcome::StaleRoot {
            found_latest_revision,
        } => Err(Error::OutOfSync {
            expected: args.last_pulled_at,
            found: found_latest_revision.map(|r| r + 1).unwrap_or(1),
        }),
    }
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
