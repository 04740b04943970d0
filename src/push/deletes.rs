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

//! Delete reference discovery.
//!
//! A deleted logical id may have live copies at the root *and* in any
//! number of side-batches, because a side-batch push copies a row into the
//! batch rather than moving it. Every existing copy must be found and
//! deleted. This scan is `O(#batches * #deletes)`; an indexed lookup is a
//! possible non-behavioral optimization left for later.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::id::encode_id;
use crate::store::{DocPath, RemoteStore};
use crate::wire::COLLECTION_BATCHES;

/// Every physical document backing a set of deleted logical ids, split
/// into the paths to delete and the distinct encoded ids to record in a
/// delete-record or side-batch `deletes` map.
#[derive(Debug, Default)]
pub struct DeleteRefs {
    /// `table -> every document path found (root and/or side-batches)`.
    pub refs: BTreeMap<String, Vec<DocPath>>,
    /// `table -> distinct encoded ids for which at least one ref was
    /// found`, in first-seen order.
    pub encoded_ids: BTreeMap<String, Vec<String>>,
}

impl DeleteRefs {
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Total count of discovered references across all tables.
    pub fn total_ref_count(&self) -> usize {
        self.refs.values().map(Vec::len).sum()
    }
}

/// Discover every existing document backing the ids named in `deleted_ids`
/// for `table`, across the root and every side-batch in `batch_tokens`.
pub async fn find_table_delete_refs(
    store: &dyn RemoteStore,
    root: &DocPath,
    batch_tokens: &BTreeMap<u64, String>,
    table: &str,
    deleted_ids: &[String],
) -> Result<(Vec<DocPath>, Vec<String>)> {
    let mut refs = Vec::new();
    let mut encoded_ids = Vec::new();

    for id in deleted_ids {
        let encoded = encode_id(id);
        let mut found = Vec::new();

        let root_ref = root.child(table).child(encoded.clone());
        if store
            .get(&root_ref)
            .await
            .map_err(Error::StoreUnavailable)?
            .is_some()
        {
            found.push(root_ref);
        }

        for token in batch_tokens.values() {
            let batch_ref = root
                .child(COLLECTION_BATCHES)
                .child(token.clone())
                .child(table)
                .child(encoded.clone());
            if store
                .get(&batch_ref)
                .await
                .map_err(Error::StoreUnavailable)?
                .is_some()
            {
                found.push(batch_ref);
            }
        }

        if !found.is_empty() {
            encoded_ids.push(encoded);
            refs.extend(found);
        }
    }

    Ok((refs, encoded_ids))
}

/// Discover delete refs for every table named in `changes`.
pub async fn find_delete_refs(
    store: &dyn RemoteStore,
    root: &DocPath,
    batch_tokens: &BTreeMap<u64, String>,
    changes: &crate::adapter::Changes,
) -> Result<DeleteRefs> {
    let mut out = DeleteRefs::default();
    for (table, table_changes) in changes {
        if table_changes.deleted.is_empty() {
            continue;
        }
        let (refs, encoded_ids) =
            find_table_delete_refs(store, root, batch_tokens, table, &table_changes.deleted).await?;
        if !refs.is_empty() {
            out.refs.insert(table.clone(), refs);
            out.encoded_ids.insert(table.clone(), encoded_ids);
        }
    }
    Ok(out)
}
