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

//! Push planner and its two execution strategies.

pub mod deletes;
pub mod inline;
pub mod side_batch;

use log::debug;

use crate::adapter::PushArgs;
use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::revision::RootState;
use crate::store::{DocPath, RemoteStore};

use deletes::find_delete_refs;

/// Submit a local changeset, choosing the inline or side-batch execution
/// strategy based on how many writes it takes.
pub async fn push(
    store: &dyn RemoteStore,
    cfg: &SyncConfig,
    root: &DocPath,
    args: PushArgs,
) -> Result<()> {
    let root_snapshot = store.get(root).await.map_err(Error::StoreUnavailable)?;
    let root_state = RootState::from_snapshot(root_snapshot.as_ref());
    let batch_tokens = root_state.batch_tokens();

    let delete_refs = find_delete_refs(store, root, &batch_tokens, &args.changes).await?;
    let created_and_updated: usize = args
        .changes
        .values()
        .map(|t| t.created.len() + t.updated.len())
        .sum();
    let delete_count = delete_refs.total_ref_count();
    let effective = created_and_updated + if delete_count > 0 { delete_count + 1 } else { 0 };

    if effective + 1 <= cfg.max_batch_writes {
        debug!("push: {effective} effective writes, inline");
        inline::push_inline(store, root, &root_state, args, delete_refs).await
    } else {
        debug!("push: {effective} effective writes exceeds {}, side batch", cfg.max_batch_writes);
        side_batch::push_side_batch(store, cfg, root, &root_state, args, delete_refs).await
    }
}
