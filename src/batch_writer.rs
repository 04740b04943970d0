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

//! A streaming accumulator that turns an unbounded stream of writes/deletes
//! into a sequence of W-sized, non-transactional commits.
//!
//! Every method takes `&mut self` and `flush` takes `self` by value, so
//! "not reusable after flush" is a compile-time property: once `flush` runs
//! there is no longer a `BatchWriter` value left to call `add`/`add_deletes`
//! on. Calls must be awaited one at a time — the internal counter is not
//! atomic, so these calls must never be fanned out in parallel.

use serde_json::{Map, Value};

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::store::{DocPath, RemoteStore, WriteBatch};

pub struct BatchWriter<'a> {
    store: &'a dyn RemoteStore,
    max_batch_writes: usize,
    batch: Box<dyn WriteBatch>,
    count: usize,
}

impl<'a> BatchWriter<'a> {
    pub fn new(store: &'a dyn RemoteStore, cfg: SyncConfig) -> Self {
        Self {
            store,
            max_batch_writes: cfg.max_batch_writes,
            batch: store.new_batch(),
            count: 0,
        }
    }

    /// Queue a document set, flushing a full batch if this fills it.
    pub async fn add(&mut self, path: DocPath, data: Map<String, Value>) -> Result<()> {
        self.batch.queue_set(path, data);
        self.count += 1;
        self.flush_if_full().await
    }

    /// Queue any number of deletes, flushing full W-sized batches as the
    /// queue fills and carrying the remainder forward.
    pub async fn add_deletes(&mut self, paths: impl IntoIterator<Item = DocPath>) -> Result<()> {
        for path in paths {
            self.batch.queue_delete(path);
            self.count += 1;
            self.flush_if_full().await?;
        }
        Ok(())
    }

    async fn flush_if_full(&mut self) -> Result<()> {
        if self.count == self.max_batch_writes {
            self.commit_and_reset().await?;
        }
        Ok(())
    }

    async fn commit_and_reset(&mut self) -> Result<()> {
        self.batch.commit().await.map_err(Error::StoreUnavailable)?;
        self.batch = self.store.new_batch();
        self.count = 0;
        Ok(())
    }

    /// Commit the current, possibly partial, batch. Must be called exactly
    /// once, whether or not any operation was ever queued.
    pub async fn flush(mut self) -> Result<()> {
        if self.count > 0 {
            self.commit_and_reset().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn flushes_in_exact_w_sized_chunks() {
        let store = MemoryStore::new(4);
        let mut writer = BatchWriter::new(&store, SyncConfig::with_max_batch_writes(4));
        for i in 0..8 {
            writer
                .add(
                    DocPath::root("ctx").child(format!("row{i}")),
                    json!({ "n": i }).as_object().unwrap().clone(),
                )
                .await
                .unwrap();
        }
        writer.flush().await.unwrap();
        assert_eq!(store.dump().await.len(), 8);
    }

    #[tokio::test]
    async fn carries_a_partial_remainder_across_deletes() {
        let store = MemoryStore::new(4);
        for i in 0..10 {
            let mut batch = store.new_batch();
            batch.queue_set(
                DocPath::root("ctx").child(format!("row{i}")),
                json!({}).as_object().unwrap().clone(),
            );
            batch.commit().await.unwrap();
        }
        let mut writer = BatchWriter::new(&store, SyncConfig::with_max_batch_writes(4));
        let paths: Vec<_> = (0..10)
            .map(|i| DocPath::root("ctx").child(format!("row{i}")))
            .collect();
        writer.add_deletes(paths).await.unwrap();
        writer.flush().await.unwrap();
        assert!(store.dump().await.is_empty());
    }

    #[tokio::test]
    async fn flush_with_no_writes_is_a_no_op() {
        let store = MemoryStore::new(4);
        let writer = BatchWriter::new(&store, SyncConfig::with_max_batch_writes(4));
        writer.flush().await.unwrap();
        assert!(store.dump().await.is_empty());
    }
}
