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

//! An in-memory [`RemoteStore`] used by every test in this crate in place
//! of a real document-store connection. Not gated behind `#[cfg(test)]`
//! because integration tests under `tests/` link against the compiled
//! library and need a usable test double from outside the crate, the way
//! `aerospike-core`'s dev-dependency stack relies on a live cluster instead
//! — this crate has no live backend to test against, so it ships its own.
//!
//! Backed by a flat map keyed by the joined path rather than a nested tree;
//! "children of a collection" is answered by a prefix scan. Enforces the
//! configured write cap on both transactions and batches, so a planner bug
//! that exceeds `W` fails the test instead of silently "working" against an
//! unbounded test double.

use async_trait::async_trait;
use rand::Rng;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::wire::FIELD_LATEST_REVISION;

use super::{CommitOutcome, DocPath, DocSnapshot, RemoteStore, TransactionPlan, TxnOp, WriteBatch};

#[derive(Debug, Default)]
struct Documents(BTreeMap<String, Map<String, Value>>);

impl Documents {
    fn key(path: &DocPath) -> String {
        path.to_string()
    }

    fn apply(&mut self, op: TxnOp) {
        match op {
            TxnOp::Set { path, data, merge } => {
                let key = Self::key(&path);
                if merge {
                    let entry = self.0.entry(key).or_default();
                    for (k, v) in data {
                        entry.insert(k, v);
                    }
                } else {
                    self.0.insert(key, data);
                }
            }
            TxnOp::Delete { path } => {
                self.0.remove(&Self::key(&path));
            }
        }
    }

    fn children_of(&self, collection: &DocPath) -> Vec<DocSnapshot> {
        let depth = collection.segments().len() + 1;
        let prefix = format!("{collection}/");
        self.0
            .iter()
            .filter(|(key, _)| {
                key.starts_with(&prefix) && key.matches('/').count() + 1 == depth
            })
            .map(|(key, data)| DocSnapshot {
                path: DocPath::from_joined(key),
                data: data.clone(),
            })
            .collect()
    }
}

impl DocPath {
    /// Reconstruct a [`DocPath`] from a `/`-joined string. Test-double
    /// internal plumbing only; real backends never need to parse a path
    /// back out of its display form.
    fn from_joined(joined: &str) -> Self {
        DocPath(joined.split('/').map(str::to_owned).collect())
    }
}

/// In-memory [`RemoteStore`] implementation, good for tests and for small
/// single-process demos.
pub struct MemoryStore {
    max_batch_writes: usize,
    docs: Arc<Mutex<Documents>>,
}

impl MemoryStore {
    pub fn new(max_batch_writes: usize) -> Self {
        Self {
            max_batch_writes,
            docs: Arc::new(Mutex::new(Documents::default())),
        }
    }

    /// Snapshot every stored document, for assertions in tests.
    pub async fn dump(&self) -> Vec<DocSnapshot> {
        let docs = self.docs.lock().await;
        docs.0
            .iter()
            .map(|(key, data)| DocSnapshot {
                path: DocPath::from_joined(key),
                data: data.clone(),
            })
            .collect()
    }
}

fn too_large(len: usize, cap: usize) -> Option<StoreError> {
    if len > cap {
        Some(format!("batch of {len} operations exceeds cap of {cap}").into())
    } else {
        None
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get(&self, path: &DocPath) -> Result<Option<DocSnapshot>, StoreError> {
        let docs = self.docs.lock().await;
        Ok(docs.0.get(&Documents::key(path)).map(|data| DocSnapshot {
            path: path.clone(),
            data: data.clone(),
        }))
    }

    async fn commit_transaction(&self, plan: TransactionPlan) -> Result<CommitOutcome, StoreError> {
        if let Some(err) = too_large(plan.ops.len(), self.max_batch_writes) {
            return Err(err);
        }
        let mut docs = self.docs.lock().await;
        let found_latest_revision = docs
            .0
            .get(&Documents::key(&plan.precondition.root))
            .and_then(|data| data.get(FIELD_LATEST_REVISION))
            .and_then(Value::as_u64);
        if found_latest_revision != plan.precondition.expected_latest_revision {
            return Ok(CommitOutcome::StaleRoot {
                found_latest_revision,
            });
        }
        for op in plan.ops {
            docs.apply(op);
        }
        Ok(CommitOutcome::Committed)
    }

    fn new_batch(&self) -> Box<dyn WriteBatch> {
        Box::new(MemoryBatch {
            docs: Arc::clone(&self.docs),
            max_batch_writes: self.max_batch_writes,
            queued: Vec::new(),
        })
    }

    async fn auto_id(&self) -> Result<String, StoreError> {
        const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
        let mut rng = rand::thread_rng();
        let id: String = (0..20)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        Ok(id)
    }

    async fn query_by_revision(
        &self,
        collection: &DocPath,
        start: u64,
        end_exclusive: u64,
    ) -> Result<Vec<DocSnapshot>, StoreError> {
        let docs = self.docs.lock().await;
        let mut matches: Vec<DocSnapshot> = docs
            .children_of(collection)
            .into_iter()
            .filter(|doc| {
                doc.data
                    .get(crate::wire::FIELD_FIRE_REVISION)
                    .and_then(Value::as_u64)
                    .is_some_and(|rev| rev >= start && rev < end_exclusive)
            })
            .collect();
        matches.sort_by_key(|doc| {
            doc.data
                .get(crate::wire::FIELD_FIRE_REVISION)
                .and_then(Value::as_u64)
                .unwrap_or(0)
        });
        Ok(matches)
    }

    async fn list_children(&self, collection: &DocPath) -> Result<Vec<DocSnapshot>, StoreError> {
        let docs = self.docs.lock().await;
        Ok(docs.children_of(collection))
    }
}

struct MemoryBatch {
    docs: Arc<Mutex<Documents>>,
    max_batch_writes: usize,
    queued: Vec<TxnOp>,
}

#[async_trait]
impl WriteBatch for MemoryBatch {
    fn queue_set(&mut self, path: DocPath, data: Map<String, Value>) {
        self.queued.push(TxnOp::Set {
            path,
            data,
            merge: false,
        });
    }

    fn queue_delete(&mut self, path: DocPath) {
        self.queued.push(TxnOp::Delete { path });
    }

    fn len(&self) -> usize {
        self.queued.len()
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        if let Some(err) = too_large(self.queued.len(), self.max_batch_writes) {
            return Err(err);
        }
        let mut docs = self.docs.lock().await;
        for op in self.queued.drain(..) {
            docs.apply(op);
        }
        Ok(())
    }
}
