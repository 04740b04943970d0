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

//! The remote-store interface. Everything the engine needs from the
//! backend: single document reads, one bounded atomic transaction
//! primitive, a non-transactional bounded write batch, and query by the
//! `melonFireRevision` index.
//!
//! A transaction is expressed as a data value — a [`TransactionPlan`] with
//! a precondition on the root's `melonLatestRevision` — that the store
//! commits atomically, rather than as a closure threaded through an opaque
//! `runTransaction(fn)` (which a Rust trait method cannot express
//! object-safely). This mirrors a Firestore transaction's
//! optimistic-read-then-write semantics without requiring higher-ranked
//! async closures.

pub mod faulty;
pub mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;

use crate::error::StoreError;

/// A path to a document or collection under the caller-supplied sync root,
/// expressed as path segments (`["melonBatches", "tok123", "entries",
/// "aaa"]`) rather than a pre-joined string, so backends that address
/// documents hierarchically (Firestore) or backends that flatten to a
/// single key (the in-memory test double) can both consume it directly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocPath(Vec<String>);

impl DocPath {
    /// A new path rooted at the given caller-provided handle.
    pub fn root(handle: impl Into<String>) -> Self {
        Self(vec![handle.into()])
    }

    /// Append a segment, returning the extended path.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

/// A document as read back from the store: its path and field map. Legacy
/// internal fields may still be present; callers strip them.
#[derive(Debug, Clone)]
pub struct DocSnapshot {
    pub path: DocPath,
    pub data: Map<String, Value>,
}

/// A single write queued either inside a [`TransactionPlan`] or a
/// [`WriteBatch`].
#[derive(Debug, Clone)]
pub enum TxnOp {
    /// Install `data` at `path`. `merge = true` preserves fields not
    /// present in `data` (used for the root update); `merge = false`
    /// replaces the document wholesale (used for table records, which are
    /// always *set*, never *merged* or *updated*).
    Set {
        path: DocPath,
        data: Map<String, Value>,
        merge: bool,
    },
    /// Remove the document at `path` if it exists.
    Delete { path: DocPath },
}

/// The optimistic-concurrency precondition every push transaction carries:
/// the root's `melonLatestRevision` must equal `expected_latest_revision`
/// (or be absent, when `expected_latest_revision` is `None`) at commit
/// time, not just at the time the caller read it.
#[derive(Debug, Clone)]
pub struct RootPrecondition {
    pub root: DocPath,
    pub expected_latest_revision: Option<u64>,
}

/// A bounded set of writes plus the root precondition that must hold for
/// them to commit. At most [`crate::config::SyncConfig::max_batch_writes`]
/// entries in `ops` (callers never exceed this; the planner is responsible
/// for it).
#[derive(Debug, Clone)]
pub struct TransactionPlan {
    pub precondition: RootPrecondition,
    pub ops: Vec<TxnOp>,
}

/// Outcome of attempting to commit a [`TransactionPlan`].
#[derive(Debug)]
pub enum CommitOutcome {
    /// The precondition held and every op in the plan was applied
    /// atomically.
    Committed,
    /// The root's actual `melonLatestRevision` did not match the plan's
    /// precondition; nothing was applied.
    StaleRoot { found_latest_revision: Option<u64> },
}

/// A non-transactional, bounded write batch. Unlike a [`TransactionPlan`], a
/// batch carries no precondition and there is no atomicity guarantee across
/// multiple `commit()` calls on the same logical
/// [`crate::batch_writer::BatchWriter`] — exactly the property that forces
/// the side-batch algorithm to exist.
#[async_trait]
pub trait WriteBatch: Send {
    fn queue_set(&mut self, path: DocPath, data: Map<String, Value>);
    fn queue_delete(&mut self, path: DocPath);
    /// Number of operations queued since the last successful commit.
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Commit every queued operation atomically as one write batch, then
    /// clear the queue. A store implementation should reject (return an
    /// error) a batch larger than its own transactional write cap; the
    /// reference in-memory store does, to catch planner bugs in tests.
    async fn commit(&mut self) -> Result<(), StoreError>;
}

/// The interface the engine consumes from the remote document store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Read a single document. `Ok(None)` if it does not exist.
    async fn get(&self, path: &DocPath) -> Result<Option<DocSnapshot>, StoreError>;

    /// Attempt to commit `plan` atomically, subject to its precondition.
    async fn commit_transaction(&self, plan: TransactionPlan) -> Result<CommitOutcome, StoreError>;

    /// A fresh, empty write batch bound to this store.
    fn new_batch(&self) -> Box<dyn WriteBatch>;

    /// Generate a fresh, store-unique document id (used for side-batch
    /// tokens and `melonDeletes` auto-ids).
    async fn auto_id(&self) -> Result<String, StoreError>;

    /// Query `collection` for documents whose `melonFireRevision` field
    /// lies in `[start, end_exclusive)`, ordered by that field ascending.
    async fn query_by_revision(
        &self,
        collection: &DocPath,
        start: u64,
        end_exclusive: u64,
    ) -> Result<Vec<DocSnapshot>, StoreError>;

    /// List every direct child document of `collection` (used by delete-ref
    /// discovery and side-batch rollback).
    async fn list_children(&self, collection: &DocPath) -> Result<Vec<DocSnapshot>, StoreError>;
}
