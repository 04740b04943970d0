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

//! A [`RemoteStore`] wrapper that injects failures on command, for driving
//! the rollback and stale-write paths in `src/push/side_batch.rs` that a
//! correct planner never trips against [`super::memory::MemoryStore`]
//! alone. Built unconditionally, not gated behind `#[cfg(test)]`, for the
//! same reason `MemoryStore` is: integration tests under `tests/` compile
//! against the library from outside the crate and need a usable handle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::error::StoreError;

use super::{CommitOutcome, DocPath, DocSnapshot, RemoteStore, TransactionPlan, WriteBatch};

/// How a [`FaultCounter`] decides whether the next call fails.
#[derive(Debug, Clone, Copy)]
pub enum FailMode {
    /// Never fail; delegate every call to the inner store.
    Never,
    /// Fail exactly the next call, then behave as `Never`.
    Once,
    /// Let the first `n` calls through, then fail every call after that.
    AfterN(usize),
}

struct FaultCounter {
    calls: AtomicUsize,
    mode: Mutex<FailMode>,
}

impl FaultCounter {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            mode: Mutex::new(FailMode::Never),
        }
    }

    async fn arm(&self, mode: FailMode) {
        self.calls.store(0, Ordering::SeqCst);
        *self.mode.lock().await = mode;
    }

    async fn should_fail(&self) -> bool {
        let mut mode = self.mode.lock().await;
        match *mode {
            FailMode::Never => false,
            FailMode::Once => {
                *mode = FailMode::Never;
                true
            }
            FailMode::AfterN(n) => self.calls.fetch_add(1, Ordering::SeqCst) >= n,
        }
    }
}

/// Wraps any [`RemoteStore`] and lets a test arm `commit_transaction` and/or
/// write-batch `commit` to fail on demand, so `Error::StageFailed`,
/// `Error::IntegrateFailed`, and `Error::RollbackFailed` can be exercised
/// end to end instead of only being reachable against a real backend.
pub struct FaultyStore<S> {
    inner: S,
    commit_transaction: Arc<FaultCounter>,
    batch_commit: Arc<FaultCounter>,
}

impl<S: RemoteStore> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            commit_transaction: Arc::new(FaultCounter::new()),
            batch_commit: Arc::new(FaultCounter::new()),
        }
    }

    /// Arm `commit_transaction` to fail per `mode`, starting with the next call.
    pub async fn fail_commit_transaction(&self, mode: FailMode) {
        self.commit_transaction.arm(mode).await;
    }

    /// Arm every write batch's `commit` to fail per `mode`, starting with
    /// the next call across *any* batch this store hands out.
    pub async fn fail_batch_commit(&self, mode: FailMode) {
        self.batch_commit.arm(mode).await;
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

fn injected(what: &str) -> StoreError {
    format!("injected failure: {what}").into()
}

#[async_trait]
impl<S: RemoteStore> RemoteStore for FaultyStore<S> {
    async fn get(&self, path: &DocPath) -> Result<Option<DocSnapshot>, StoreError> {
        self.inner.get(path).await
    }

    async fn commit_transaction(&self, plan: TransactionPlan) -> Result<CommitOutcome, StoreError> {
        if self.commit_transaction.should_fail().await {
            return Err(injected("commit_transaction"));
        }
        self.inner.commit_transaction(plan).await
    }

    fn new_batch(&self) -> Box<dyn WriteBatch> {
        Box::new(FaultyBatch {
            inner: self.inner.new_batch(),
            batch_commit: Arc::clone(&self.batch_commit),
        })
    }

    async fn auto_id(&self) -> Result<String, StoreError> {
        self.inner.auto_id().await
    }

    async fn query_by_revision(
        &self,
        collection: &DocPath,
        start: u64,
        end_exclusive: u64,
    ) -> Result<Vec<DocSnapshot>, StoreError> {
        self.inner.query_by_revision(collection, start, end_exclusive).await
    }

    async fn list_children(&self, collection: &DocPath) -> Result<Vec<DocSnapshot>, StoreError> {
        self.inner.list_children(collection).await
    }
}

struct FaultyBatch {
    inner: Box<dyn WriteBatch>,
    batch_commit: Arc<FaultCounter>,
}

#[async_trait]
impl WriteBatch for FaultyBatch {
    fn queue_set(&mut self, path: DocPath, data: Map<String, Value>) {
        self.inner.queue_set(path, data);
    }

    fn queue_delete(&mut self, path: DocPath) {
        self.inner.queue_delete(path);
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        if self.batch_commit.should_fail().await {
            return Err(injected("batch commit"));
        }
        self.inner.commit().await
    }
}
