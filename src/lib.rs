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

//! A client-side synchronization engine that reconciles a local,
//! row-oriented database against a remote hierarchical document store,
//! under the constraint that the remote store only accepts multi-document
//! transactions of at most `W` writes.
//!
//! This crate implements the client half of a pull/push sync protocol: the
//! local database periodically emits *pull* (fetch all remote changes
//! since a watermark) and *push* (submit a local changeset) requests; this
//! crate translates them into remote document operations, making pushes
//! atomic even when the changeset exceeds `W`, and reconstructing a
//! consistent merged changeset during pull across mixed storage regions.
//!
//! The remote store itself, and the local adapter that calls into this
//! crate, are both external collaborators: this crate defines the
//! [`RemoteStore`] trait the backend must implement, and the [`Row`] /
//! [`Changes`] / [`PullArgs`] / [`PushArgs`] / [`PullResult`] types the
//! adapter exchanges with it.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use melonfire_sync::{
//!     push, pull, with_retry, Changes, PullArgs, PushArgs, Row, SyncConfig, TableChanges,
//! };
//! use melonfire_sync::store::{DocPath, memory::MemoryStore};
//!
//! # async fn run() -> melonfire_sync::Result<()> {
//! let store = MemoryStore::new(500);
//! let cfg = SyncConfig::default();
//! let root = DocPath::root("my-sync-context");
//!
//! let mut changes = Changes::new();
//! changes.insert(
//!     "entries".to_string(),
//!     TableChanges {
//!         created: vec![Row { id: "aaa".into(), fields: serde_json::Map::new() }],
//!         updated: vec![],
//!         deleted: vec![],
//!     },
//! );
//!
//! push(&store, &cfg, &root, PushArgs { last_pulled_at: 1, changes }).await?;
//!
//! let result = pull(&store, &["entries".to_string()], &root, PullArgs { last_pulled_at: None }).await?;
//! assert_eq!(result.changes["entries"].updated.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod batch_writer;
pub mod config;
pub mod error;
pub mod id;
pub mod pull;
pub mod push;
pub mod record;
pub mod retry;
pub mod revision;
pub mod store;
pub mod wire;

pub use adapter::{Changes, PullArgs, PullResult, PushArgs, Row, TableChanges};
pub use config::SyncConfig;
pub use error::{Error, Result};
pub use pull::pull;
pub use push::push;
pub use retry::with_retry;
pub use store::{RemoteStore, WriteBatch};
