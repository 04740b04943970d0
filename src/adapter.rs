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

//! The shapes the local sync-framework adapter sends into
//! [`crate::push::push`] and expects back from [`crate::pull::pull`].
//! `sendCreatedAsUpdated = true` is required of the adapter configuration:
//! this engine never distinguishes creates from updates on the way back out
//! of a pull, since a row created in one push and updated in a later one
//! within the same pulled range would otherwise need reclassifying.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// A single row as the adapter sees it: a logical id plus its field map.
/// Reserved internal fields (`_status`, `_changed`, `melonFireChange`,
/// `melonFireRevision`) are never present on a `Row` the adapter hands to
/// [`crate::push::push`], and are stripped before one is handed back from
/// [`crate::pull::pull`].
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: String,
    pub fields: Map<String, Value>,
}

/// Per-table changeset, as produced locally (push) or returned to the
/// adapter (pull).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableChanges {
    pub created: Vec<Row>,
    pub updated: Vec<Row>,
    pub deleted: Vec<String>,
}

/// `{ table -> changes }`, the shape both `push` and `pull` exchange with
/// the adapter.
pub type Changes = BTreeMap<String, TableChanges>;

/// Input to [`crate::push::push`].
#[derive(Debug, Clone)]
pub struct PushArgs {
    /// The exclusive revision watermark from the caller's most recent
    /// pull; must equal the next revision to write or the push fails with
    /// `OUT_OF_SYNC`.
    pub last_pulled_at: u64,
    pub changes: Changes,
}

/// Input to [`crate::pull::pull`].
#[derive(Debug, Clone, Copy)]
pub struct PullArgs {
    /// `None` requests a full-history pull from revision 1.
    pub last_pulled_at: Option<u64>,
}

/// Output of [`crate::pull::pull`].
#[derive(Debug, Clone, PartialEq)]
pub struct PullResult {
    pub changes: Changes,
    /// The watermark the caller should pass as `last_pulled_at` on its next
    /// pull and push.
    pub timestamp: u64,
}
