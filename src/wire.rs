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

//! Names that are part of the wire contract between this engine and the
//! remote document store. None of these may change without breaking every
//! existing root ever written by a prior version of the engine.

/// Root document field: most recently committed revision.
pub const FIELD_LATEST_REVISION: &str = "melonLatestRevision";
/// Root document field: advisory, not used for ordering.
pub const FIELD_LATEST_DATE: &str = "melonLatestDate";
/// Root document field: revision-string -> side-batch-document-id map.
pub const FIELD_BATCH_TOKENS: &str = "melonBatchTokens";

/// Per-record field stamped with the revision that wrote it. Must be an
/// indexed field in the remote store.
pub const FIELD_FIRE_REVISION: &str = "melonFireRevision";

/// Delete-record document field: the revision the deletes belong to.
pub const FIELD_DELETE_RECORD_REVISION: &str = "revision";
/// Delete-record / side-batch document field: table -> encoded-id list.
pub const FIELD_DELETES: &str = "deletes";

/// Collection under the root holding side-batch documents.
pub const COLLECTION_BATCHES: &str = "melonBatches";
/// Collection under the root holding inline-push delete records.
pub const COLLECTION_DELETES: &str = "melonDeletes";

/// Reserved fields that must never be persisted on a stored record. Legacy
/// data may still carry them; strip on read.
pub const RESERVED_RECORD_FIELDS: &[&str] = &["_status", "_changed", "melonFireChange"];
