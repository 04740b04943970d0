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

//! Persisted-record shape helpers.
//!
//! Strict on write, lenient on read: writing never emits the reserved
//! internal fields, while reading always strips them, tolerating legacy
//! data that still carries them.

use serde_json::{Map, Value};

use crate::adapter::Row;
use crate::wire::{FIELD_FIRE_REVISION, RESERVED_RECORD_FIELDS};

/// Build the document body for `row` as written at `revision`: internals
/// stripped, `melonFireRevision` stamped, logical `id` embedded verbatim.
pub fn prepare_for_write(row: &Row, revision: u64) -> Map<String, Value> {
    let mut data = strip_reserved(row.fields.clone());
    data.insert("id".to_string(), Value::String(row.id.clone()));
    data.insert(FIELD_FIRE_REVISION.to_string(), Value::from(revision));
    data
}

/// Remove every reserved/internal field from a document body, for records
/// read back from the store before they are interpreted.
pub fn strip_reserved(mut data: Map<String, Value>) -> Map<String, Value> {
    for field in RESERVED_RECORD_FIELDS {
        data.remove(*field);
    }
    data.remove(FIELD_FIRE_REVISION);
    data
}

/// Reconstruct the adapter-visible [`Row`] from a stored document body.
pub fn row_from_doc(mut data: Map<String, Value>) -> Row {
    let id = data
        .remove("id")
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default();
    Row {
        id,
        fields: strip_reserved(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prepare_for_write_strips_internals_and_stamps_revision() {
        let row = Row {
            id: "aaa".into(),
            fields: json!({ "title": "hi", "_status": "created", "_changed": "title" })
                .as_object()
                .unwrap()
                .clone(),
        };
        let data = prepare_for_write(&row, 7);
        assert_eq!(data.get("id").unwrap(), "aaa");
        assert_eq!(data.get(FIELD_FIRE_REVISION).unwrap(), 7);
        assert!(!data.contains_key("_status"));
        assert!(!data.contains_key("_changed"));
    }

    #[test]
    fn row_from_doc_round_trips_fields() {
        let row = Row {
            id: "bbb".into(),
            fields: json!({ "title": "hi" }).as_object().unwrap().clone(),
        };
        let data = prepare_for_write(&row, 1);
        let restored = row_from_doc(data);
        assert_eq!(restored.id, "bbb");
        assert_eq!(restored.fields.get("title").unwrap(), "hi");
        assert!(!restored.fields.contains_key(FIELD_FIRE_REVISION));
    }
}
