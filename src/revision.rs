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

//! Revision metadata: the root document modeled as an explicit sum type
//! rather than a partial record with optional fields scattered through the
//! call sites that read it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::store::DocSnapshot;
use crate::wire::{FIELD_BATCH_TOKENS, FIELD_LATEST_DATE, FIELD_LATEST_REVISION};

/// The root document, modeled as present-or-absent rather than as a
/// partial record with nullable fields. Produced once per push/pull call
/// by [`RootState::from_snapshot`] and consumed everywhere via
/// [`RootState::next_revision_to_write`] / [`RootState::batch_tokens`], so
/// push and pull always compute identical values from identical inputs.
#[derive(Debug, Clone)]
pub enum RootState {
    Absent,
    Present {
        latest_revision: u64,
        latest_date: Option<DateTime<Utc>>,
        batch_tokens: BTreeMap<u64, String>,
    },
}

impl RootState {
    pub fn from_snapshot(snapshot: Option<&DocSnapshot>) -> Self {
        let Some(snapshot) = snapshot else {
            return RootState::Absent;
        };
        let Some(latest_revision) = snapshot
            .data
            .get(FIELD_LATEST_REVISION)
            .and_then(Value::as_u64)
        else {
            return RootState::Absent;
        };
        let latest_date = snapshot
            .data
            .get(FIELD_LATEST_DATE)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let batch_tokens = snapshot
            .data
            .get(FIELD_BATCH_TOKENS)
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| {
                        let revision: u64 = k.parse().ok()?;
                        let token = v.as_str()?.to_owned();
                        Some((revision, token))
                    })
                    .collect()
            })
            .unwrap_or_default();
        RootState::Present {
            latest_revision,
            latest_date,
            batch_tokens,
        }
    }

    /// `(latestRevision ?? 0) + 1` — both the exclusive end of the pull
    /// range and the revision the next push must write.
    pub fn next_revision_to_write(&self) -> u64 {
        match self {
            RootState::Absent => 1,
            RootState::Present { latest_revision, .. } => latest_revision + 1,
        }
    }

    /// Alias for [`Self::next_revision_to_write`], named for its use at the
    /// pull side as the exclusive end of the walked revision range.
    pub fn end_revision_exclusive(&self) -> u64 {
        self.next_revision_to_write()
    }

    pub fn latest_revision(&self) -> Option<u64> {
        match self {
            RootState::Absent => None,
            RootState::Present { latest_revision, .. } => Some(*latest_revision),
        }
    }

    pub fn batch_tokens(&self) -> BTreeMap<u64, String> {
        match self {
            RootState::Absent => BTreeMap::new(),
            RootState::Present { batch_tokens, .. } => batch_tokens.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DocPath;
    use serde_json::json;

    #[test]
    fn absent_root_starts_at_revision_one() {
        let state = RootState::from_snapshot(None);
        assert_eq!(state.next_revision_to_write(), 1);
        assert_eq!(state.end_revision_exclusive(), 1);
        assert!(state.batch_tokens().is_empty());
    }

    #[test]
    fn present_root_parses_batch_tokens() {
        let snapshot = DocSnapshot {
            path: DocPath::root("ctx"),
            data: json!({
                "melonLatestRevision": 3,
                "melonLatestDate": "2024-01-01T00:00:00Z",
                "melonBatchTokens": { "2": "tokABC" },
            })
            .as_object()
            .unwrap()
            .clone(),
        };
        let state = RootState::from_snapshot(Some(&snapshot));
        assert_eq!(state.next_revision_to_write(), 4);
        assert_eq!(state.latest_revision(), Some(3));
        assert_eq!(state.batch_tokens().get(&2), Some(&"tokABC".to_string()));
    }
}
