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

//! Engine-wide configuration, threaded through every call as a plain
//! struct with a `Default` impl, constructed once by the caller.

/// Tuning knobs for the sync engine. The only field most callers need to
/// touch is `max_batch_writes`, and then only in tests — production
/// backends have a fixed transactional limit.
#[derive(Debug, Clone, Copy)]
pub struct SyncConfig {
    /// Maximum number of writes the remote store accepts in a single
    /// transaction or batch commit. 500 in the reference environment.
    pub max_batch_writes: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_batch_writes: 500,
        }
    }
}

impl SyncConfig {
    /// Convenience constructor for tests that want a small `W` to exercise
    /// the side-batch path without generating thousands of rows.
    pub fn with_max_batch_writes(max_batch_writes: usize) -> Self {
        Self { max_batch_writes }
    }
}
