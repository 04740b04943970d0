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

//! Error and Result types for the sync engine.
//!
//! One variant per distinct failure a push can hit: it either succeeds or
//! fails with one of these, and the failure kind dictates what
//! the caller (or the single outer retry in [`crate::retry::with_retry`])
//! is allowed to assume about remote state.

use std::fmt;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Opaque error produced by a [`crate::store::RemoteStore`] implementation.
///
/// The engine treats the remote store as an external collaborator and does
/// not interpret its errors beyond "did the operation commit or not"; the
/// store implementor's own error type is boxed here so this crate stays
/// generic over whatever backend (Firestore, a test double, ...) is wired
/// in.
pub type StoreError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The push transaction observed `revision != lastPulledAt`: a
    /// concurrent writer committed, or the caller dropped a pull. No
    /// mutation was made to the root.
    #[error("out of sync: expected revision {expected}, found {found}")]
    OutOfSync { expected: u64, found: u64 },

    /// The remote store rejected a transaction or batch for reasons other
    /// than a stale write (network error, quota, server-side rejection).
    #[error("remote store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// The stage phase of a side-batch push failed to commit. The staged
    /// side-batch document (if partially written) is orphaned: it is never
    /// linked from the root, so no reader will ever observe it, and a
    /// future push's delete-ref scan will simply not find it.
    #[error("side-batch stage failed: {0}")]
    StageFailed(#[source] StoreError),

    /// The integrate transaction of a side-batch push failed after staging
    /// succeeded. Rollback of the staged side-batch was attempted; see
    /// whether it succeeded via the wrapped error variant.
    #[error("side-batch integrate failed: {0}")]
    IntegrateFailed(#[source] StoreError),

    /// Rollback of a failed integrate itself failed. Both the original
    /// integrate error and the rollback error are carried so an operator
    /// can locate and clean up the orphaned side-batch by hand.
    #[error("rollback failed after integrate error ({integrate_error}): {rollback_error}")]
    RollbackFailed {
        integrate_error: StoreErrorDisplay,
        rollback_error: StoreErrorDisplay,
    },
}

/// Wraps a [`StoreError`] so it can be embedded in a struct-style error
/// variant (which requires `Clone`-free `Display`/`Debug`, not `Error`
/// trait object composition via `#[source]` on more than one field).
#[derive(Debug)]
pub struct StoreErrorDisplay(pub StoreError);

impl fmt::Display for StoreErrorDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<StoreError> for StoreErrorDisplay {
    fn from(e: StoreError) -> Self {
        StoreErrorDisplay(e)
    }
}

impl Error {
    /// Unwrap this error back down to a [`StoreError`], for code (rollback)
    /// that needs to keep composing lower-level failures rather than
    /// surfacing this crate's own `Error` type. Non-store variants are
    /// boxed as-is, since `Error` itself implements `std::error::Error`.
    pub fn into_store_error(self) -> StoreError {
        match self {
            Error::StoreUnavailable(e) | Error::StageFailed(e) | Error::IntegrateFailed(e) => e,
            other => Box::new(other),
        }
    }
}
