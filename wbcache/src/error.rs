// Copyright 2026 wbcache Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

/// Write-back cache error.
///
/// Integrity errors indicate programmer defects (deleting a record that was
/// never added, clearing a dirty cache without forcing) and are raised at the
/// offending call, never deferred or silently ignored. Unsupported queries
/// are not errors; they surface as [`Lookup::NotSupported`].
///
/// [`Lookup::NotSupported`]: crate::index::Lookup::NotSupported
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// `get()` promises exactly-one semantics and matched more than one record.
    #[error("get() matched {found} records, expected exactly one")]
    Ambiguous {
        /// Number of records the lookup matched.
        found: usize,
    },
    /// A structural invariant was violated by the caller.
    #[error("integrity violation: {0}")]
    Integrity(String),
    /// Change log entries can not be deleted; record a delete change instead.
    #[error("change log entries can not be deleted, record a delete change instead")]
    ChangeLogDelete,
    /// A non-forced clear would discard buffered, unflushed changes.
    #[error("clear would discard {pending} unflushed identities, flush first or force")]
    UnflushedChanges {
        /// Number of identities with pending changes.
        pending: usize,
    },
    /// Backing store failure, propagated unmodified. No retry, no rollback.
    #[error("backing store error: {0}")]
    Store(#[source] anyhow::Error),
}

impl Error {
    /// Create an integrity violation error.
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity(message.into())
    }

    /// Wrap a backing store error.
    pub fn store(source: impl Into<anyhow::Error>) -> Self {
        Self::Store(source.into())
    }
}

/// Write-back cache result.
pub type Result<T> = std::result::Result<T, Error>;
