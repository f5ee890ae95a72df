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

use std::sync::Arc;

use crate::{
    entity::{Entity, SaveOptions},
    error::Result,
    value::Parameters,
};

/// The persistent record store behind the cache.
///
/// The store remains the source of truth; the cache only defers writes to
/// it. Calls are ordinary blocking calls with no internal retry or timeout,
/// and no cache lock is held across them. Adapters wrap their native errors
/// with [`Error::store`].
///
/// [`Error::store`]: crate::error::Error::store
pub trait BackingStore<T>: Send + Sync
where
    T: Entity,
{
    /// Persist the record's current field state.
    ///
    /// If the record's identity is unset the store assigns one via
    /// [`Entity::set_identity`] before returning.
    fn save(&self, record: &Arc<T>, options: &SaveOptions) -> Result<()>;

    /// Remove the persisted record.
    ///
    /// Only called for records known to carry a store-assigned identity.
    fn delete(&self, record: &T) -> Result<()>;

    /// Query records by attribute values, in store order.
    ///
    /// Used by the pass-through lookup variant only; the in-memory indexes
    /// never consult the store.
    fn filter(&self, params: &Parameters) -> Result<Vec<Arc<T>>>;
}
