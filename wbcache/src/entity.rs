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

use crate::value::Value;

/// The caller-defined record contract.
///
/// The cache shares records with the caller by `Arc` and never deep-copies
/// them; [`set_identity`] therefore takes `&self` and implementers provide
/// interior mutability for the identity field (a `parking_lot` lock or a
/// cell, depending on the threading story).
///
/// Identity lifecycle: a record starts with `Value::Null`, receives a
/// `Value::Transient` placeholder when first added to a cache, and is given
/// its real, store-assigned identity exactly once, when its save is flushed.
///
/// # Aliasing
///
/// Attributes used as index keys must not change while the record is
/// indexed. The cache can not detect violations; delete, mutate, re-add.
///
/// [`set_identity`]: Entity::set_identity
pub trait Entity: Send + Sync + 'static {
    /// Current identity of the record.
    fn identity(&self) -> Value;

    /// Replace the identity of the record.
    fn set_identity(&self, identity: Value);

    /// Current value of the named attribute, `None` if the record has no
    /// such attribute.
    fn attribute(&self, name: &str) -> Option<Value>;

    /// Whether `self` and `other` are the same record.
    ///
    /// Two records are the same when both identities are assigned and equal;
    /// a record with an unset identity equals nothing, not even itself.
    /// Duplicate elimination in index buckets runs on this relation, so an
    /// `add` of an updated instance replaces the stale one.
    fn same_entity(&self, other: &Self) -> bool {
        let identity = self.identity();
        !identity.is_unset() && identity == other.identity()
    }
}

/// Options forwarded to [`BackingStore::save`].
///
/// [`BackingStore::save`]: crate::store::BackingStore::save
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Restrict the save to these fields. `None` saves everything.
    pub update_fields: Option<Vec<&'static str>>,
    /// Force the store to treat the save as an insert.
    pub force_insert: bool,
}
