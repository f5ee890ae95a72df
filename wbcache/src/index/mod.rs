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

//! Lookup index abstraction and its concrete variants.
//!
//! - [`keyed`]: in-memory indexes over fixed attribute-name keys, with
//!   sorted-set and sorted-list bucket strategies.
//! - [`composite`]: fan-out over several member indexes.
//! - [`store`]: pass-through variants backed by the store itself.

use std::sync::Arc;

use crate::{
    entity::Entity,
    error::{Error, Result},
    value::Parameters,
};

pub mod composite;
pub mod keyed;
pub mod store;

/// The outcome of a lookup.
///
/// The variants are ordered by how much they tell the caller; the ordinal is
/// used when aggregating answers across several indexes.
#[derive(Debug)]
pub enum Lookup<T> {
    /// The parameter set can not be answered by this index.
    NotSupported,
    /// No cached answer; the backing store might still have data.
    Unknown,
    /// Authoritatively absent, in the backing store too.
    DoesNotExist,
    /// Matching records, non-empty, in bucket order.
    Found(Vec<Arc<T>>),
}

impl<T> Lookup<T> {
    /// Ordinal used for cross-index aggregation:
    /// `NotSupported < Unknown < DoesNotExist < Found`.
    pub fn rank(&self) -> u8 {
        match self {
            Lookup::NotSupported => 0,
            Lookup::Unknown => 1,
            Lookup::DoesNotExist => 2,
            Lookup::Found(_) => 3,
        }
    }

    /// Whether the answer is final: a certain answer from one index is the
    /// composite answer regardless of what other members would say.
    pub fn is_certain(&self) -> bool {
        matches!(self, Lookup::DoesNotExist | Lookup::Found(_))
    }

    /// The matched records, if any.
    pub fn records(&self) -> Option<&[Arc<T>]> {
        match self {
            Lookup::Found(records) => Some(records),
            _ => None,
        }
    }
}

/// A container records can be added to and looked up from by attribute
/// values.
///
/// All variants share the same surface: in-memory keyed indexes, the
/// store-backed pass-throughs, the composite, and the change log. `lookup`
/// is fallible only because store-backed variants can surface store errors;
/// in-memory variants always return `Ok`.
pub trait LookupIndex<T>: Send + Sync
where
    T: Entity,
{
    /// Insert a record, replacing any record that [`same_entity`]-matches it.
    ///
    /// [`same_entity`]: Entity::same_entity
    fn add(&mut self, record: Arc<T>) -> Result<()>;

    /// Insert many records.
    ///
    /// Implementations may take a build-then-sort fast path when empty; the
    /// result must be indistinguishable by lookup from repeated [`add`]s.
    ///
    /// [`add`]: LookupIndex::add
    fn bulk_add(&mut self, records: &[Arc<T>]) -> Result<()> {
        for record in records {
            self.add(record.clone())?;
        }
        Ok(())
    }

    /// Remove a record that [`same_entity`]-matches `record`.
    ///
    /// Deleting a record whose key bucket was never populated is a caller
    /// defect and fails with an integrity error.
    ///
    /// [`same_entity`]: Entity::same_entity
    fn delete(&mut self, record: &T) -> Result<()>;

    /// Empty all internal state. Idempotent.
    fn clear(&mut self);

    /// Look up records by attribute values.
    fn lookup(&self, params: &Parameters) -> Result<Lookup<T>>;

    /// Whether absence in this index proves absence in the backing store for
    /// these parameters.
    fn authoritative(&self, params: &Parameters) -> bool {
        let _ = params;
        false
    }

    /// The first matching record, `None` unless the lookup found something.
    fn first(&self, params: &Parameters) -> Result<Option<Arc<T>>> {
        match self.lookup(params)? {
            Lookup::Found(records) => Ok(records.into_iter().next()),
            _ => Ok(None),
        }
    }

    /// The single matching record.
    ///
    /// Fails with [`Error::Ambiguous`] when more than one record matches;
    /// returns `None` when nothing was found.
    fn get(&self, params: &Parameters) -> Result<Option<Arc<T>>> {
        match self.lookup(params)? {
            Lookup::Found(records) => {
                if records.len() != 1 {
                    return Err(Error::Ambiguous { found: records.len() });
                }
                Ok(records.into_iter().next())
            }
            _ => Ok(None),
        }
    }
}
