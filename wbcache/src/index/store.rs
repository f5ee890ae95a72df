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

use std::{fmt::Debug, marker::PhantomData, sync::Arc};

use crate::{
    entity::{Entity, SaveOptions},
    error::Result,
    index::{Lookup, LookupIndex},
    store::BackingStore,
    value::Parameters,
};

/// Predicate restricting which parameter sets may reach the store.
pub type RestrictFn = Arc<dyn Fn(&Parameters) -> bool + Send + Sync>;

/// Read-only pass-through lookup backed by the store itself.
///
/// Meant as a backup member of a composite, consulted when no in-memory
/// index has an answer. Mutations are no-ops here; they belong in the change
/// log, not in direct store traffic.
///
/// Queries through this variant see the store's state, not the cache's, so
/// it is usually desirable to restrict them with [`with_restriction`] to
/// parameter sets the cache is known not to cover, keeping results
/// consistent.
///
/// [`with_restriction`]: StoreLookup::with_restriction
pub struct StoreLookup<T, S> {
    store: Arc<S>,
    restrict: Option<RestrictFn>,
    _marker: PhantomData<T>,
}

impl<T, S> Debug for StoreLookup<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreLookup").finish()
    }
}

impl<T, S> StoreLookup<T, S>
where
    T: Entity,
    S: BackingStore<T>,
{
    /// Create a pass-through over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            restrict: None,
            _marker: PhantomData,
        }
    }

    /// Turn queries for which `restrict` returns true into `NotSupported`.
    pub fn with_restriction(mut self, restrict: impl Fn(&Parameters) -> bool + Send + Sync + 'static) -> Self {
        self.restrict = Some(Arc::new(restrict));
        self
    }

    fn restricted(&self, params: &Parameters) -> bool {
        self.restrict.as_ref().is_some_and(|restrict| restrict(params))
    }
}

impl<T, S> LookupIndex<T> for StoreLookup<T, S>
where
    T: Entity,
    S: BackingStore<T>,
{
    fn add(&mut self, _record: Arc<T>) -> Result<()> {
        Ok(())
    }

    fn delete(&mut self, _record: &T) -> Result<()> {
        Ok(())
    }

    fn clear(&mut self) {}

    fn lookup(&self, params: &Parameters) -> Result<Lookup<T>> {
        if self.restricted(params) {
            return Ok(Lookup::NotSupported);
        }
        let records = self.store.filter(params)?;
        if records.is_empty() {
            Ok(Lookup::DoesNotExist)
        } else {
            Ok(Lookup::Found(records))
        }
    }

    fn authoritative(&self, params: &Parameters) -> bool {
        // the store is the source of truth
        !self.restricted(params)
    }
}

/// Uncached read-write interface: every operation goes straight to the
/// store.
///
/// Useful as a drop-in [`LookupIndex`] for record types excluded from
/// caching altogether.
pub struct StoreReadWrite<T, S> {
    inner: StoreLookup<T, S>,
}

impl<T, S> Debug for StoreReadWrite<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreReadWrite").finish()
    }
}

impl<T, S> StoreReadWrite<T, S>
where
    T: Entity,
    S: BackingStore<T>,
{
    /// Create a write-through interface over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            inner: StoreLookup::new(store),
        }
    }
}

impl<T, S> LookupIndex<T> for StoreReadWrite<T, S>
where
    T: Entity,
    S: BackingStore<T>,
{
    fn add(&mut self, record: Arc<T>) -> Result<()> {
        self.inner.store.save(&record, &SaveOptions::default())
    }

    fn delete(&mut self, record: &T) -> Result<()> {
        self.inner.store.delete(record)
    }

    fn clear(&mut self) {}

    fn lookup(&self, params: &Parameters) -> Result<Lookup<T>> {
        self.inner.lookup(params)
    }

    fn authoritative(&self, params: &Parameters) -> bool {
        self.inner.authoritative(params)
    }
}
