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

use std::{fmt::Debug, sync::Arc};

use crate::{
    changelog::{Change, ChangeLog},
    entity::{Entity, SaveOptions},
    error::{Error, Result},
    index::{composite::CompositeIndex, Lookup, LookupIndex},
    sequence::Sequence,
    store::BackingStore,
    value::{Parameters, TransientId},
};

/// Decides which records have their mutations buffered in memory.
///
/// Records for which `is_cacheable` is false bypass the indexes and the
/// change log entirely; their saves and deletes are applied to the backing
/// store at the call, e.g. for record types that must always stay consistent
/// with the store.
pub trait CachePolicy<T>: Send + Sync
where
    T: Entity,
{
    /// Whether mutations of this record should be buffered and logged
    /// rather than applied immediately.
    fn is_cacheable(&self, record: &T) -> bool;
}

impl<T, F> CachePolicy<T> for F
where
    T: Entity,
    F: Fn(&T) -> bool + Send + Sync,
{
    fn is_cacheable(&self, record: &T) -> bool {
        self(record)
    }
}

/// An in-process write-back cache over a set of lookup indexes.
///
/// Mutations of cacheable records update every configured index and append
/// to the change log; nothing reaches the backing store before
/// [`flush_changes_to_database`]. A cache instance has a single logical
/// owner and is not internally synchronized; only the injected [`Sequence`]
/// is safe to share across callers.
///
/// Per-record state machine:
///
/// ```text
/// absent --add (cacheable)--> in-memory + logged
///        --delete-----------> logged as deleted
///        --flush------------> absent from log, applied to store
/// absent --add (not cacheable)--> applied directly to store
/// ```
///
/// [`flush_changes_to_database`]: WriteBackCache::flush_changes_to_database
pub struct WriteBackCache<T, P, S>
where
    T: Entity,
    P: CachePolicy<T>,
    S: BackingStore<T>,
{
    indexes: CompositeIndex<T>,
    change_log: ChangeLog<T>,
    store: Arc<S>,
    policy: P,
    sequence: Arc<Sequence>,
}

impl<T, P, S> Debug for WriteBackCache<T, P, S>
where
    T: Entity,
    P: CachePolicy<T>,
    S: BackingStore<T>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteBackCache")
            .field("indexes", &self.indexes)
            .field("change_log", &self.change_log)
            .finish()
    }
}

/// Builder for [`WriteBackCache`].
pub struct WriteBackCacheBuilder<T, P, S>
where
    T: Entity,
    P: CachePolicy<T>,
    S: BackingStore<T>,
{
    indexes: CompositeIndex<T>,
    store: Arc<S>,
    policy: P,
    sequence: Option<Arc<Sequence>>,
}

impl<T, P, S> WriteBackCacheBuilder<T, P, S>
where
    T: Entity,
    P: CachePolicy<T>,
    S: BackingStore<T>,
{
    /// Start a builder over the given backing store and cacheability policy.
    pub fn new(store: Arc<S>, policy: P) -> Self {
        Self {
            indexes: CompositeIndex::new(),
            store,
            policy,
            sequence: None,
        }
    }

    /// Add a lookup index. Lookup order is configuration order.
    pub fn with_index(mut self, index: impl LookupIndex<T> + 'static) -> Self {
        self.indexes.push(index);
        self
    }

    /// Share a change-ordering sequence with other components.
    ///
    /// A fresh sequence is used when none is supplied.
    pub fn with_sequence(mut self, sequence: Arc<Sequence>) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Build the cache.
    pub fn build(self) -> WriteBackCache<T, P, S> {
        WriteBackCache {
            indexes: self.indexes,
            change_log: ChangeLog::new(),
            store: self.store,
            policy: self.policy,
            sequence: self.sequence.unwrap_or_default(),
        }
    }
}

impl<T, P, S> WriteBackCache<T, P, S>
where
    T: Entity,
    P: CachePolicy<T>,
    S: BackingStore<T>,
{
    /// Insert or update a record.
    ///
    /// Cacheable records get an identity placeholder when they have none,
    /// land in every configured index, and have a save change logged.
    /// Non-cacheable records are saved to the backing store at this call.
    pub fn add(&mut self, record: Arc<T>) -> Result<()> {
        self.add_with_options(record, SaveOptions::default())
    }

    /// [`add`] with explicit save options forwarded to the store.
    ///
    /// [`add`]: WriteBackCache::add
    pub fn add_with_options(&mut self, record: Arc<T>, options: SaveOptions) -> Result<()> {
        let counter = self.sequence.next_value();
        if !self.policy.is_cacheable(&record) {
            return Change::save(record, counter, options).apply(self.store.as_ref());
        }

        if record.identity().is_unset() {
            record.set_identity(TransientId::new().into());
        }
        tracing::trace!("[cache]: add record {}, counter {counter}", record.identity());
        self.indexes.add(record.clone())?;
        self.change_log.add(Arc::new(Change::save(record, counter, options)))
    }

    /// Delete a record.
    ///
    /// Cacheable records leave every index and have a delete change logged;
    /// non-cacheable records are deleted from the backing store at this
    /// call.
    pub fn delete(&mut self, record: Arc<T>) -> Result<()> {
        let counter = self.sequence.next_value();
        if !self.policy.is_cacheable(&record) {
            return Change::delete(record, counter).apply(self.store.as_ref());
        }

        if record.identity().is_unset() {
            return Err(Error::integrity("delete of a record that was never added"));
        }
        tracing::trace!("[cache]: delete record {}, counter {counter}", record.identity());
        self.indexes.delete(&record)?;
        self.change_log.add(Arc::new(Change::delete(record, counter)))
    }

    /// Look up records across the configured indexes.
    pub fn lookup(&self, params: &Parameters) -> Result<Lookup<T>> {
        self.indexes.lookup(params)
    }

    /// The first matching record, if any.
    pub fn first(&self, params: &Parameters) -> Result<Option<Arc<T>>> {
        self.indexes.first(params)
    }

    /// The single matching record; fails when more than one matches.
    pub fn get(&self, params: &Parameters) -> Result<Option<Arc<T>>> {
        self.indexes.get(params)
    }

    /// Bulk-populate the indexes with records fetched from the store.
    ///
    /// Loading is not a mutation: nothing is logged. Unless
    /// `add_to_existing_cache` is set, the cache is cleared first and the
    /// clear refuses to discard pending changes.
    pub fn load_to_memory(&mut self, records: &[Arc<T>], add_to_existing_cache: bool) -> Result<()> {
        if !add_to_existing_cache {
            self.clear(false)?;
        }
        tracing::debug!("[cache]: loading {} records to memory", records.len());
        self.indexes.bulk_add(records)
    }

    /// Apply every buffered change to the backing store and clear the log.
    ///
    /// Indexes are not cleared: the in-memory state stays valid and now also
    /// reflects the store's state, with real identities assigned to records
    /// that were created in memory. On a store failure the log keeps the
    /// failed and unapplied entries, so a retried flush re-attempts them.
    pub fn flush_changes_to_database(&mut self) -> Result<()> {
        self.change_log.apply_all(self.store.as_ref())?;
        self.change_log.clear();
        Ok(())
    }

    /// Clear all indexes and the change log.
    ///
    /// Refuses to discard a non-empty change log unless `force` is set,
    /// guarding against silently dropping un-flushed mutations; a refused
    /// clear leaves the cache untouched.
    pub fn clear(&mut self, force: bool) -> Result<()> {
        if !force && !self.change_log.is_empty() {
            return Err(Error::UnflushedChanges {
                pending: self.change_log.len(),
            });
        }
        self.indexes.clear();
        self.change_log.clear();
        Ok(())
    }

    /// The pending change log.
    pub fn change_log(&self) -> &ChangeLog<T> {
        &self.change_log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        index::{keyed::ListIndex, store::StoreLookup},
        test_utils::{MemStore, StoreOp, TestRecord},
        value::Value,
    };

    fn cache_everything(_: &TestRecord) -> bool {
        true
    }

    fn record(category: &str) -> Arc<TestRecord> {
        Arc::new(TestRecord::new([("category", Value::from(category))]))
    }

    fn cache(
        store: &Arc<MemStore>,
    ) -> WriteBackCache<TestRecord, fn(&TestRecord) -> bool, MemStore> {
        WriteBackCacheBuilder::new(store.clone(), cache_everything as fn(&TestRecord) -> bool)
            .with_index(ListIndex::new(["category"]))
            .with_index(StoreLookup::new(store.clone()).with_restriction(|params| params.get("identity").is_none()))
            .build()
    }

    #[test]
    fn test_add_serves_lookup_from_memory() {
        let store = Arc::new(MemStore::new());
        let mut cache = cache(&store);

        cache.add(record("x")).unwrap();
        let found = cache.lookup(&Parameters::new().with("category", "x")).unwrap();
        assert_eq!(found.records().unwrap().len(), 1);

        // nothing reached the store yet
        assert!(store.ops().is_empty());
        assert_eq!(cache.change_log().len(), 1);
    }

    #[test]
    fn test_add_assigns_placeholder_identity() {
        let store = Arc::new(MemStore::new());
        let mut cache = cache(&store);

        let r = record("x");
        assert!(r.identity().is_unset());
        cache.add(r.clone()).unwrap();
        assert!(r.identity().is_transient());
    }

    #[test_log::test]
    fn test_flush_round_trip_with_real_identity() {
        let store = Arc::new(MemStore::new());
        let mut cache = cache(&store);

        let r = record("x");
        cache.add(r.clone()).unwrap();
        cache.flush_changes_to_database().unwrap();

        assert!(cache.change_log().is_empty());
        assert!(r.identity().is_persisted());

        // in-memory state stays valid after the flush
        let found = cache.lookup(&Parameters::new().with("category", "x")).unwrap();
        assert_eq!(found.records().unwrap().len(), 1);

        // and the now-real identity resolves through the store-backed member
        let by_identity = cache
            .get(&Parameters::new().with("identity", r.identity()))
            .unwrap()
            .unwrap();
        assert!(by_identity.same_entity(&r));
    }

    #[test]
    fn test_multiple_saves_flush_last_state() {
        let store = Arc::new(MemStore::new());
        let mut cache = cache(&store);

        let r = record("x");
        cache.add(r.clone()).unwrap();
        r.set_attribute("rank", Value::Int(1));
        cache.add(r.clone()).unwrap();
        r.set_attribute("rank", Value::Int(2));
        cache.add(r.clone()).unwrap();

        cache.flush_changes_to_database().unwrap();
        // one effective application per identity
        assert_eq!(store.ops().len(), 1);
        let saved = store.filter(&Parameters::new().with("category", "x")).unwrap();
        assert_eq!(saved[0].attribute("rank"), Some(Value::Int(2)));
    }

    #[test]
    fn test_delete_then_flush_deletes_from_store() {
        let store = Arc::new(MemStore::new());
        let loaded = record("x");
        store.save(&loaded, &SaveOptions::default()).unwrap();
        store.take_ops();

        let mut cache = cache(&store);
        cache.load_to_memory(&[loaded.clone()], false).unwrap();
        // loading is not a mutation
        assert!(cache.change_log().is_empty());

        cache.delete(loaded.clone()).unwrap();
        assert!(matches!(
            cache.lookup(&Parameters::new().with("category", "x")).unwrap(),
            Lookup::Unknown
        ));

        cache.flush_changes_to_database().unwrap();
        assert_eq!(store.ops(), vec![StoreOp::Delete(loaded.identity())]);
    }

    #[test]
    fn test_created_then_deleted_before_flush_is_noop() {
        let store = Arc::new(MemStore::new());
        let mut cache = cache(&store);

        let r = record("x");
        cache.add(r.clone()).unwrap();
        cache.delete(r).unwrap();
        cache.flush_changes_to_database().unwrap();

        assert!(store.ops().is_empty());
        assert!(cache.change_log().is_empty());
    }

    #[test]
    fn test_non_cacheable_bypass() {
        let store = Arc::new(MemStore::new());
        let policy = |record: &TestRecord| record.attribute("volatile") != Some(Value::Bool(false));
        let mut cache = WriteBackCacheBuilder::new(store.clone(), policy)
            .with_index(ListIndex::new(["category"]))
            .build();

        let direct = Arc::new(TestRecord::new([
            ("category", Value::from("x")),
            ("volatile", Value::Bool(false)),
        ]));
        cache.add(direct.clone()).unwrap();

        // applied at the call: store assigned an identity, nothing buffered
        assert!(direct.identity().is_persisted());
        assert_eq!(store.ops(), vec![StoreOp::Save(direct.identity())]);
        assert!(cache.change_log().is_empty());
        assert!(matches!(
            cache.lookup(&Parameters::new().with("category", "x")).unwrap(),
            Lookup::Unknown
        ));

        cache.delete(direct.clone()).unwrap();
        assert_eq!(store.ops().last(), Some(&StoreOp::Delete(direct.identity())));
    }

    #[test]
    fn test_delete_of_never_added_record_fails() {
        let store = Arc::new(MemStore::new());
        let mut cache = cache(&store);

        let err = cache.delete(record("x")).unwrap_err();
        assert!(matches!(err, Error::Integrity(_)));
    }

    #[test]
    fn test_clear_guards_unflushed_changes() {
        let store = Arc::new(MemStore::new());
        let mut cache = cache(&store);

        cache.add(record("x")).unwrap();
        let err = cache.clear(false).unwrap_err();
        assert!(matches!(err, Error::UnflushedChanges { pending: 1 }));

        // the refused clear left the cache intact
        assert_eq!(cache.change_log().len(), 1);
        assert!(matches!(
            cache.lookup(&Parameters::new().with("category", "x")).unwrap(),
            Lookup::Found(_)
        ));

        cache.clear(true).unwrap();
        assert!(cache.change_log().is_empty());
        assert!(matches!(
            cache.lookup(&Parameters::new().with("category", "x")).unwrap(),
            Lookup::Unknown
        ));
    }

    #[test]
    fn test_load_to_memory_refuses_dirty_cache() {
        let store = Arc::new(MemStore::new());
        let mut cache = cache(&store);

        cache.add(record("x")).unwrap();
        let err = cache.load_to_memory(&[record("y")], false).unwrap_err();
        assert!(matches!(err, Error::UnflushedChanges { .. }));

        // adding to the existing cache is fine
        let extra = record("y");
        extra.set_identity(Value::Int(100));
        cache.load_to_memory(&[extra], true).unwrap();
        assert!(matches!(
            cache.lookup(&Parameters::new().with("category", "y")).unwrap(),
            Lookup::Found(_)
        ));
    }

    #[test_log::test]
    fn test_failed_flush_can_be_retried() {
        let store = Arc::new(MemStore::new());
        let mut cache = cache(&store);

        let r = record("x");
        cache.add(r.clone()).unwrap();
        store.fail_saves(true);

        assert!(matches!(
            cache.flush_changes_to_database().unwrap_err(),
            Error::Store(_)
        ));
        assert_eq!(cache.change_log().len(), 1);

        store.fail_saves(false);
        cache.flush_changes_to_database().unwrap();
        assert!(cache.change_log().is_empty());
        assert!(r.identity().is_persisted());
    }
}
