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

use hashbrown::HashMap;

use crate::{
    entity::Entity,
    error::{Error, Result},
    index::{Lookup, LookupIndex},
    value::{Parameters, Value},
};

/// Caller-supplied sort key: maps a record to the [`Value`] its bucket is
/// ordered by.
pub type SortKeyFn<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;

/// The ordered collection of records sharing one index key.
///
/// Strategies differ in how they keep order and how strict deletion is; a
/// [`KeyedIndex`] is generic over the strategy instead of subclassing it.
pub trait Bucket<T>: Default + Send + Sync
where
    T: Entity,
{
    /// Whether an empty index may bulk-build buckets with [`append`] and a
    /// single [`finish`] pass instead of per-record [`insert`]s.
    ///
    /// [`append`]: Bucket::append
    /// [`finish`]: Bucket::finish
    /// [`insert`]: Bucket::insert
    const BULK_BUILD: bool;

    /// Insert a record at its ordered position, replacing a
    /// [`same_entity`]-duplicate.
    ///
    /// [`same_entity`]: Entity::same_entity
    fn insert(&mut self, record: Arc<T>, sort: Option<&SortKeyFn<T>>);

    /// Append a record without ordering or duplicate elimination.
    ///
    /// Only used on the bulk-build path; [`finish`] restores order.
    ///
    /// [`finish`]: Bucket::finish
    fn append(&mut self, record: Arc<T>) {
        let _ = record;
        unreachable!("bucket strategy does not bulk-build");
    }

    /// Sort the bucket once after a bulk build.
    fn finish(&mut self, sort: Option<&SortKeyFn<T>>) {
        let _ = sort;
    }

    /// Remove the record matching `record` by [`same_entity`].
    ///
    /// Returns whether the strategy considers the removal satisfied.
    ///
    /// [`same_entity`]: Entity::same_entity
    fn remove(&mut self, record: &T) -> bool;

    /// The bucket contents, in bucket order.
    fn records(&self) -> &[Arc<T>];

    /// Whether the bucket holds no records.
    fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}

/// Set-semantics bucket: at most one record per entity, ordered by the sort
/// key at insertion time.
///
/// Re-adding an entity discards the stale instance and re-inserts at the
/// position its current sort fields dictate, so updated sort values take
/// effect. Removal of an absent record is refused.
pub struct SortedSetBucket<T> {
    records: Vec<Arc<T>>,
}

impl<T> Default for SortedSetBucket<T> {
    fn default() -> Self {
        Self { records: Vec::new() }
    }
}

impl<T> Bucket<T> for SortedSetBucket<T>
where
    T: Entity,
{
    const BULK_BUILD: bool = false;

    fn insert(&mut self, record: Arc<T>, sort: Option<&SortKeyFn<T>>) {
        if let Some(pos) = self.records.iter().position(|r| r.same_entity(&record)) {
            self.records.remove(pos);
        }
        match sort {
            Some(sort) => {
                let key = sort(&record);
                // insert after equal keys to keep insertion order stable
                let pos = self.records.partition_point(|r| sort(r) <= key);
                self.records.insert(pos, record);
            }
            None => self.records.push(record),
        }
    }

    fn remove(&mut self, record: &T) -> bool {
        match self.records.iter().position(|r| r.same_entity(record)) {
            Some(pos) => {
                self.records.remove(pos);
                true
            }
            None => false,
        }
    }

    fn records(&self) -> &[Arc<T>] {
        &self.records
    }
}

/// List-semantics bucket: kept sorted by re-sorting after every mutation.
///
/// `add` removes the first duplicate, appends, then re-sorts; the bulk-build
/// path appends everything and sorts once. Both converge to the same order
/// because the sort is stable. Removal filters the bucket and tolerates an
/// absent record.
pub struct ListBucket<T> {
    records: Vec<Arc<T>>,
}

impl<T> Default for ListBucket<T> {
    fn default() -> Self {
        Self { records: Vec::new() }
    }
}

impl<T> Bucket<T> for ListBucket<T>
where
    T: Entity,
{
    const BULK_BUILD: bool = true;

    fn insert(&mut self, record: Arc<T>, sort: Option<&SortKeyFn<T>>) {
        if let Some(pos) = self.records.iter().position(|r| r.same_entity(&record)) {
            self.records.remove(pos);
        }
        self.records.push(record);
        self.finish(sort);
    }

    fn append(&mut self, record: Arc<T>) {
        self.records.push(record);
    }

    fn finish(&mut self, sort: Option<&SortKeyFn<T>>) {
        if let Some(sort) = sort {
            self.records.sort_by_cached_key(|r| sort(r));
        }
    }

    fn remove(&mut self, record: &T) -> bool {
        self.records.retain(|r| !r.same_entity(record));
        true
    }

    fn records(&self) -> &[Arc<T>] {
        &self.records
    }
}

/// An in-memory index over a fixed set of key attributes, generic over the
/// bucket strategy.
///
/// Records map to a key tuple built from `key_attributes`; all records with
/// the same tuple share one bucket. A lookup is answerable only when the
/// parameter names are exactly the key attributes.
pub struct KeyedIndex<T, B> {
    key_attributes: Vec<&'static str>,
    sort: Option<SortKeyFn<T>>,
    authoritative: bool,
    buckets: HashMap<Vec<Value>, B>,
    _marker: PhantomData<T>,
}

/// [`KeyedIndex`] with [`SortedSetBucket`] buckets.
pub type SortedSetIndex<T> = KeyedIndex<T, SortedSetBucket<T>>;

/// [`KeyedIndex`] with [`ListBucket`] buckets.
pub type ListIndex<T> = KeyedIndex<T, ListBucket<T>>;

impl<T, B> Debug for KeyedIndex<T, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedIndex")
            .field("key_attributes", &self.key_attributes)
            .field("buckets", &self.buckets.len())
            .finish()
    }
}

impl<T, B> KeyedIndex<T, B>
where
    T: Entity,
    B: Bucket<T>,
{
    /// Create an index keyed on `key_attributes`, with insertion-ordered
    /// buckets and no authority over absence.
    pub fn new(key_attributes: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            key_attributes: key_attributes.into_iter().collect(),
            sort: None,
            authoritative: false,
            buckets: HashMap::new(),
            _marker: PhantomData,
        }
    }

    /// Order buckets by the given sort key.
    pub fn with_sort_key(mut self, sort: impl Fn(&T) -> Value + Send + Sync + 'static) -> Self {
        self.sort = Some(Arc::new(sort));
        self
    }

    /// Declare that absence in this index proves absence in the backing
    /// store for any supported parameter set.
    pub fn with_authoritative(mut self, authoritative: bool) -> Self {
        self.authoritative = authoritative;
        self
    }

    /// Number of populated key buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether the index holds no buckets.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// The key tuple of a record, in key-attribute order.
    fn key(&self, record: &T) -> Result<Vec<Value>> {
        self.key_attributes
            .iter()
            .map(|name| {
                record
                    .attribute(name)
                    .ok_or_else(|| Error::integrity(format!("record has no attribute `{name}`")))
            })
            .collect()
    }

    pub(crate) fn bucket_keys(&self) -> Vec<Vec<Value>> {
        self.buckets.keys().cloned().collect()
    }

    pub(crate) fn bucket(&self, key: &[Value]) -> Option<&[Arc<T>]> {
        self.buckets.get(key).map(|b| b.records())
    }

    pub(crate) fn remove_bucket(&mut self, key: &[Value]) {
        self.buckets.remove(key);
    }
}

impl<T, B> LookupIndex<T> for KeyedIndex<T, B>
where
    T: Entity,
    B: Bucket<T> + 'static,
{
    fn add(&mut self, record: Arc<T>) -> Result<()> {
        let key = self.key(&record)?;
        tracing::trace!("[index]: add record to bucket {key:?}");
        self.buckets.entry(key).or_default().insert(record, self.sort.as_ref());
        Ok(())
    }

    fn bulk_add(&mut self, records: &[Arc<T>]) -> Result<()> {
        if B::BULK_BUILD && self.buckets.is_empty() {
            // build all buckets first, sort each exactly once
            for record in records {
                let key = self.key(record)?;
                self.buckets.entry(key).or_default().append(record.clone());
            }
            for bucket in self.buckets.values_mut() {
                bucket.finish(self.sort.as_ref());
            }
            return Ok(());
        }
        for record in records {
            self.add(record.clone())?;
        }
        Ok(())
    }

    fn delete(&mut self, record: &T) -> Result<()> {
        let key = self.key(record)?;
        let bucket = self
            .buckets
            .get_mut(&key)
            .ok_or_else(|| Error::integrity(format!("delete from unpopulated bucket {key:?}")))?;
        if !bucket.remove(record) {
            return Err(Error::integrity(format!("delete of record absent from bucket {key:?}")));
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.buckets.clear();
    }

    fn lookup(&self, params: &Parameters) -> Result<Lookup<T>> {
        if !params.matches(&self.key_attributes) {
            return Ok(Lookup::NotSupported);
        }
        let mut key = Vec::with_capacity(self.key_attributes.len());
        for name in &self.key_attributes {
            match params.get(name) {
                Some(value) => key.push(value.clone()),
                None => return Ok(Lookup::NotSupported),
            }
        }

        match self.buckets.get(&key) {
            Some(bucket) if !bucket.is_empty() => Ok(Lookup::Found(bucket.records().to_vec())),
            _ if self.authoritative(params) => Ok(Lookup::DoesNotExist),
            _ => Ok(Lookup::Unknown),
        }
    }

    fn authoritative(&self, params: &Parameters) -> bool {
        self.authoritative && params.matches(&self.key_attributes)
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

    use super::*;
    use crate::test_utils::TestRecord;

    fn record(id: i64, category: &str, rank: i64) -> Arc<TestRecord> {
        let record = TestRecord::new([("category", Value::from(category)), ("rank", Value::Int(rank))]);
        record.set_identity(Value::Int(id));
        Arc::new(record)
    }

    fn rank_sort(record: &TestRecord) -> Value {
        record.attribute("rank").unwrap()
    }

    #[test]
    fn test_add_then_lookup_found() {
        let mut index = SortedSetIndex::new(["category"]);
        let r = record(1, "x", 0);
        index.add(r.clone()).unwrap();

        let lookup = index.lookup(&Parameters::new().with("category", "x")).unwrap();
        let records = lookup.records().unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].same_entity(&r));
    }

    #[test]
    fn test_category_scenario() {
        let mut index = ListIndex::new(["category"]);
        index.add(record(1, "x", 0)).unwrap();
        index.add(record(2, "x", 0)).unwrap();
        index.add(record(3, "y", 0)).unwrap();

        let found = index.lookup(&Parameters::new().with("category", "x")).unwrap();
        assert_eq!(found.records().unwrap().len(), 2);

        let miss = index.lookup(&Parameters::new().with("category", "z")).unwrap();
        assert!(matches!(miss, Lookup::Unknown));

        let unsupported = index
            .lookup(&Parameters::new().with("category", "x").with("other", "y"))
            .unwrap();
        assert!(matches!(unsupported, Lookup::NotSupported));
    }

    #[test]
    fn test_authoritative_absence() {
        let mut index = ListIndex::new(["category"]).with_authoritative(true);
        index.add(record(1, "x", 0)).unwrap();

        let miss = index.lookup(&Parameters::new().with("category", "z")).unwrap();
        assert!(matches!(miss, Lookup::DoesNotExist));
        // authority only extends to supported parameter sets
        assert!(!index.authoritative(&Parameters::new().with("other", "z")));
    }

    #[test]
    fn test_duplicate_add_replaces_instance() {
        let mut index = SortedSetIndex::new(["category"]);
        let stale = record(7, "x", 1);
        let fresh = TestRecord::new([("category", Value::from("x")), ("rank", Value::Int(99))]);
        fresh.set_identity(Value::Int(7));
        let fresh = Arc::new(fresh);

        index.add(stale).unwrap();
        index.add(fresh.clone()).unwrap();

        let lookup = index.lookup(&Parameters::new().with("category", "x")).unwrap();
        let records = lookup.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].attribute("rank"), Some(Value::Int(99)));
    }

    #[test]
    fn test_sorted_set_reorders_on_readd() {
        let mut index = SortedSetIndex::new(["category"]).with_sort_key(rank_sort);
        index.add(record(1, "x", 10)).unwrap();
        index.add(record(2, "x", 20)).unwrap();

        // entity 1 moves past entity 2 once its rank changes
        index.add(record(1, "x", 30)).unwrap();
        let lookup = index.lookup(&Parameters::new().with("category", "x")).unwrap();
        let ids = lookup
            .records()
            .unwrap()
            .iter()
            .map(|r| r.identity())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![Value::Int(2), Value::Int(1)]);
    }

    #[test]
    fn test_delete_without_add_is_integrity_error() {
        let mut index: ListIndex<TestRecord> = ListIndex::new(["category"]);
        let err = index.delete(&record(1, "x", 0)).unwrap_err();
        assert!(matches!(err, Error::Integrity(_)));
    }

    #[test]
    fn test_sorted_set_delete_absent_record_is_integrity_error() {
        let mut index = SortedSetIndex::new(["category"]);
        index.add(record(1, "x", 0)).unwrap();
        let err = index.delete(&record(2, "x", 0)).unwrap_err();
        assert!(matches!(err, Error::Integrity(_)));
    }

    #[test]
    fn test_add_then_delete_lookup_states() {
        let r = record(1, "x", 0);

        let mut plain = ListIndex::new(["category"]);
        plain.add(r.clone()).unwrap();
        plain.delete(&r).unwrap();
        let lookup = plain.lookup(&Parameters::new().with("category", "x")).unwrap();
        assert!(matches!(lookup, Lookup::Unknown));

        let mut authoritative = ListIndex::new(["category"]).with_authoritative(true);
        authoritative.add(r.clone()).unwrap();
        authoritative.delete(&r).unwrap();
        let lookup = authoritative.lookup(&Parameters::new().with("category", "x")).unwrap();
        assert!(matches!(lookup, Lookup::DoesNotExist));
    }

    #[test]
    fn test_bulk_add_fast_and_slow_paths_converge() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut records = (0..100).map(|i| record(i, "x", 1000 - i)).collect_vec();
        records.shuffle(&mut rng);

        let mut fast = ListIndex::new(["category"]).with_sort_key(rank_sort);
        fast.bulk_add(&records).unwrap();

        let mut slow = ListIndex::new(["category"]).with_sort_key(rank_sort);
        slow.add(record(999, "warm", 0)).unwrap(); // non-empty index forces the incremental path
        slow.bulk_add(&records).unwrap();

        let params = Parameters::new().with("category", "x");
        let fast_ids = fast
            .lookup(&params)
            .unwrap()
            .records()
            .unwrap()
            .iter()
            .map(|r| r.identity())
            .collect_vec();
        let slow_ids = slow
            .lookup(&params)
            .unwrap()
            .records()
            .unwrap()
            .iter()
            .map(|r| r.identity())
            .collect_vec();
        assert_eq!(fast_ids, slow_ids);
        assert_eq!(fast_ids.len(), 100);
        // ascending rank means descending identity here
        assert_eq!(fast_ids[0], Value::Int(99));
    }

    #[test]
    fn test_insertion_order_without_sort_key() {
        let mut index = ListIndex::new(["category"]);
        for i in 0..5 {
            index.add(record(i, "x", 0)).unwrap();
        }
        let lookup = index.lookup(&Parameters::new().with("category", "x")).unwrap();
        let ids = lookup
            .records()
            .unwrap()
            .iter()
            .map(|r| r.identity())
            .collect_vec();
        assert_eq!(ids, (0..5).map(Value::Int).collect_vec());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut index = ListIndex::new(["category"]);
        index.add(record(1, "x", 0)).unwrap();
        index.clear();
        assert!(index.is_empty());
        index.clear();
        assert!(index.is_empty());
    }

    #[test]
    fn test_get_and_first() {
        let mut index = ListIndex::new(["category"]);
        index.add(record(1, "x", 0)).unwrap();
        index.add(record(2, "x", 0)).unwrap();

        let params = Parameters::new().with("category", "x");
        let first = index.first(&params).unwrap().unwrap();
        assert_eq!(first.identity(), Value::Int(1));

        let err = index.get(&params).unwrap_err();
        assert!(matches!(err, Error::Ambiguous { found: 2 }));

        assert!(index.get(&Parameters::new().with("category", "z")).unwrap().is_none());
    }
}
