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

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    entity::{Entity, SaveOptions},
    error::{Error, Result},
    index::{keyed::ListIndex, Lookup, LookupIndex},
    store::BackingStore,
    value::{Parameters, Value},
};

/// What a change does to its record when applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Push the record's current field state to the backing store.
    Save,
    /// Remove the record from the backing store.
    Delete,
}

/// One recorded mutation of a record, stamped with a [`Sequence`] counter.
///
/// Immutable once created; consumed at flush. Applying a `Save` replaces a
/// transient identity with "unset" first, so the store assigns the real
/// value. Applying a `Delete` to a record that never received a real
/// identity is a no-op: the record was created and deleted before ever
/// reaching the store.
///
/// [`Sequence`]: crate::sequence::Sequence
pub struct Change<T> {
    record: Arc<T>,
    kind: ChangeKind,
    counter: u64,
    options: SaveOptions,
}

impl<T> Debug for Change<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Change")
            .field("kind", &self.kind)
            .field("counter", &self.counter)
            .finish()
    }
}

impl<T> Change<T>
where
    T: Entity,
{
    /// Record a save of the record's state as of flush time.
    pub fn save(record: Arc<T>, counter: u64, options: SaveOptions) -> Self {
        Self {
            record,
            kind: ChangeKind::Save,
            counter,
            options,
        }
    }

    /// Record a deletion.
    pub fn delete(record: Arc<T>, counter: u64) -> Self {
        Self {
            record,
            kind: ChangeKind::Delete,
            counter,
            options: SaveOptions::default(),
        }
    }

    /// What the change does when applied.
    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    /// The ordering counter assigned when the change was recorded.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// The record the change belongs to.
    pub fn record(&self) -> &Arc<T> {
        &self.record
    }

    /// Apply the change to the backing store.
    pub(crate) fn apply<S>(&self, store: &S) -> Result<()>
    where
        S: BackingStore<T>,
    {
        match self.kind {
            ChangeKind::Save => {
                if self.record.identity().is_transient() {
                    // the store assigns the real identity on save
                    self.record.set_identity(Value::Null);
                }
                tracing::trace!("[changelog]: apply save, counter {}", self.counter);
                store.save(&self.record, &self.options)
            }
            ChangeKind::Delete => {
                if !self.record.identity().is_persisted() {
                    // created and deleted before it was ever written out
                    tracing::trace!("[changelog]: skip delete of unpersisted record, counter {}", self.counter);
                    Ok(())
                } else {
                    tracing::trace!("[changelog]: apply delete, counter {}", self.counter);
                    store.delete(&self.record)
                }
            }
        }
    }
}

impl<T> Entity for Change<T>
where
    T: Entity,
{
    fn identity(&self) -> Value {
        self.record.identity()
    }

    fn set_identity(&self, identity: Value) {
        self.record.set_identity(identity)
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "identity" => Some(self.record.identity()),
            "counter" => Some(Value::Int(self.counter as i64)),
            _ => None,
        }
    }

    /// Every change is its own entity: history accumulates instead of
    /// replacing earlier changes for the same record.
    fn same_entity(&self, other: &Self) -> bool {
        self.counter == other.counter
    }
}

/// An ordered log of record mutations, keyed by record identity.
///
/// A [`ListIndex`] specialization: one bucket per identity, each bucket in
/// counter order. Entries are never deleted directly; deleting a record
/// means appending a [`ChangeKind::Delete`] change, never removing history.
pub struct ChangeLog<T>
where
    T: Entity,
{
    index: ListIndex<Change<T>>,
}

impl<T> Debug for ChangeLog<T>
where
    T: Entity,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeLog").field("identities", &self.index.len()).finish()
    }
}

impl<T> Default for ChangeLog<T>
where
    T: Entity,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ChangeLog<T>
where
    T: Entity,
{
    /// Create an empty change log.
    pub fn new() -> Self {
        Self {
            index: ListIndex::new(["identity"]).with_sort_key(|change: &Change<T>| Value::Int(change.counter() as i64)),
        }
    }

    /// Number of identities with pending changes.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether no changes are pending.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Apply the latest state of every identity to the backing store, in
    /// global counter order.
    ///
    /// Only the most recent change per identity is effective: earlier states
    /// were superseded in memory before ever reaching the store. Applying in
    /// the original mutation order preserves ordering-sensitive store
    /// constraints that the original sequence of operations satisfied.
    ///
    /// An identity's pending entry is dropped from the log once its change
    /// applies; the first store failure aborts the pass, leaving the failed
    /// and unapplied entries in place so a retried flush re-attempts exactly
    /// the not-yet-applied state.
    pub fn apply_all<S>(&mut self, store: &S) -> Result<()>
    where
        S: BackingStore<T>,
    {
        let resolved = self
            .index
            .bucket_keys()
            .into_iter()
            .filter_map(|key| {
                let change = self.index.bucket(&key)?.last()?.clone();
                Some((key, change))
            })
            .sorted_by_key(|(_, change)| change.counter())
            .collect_vec();

        tracing::debug!("[changelog]: applying {} resolved changes", resolved.len());

        for (key, change) in resolved {
            change.apply(store)?;
            self.index.remove_bucket(&key);
        }
        Ok(())
    }
}

impl<T> LookupIndex<Change<T>> for ChangeLog<T>
where
    T: Entity,
{
    fn add(&mut self, change: Arc<Change<T>>) -> Result<()> {
        self.index.add(change)
    }

    /// Always fails: history is never removed directly. Record a
    /// [`ChangeKind::Delete`] change instead.
    fn delete(&mut self, _change: &Change<T>) -> Result<()> {
        Err(Error::ChangeLogDelete)
    }

    fn clear(&mut self) {
        self.index.clear();
    }

    fn lookup(&self, params: &Parameters) -> Result<Lookup<Change<T>>> {
        self.index.lookup(params)
    }
}
