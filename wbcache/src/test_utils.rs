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

//! Utilities for testing.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};

use crate::{
    entity::{Entity, SaveOptions},
    error::{Error, Result},
    store::BackingStore,
    value::{Parameters, Value},
};

/// A record with dynamic attributes and an interior-mutable identity.
#[derive(Debug)]
pub struct TestRecord {
    identity: RwLock<Value>,
    attributes: RwLock<HashMap<&'static str, Value>>,
}

impl Default for TestRecord {
    fn default() -> Self {
        Self::new([])
    }
}

impl TestRecord {
    /// Create a record with the given attributes and an unset identity.
    pub fn new(attributes: impl IntoIterator<Item = (&'static str, Value)>) -> Self {
        Self {
            identity: RwLock::new(Value::Null),
            attributes: RwLock::new(attributes.into_iter().collect()),
        }
    }

    /// Set an attribute value.
    ///
    /// Mind the aliasing contract: do not call this for an attribute that
    /// feeds an index key while the record is indexed.
    pub fn set_attribute(&self, name: &'static str, value: Value) {
        self.attributes.write().insert(name, value);
    }
}

impl Entity for TestRecord {
    fn identity(&self) -> Value {
        self.identity.read().clone()
    }

    fn set_identity(&self, identity: Value) {
        *self.identity.write() = identity;
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        if name == "identity" {
            return Some(self.identity());
        }
        self.attributes.read().get(name).cloned()
    }
}

/// A backing-store call, as observed by [`MemStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// A save of the record with this identity (as assigned by the store).
    Save(Value),
    /// A delete of the record with this identity.
    Delete(Value),
}

#[derive(Debug, Default)]
struct MemStoreState {
    rows: Vec<Arc<TestRecord>>,
    ops: Vec<StoreOp>,
    next_id: i64,
    fail_saves: bool,
    poisoned: Option<Value>,
}

/// An in-memory backing store that records the order of applied operations
/// and can be made to fail saves, for exercising flush error paths.
///
/// Assigns `Value::Int` identities. `SaveOptions` are accepted but have no
/// effect: rows are shared by reference, so field state is always current.
#[derive(Debug, Default)]
pub struct MemStore {
    state: Mutex<MemStoreState>,
}

impl MemStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations applied so far, in order.
    pub fn ops(&self) -> Vec<StoreOp> {
        self.state.lock().ops.clone()
    }

    /// Drain the recorded operations.
    pub fn take_ops(&self) -> Vec<StoreOp> {
        std::mem::take(&mut self.state.lock().ops)
    }

    /// Make every save fail until turned off again.
    pub fn fail_saves(&self, fail: bool) {
        self.state.lock().fail_saves = fail;
    }

    /// Make saves of the record with this identity fail.
    pub fn poison_save(&self, identity: Value) {
        self.state.lock().poisoned = Some(identity);
    }

    /// Stop failing poisoned saves.
    pub fn clear_poison(&self) {
        self.state.lock().poisoned = None;
    }
}

impl BackingStore<TestRecord> for MemStore {
    fn save(&self, record: &Arc<TestRecord>, _options: &SaveOptions) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_saves || state.poisoned.as_ref() == Some(&record.identity()) {
            return Err(Error::store(anyhow::anyhow!("injected save failure")));
        }

        if record.identity().is_unset() {
            state.next_id += 1;
            record.set_identity(Value::Int(state.next_id));
        }
        let identity = record.identity();
        if !state.rows.iter().any(|row| row.same_entity(record)) {
            state.rows.push(record.clone());
        }
        state.ops.push(StoreOp::Save(identity));
        Ok(())
    }

    fn delete(&self, record: &TestRecord) -> Result<()> {
        let mut state = self.state.lock();
        let before = state.rows.len();
        state.rows.retain(|row| !row.same_entity(record));
        if state.rows.len() == before {
            return Err(Error::store(anyhow::anyhow!(
                "delete of missing row {}",
                record.identity()
            )));
        }
        state.ops.push(StoreOp::Delete(record.identity()));
        Ok(())
    }

    fn filter(&self, params: &Parameters) -> Result<Vec<Arc<TestRecord>>> {
        let state = self.state.lock();
        Ok(state
            .rows
            .iter()
            .filter(|row| params.iter().all(|(name, value)| row.attribute(name).as_ref() == Some(value)))
            .cloned()
            .collect())
    }
}
