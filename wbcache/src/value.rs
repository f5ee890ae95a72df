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

use std::{
    fmt::Display,
    sync::atomic::{AtomicU64, Ordering},
};

use serde::{Deserialize, Serialize};

/// A unique, hashable token standing in for a not-yet-assigned identity.
///
/// Records without a store-assigned identity receive a `TransientId` when
/// added to the cache, so they can serve as bucket and sort keys before
/// being persisted. Equality is allocation identity: a `TransientId` is
/// equal only to copies of itself, never to another allocation, even one
/// "logically" representing the same future record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransientId(u64);

impl TransientId {
    /// Allocate a fresh, process-wide unique token.
    pub fn new() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for TransientId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TransientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "transient#{}", self.0)
    }
}

/// A dynamically typed attribute value.
///
/// `Value` is what index keys, lookup parameters and record identities are
/// made of. It is totally ordered and hashable so it can serve as both a
/// bucket key and a sort key.
///
/// As an identity, `Null` means "not yet assigned", [`Transient`] is a cache
/// placeholder, and any other variant is a store-assigned value.
///
/// [`Transient`]: Value::Transient
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Value {
    /// Absent / unset value.
    Null,
    /// Boolean attribute.
    Bool(bool),
    /// Integer attribute.
    Int(i64),
    /// Text attribute.
    Text(String),
    /// Identity placeholder, see [`TransientId`].
    Transient(TransientId),
}

impl Value {
    /// Whether this identity has not been assigned at all.
    pub fn is_unset(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this identity is a cache-assigned placeholder.
    pub fn is_transient(&self) -> bool {
        matches!(self, Value::Transient(_))
    }

    /// Whether this identity was assigned by the backing store.
    pub fn is_persisted(&self) -> bool {
        !self.is_unset() && !self.is_transient()
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v}"),
            Value::Transient(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<TransientId> for Value {
    fn from(v: TransientId) -> Self {
        Value::Transient(v)
    }
}

/// An attribute-name → value mapping supplied to lookups.
///
/// An index answers a lookup only when the parameter names are exactly the
/// set of attributes the index is keyed on; matching is exact-set equality,
/// not subset. Parameter order does not matter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters(Vec<(&'static str, Value)>);

impl Parameters {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter. Replaces an earlier parameter with the same name.
    pub fn with(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        self.0.retain(|(n, _)| *n != name);
        self.0.push((name, value.into()));
        self
    }

    /// Get a parameter value by attribute name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the parameter set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the parameters in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.0.iter().map(|(n, v)| (*n, v))
    }

    /// Whether the parameter names are exactly `attributes`, in any order.
    pub fn matches(&self, attributes: &[&'static str]) -> bool {
        self.0.len() == attributes.len() && attributes.iter().all(|a| self.get(a).is_some())
    }
}
