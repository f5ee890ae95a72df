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

//! `wbcache` is an in-process write-back cache for persistent records.
//!
//! The intended usage pattern:
//!
//! - bulk-load all or most of the relevant records into memory,
//! - perform calculations and mutations in memory, querying through one or
//!   more attribute indexes,
//! - write all buffered changes back to the backing store at the end, with a
//!   single explicit flush.
//!
//! Mutations routed through [`WriteBackCache`] are indexed in memory and
//! appended to a [`ChangeLog`]; the flush applies the latest state of each
//! record identity to the [`BackingStore`], in the global order the
//! mutations were made, then clears the log. Records that do not yet have a
//! store-assigned identity are given a [`TransientId`] placeholder so they
//! stay usable as index keys until the store assigns the real value.
//!
//! The cache is a best-effort speed layer, not a consistency layer: it
//! provides no transactions, no durability and no cross-process guarantees,
//! and the backing store remains the source of truth.
//!
//! # Aliasing
//!
//! Records are shared by reference between the caller and the cache's
//! buckets. Attributes that feed an index key must not be mutated while the
//! record is indexed; delete, mutate, then re-add instead.
//!
//! [`ChangeLog`]: crate::changelog::ChangeLog
//! [`WriteBackCache`]: crate::cache::WriteBackCache
//! [`BackingStore`]: crate::store::BackingStore
//! [`TransientId`]: crate::value::TransientId

pub mod cache;
pub mod changelog;
pub mod entity;
pub mod error;
pub mod index;
pub mod sequence;
pub mod store;
pub mod value;

pub mod prelude;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use crate::prelude::*;
