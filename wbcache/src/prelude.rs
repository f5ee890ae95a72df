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

//! Re-exports of the public surface.

#[cfg(any(test, feature = "test_utils"))]
pub use crate::test_utils::{MemStore, StoreOp, TestRecord};
pub use crate::{
    cache::{CachePolicy, WriteBackCache, WriteBackCacheBuilder},
    changelog::{Change, ChangeKind, ChangeLog},
    entity::{Entity, SaveOptions},
    error::{Error, Result},
    index::{
        composite::CompositeIndex,
        keyed::{Bucket, KeyedIndex, ListBucket, ListIndex, SortKeyFn, SortedSetBucket, SortedSetIndex},
        store::{RestrictFn, StoreLookup, StoreReadWrite},
        Lookup, LookupIndex,
    },
    sequence::Sequence,
    store::BackingStore,
    value::{Parameters, TransientId, Value},
};
