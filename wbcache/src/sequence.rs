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

use std::sync::atomic::{AtomicU64, Ordering};

/// A strictly increasing counter used to totally order changes.
///
/// [`next_value`] is safe to call from any number of concurrent callers; no
/// two calls ever return the same value and the first returned value is 1.
/// The values only establish order, they need not be contiguous per caller.
///
/// The counter is the only internally synchronized piece of the cache; share
/// it via `Arc` and inject it into every component that needs ordering.
///
/// [`next_value`]: Sequence::next_value
#[derive(Debug, Default)]
pub struct Sequence {
    value: AtomicU64,
}

impl Sequence {
    /// Create a sequence starting at 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the next value of the sequence.
    pub fn next_value(&self) -> u64 {
        self.value.fetch_add(1, Ordering::Relaxed) + 1
    }
}
