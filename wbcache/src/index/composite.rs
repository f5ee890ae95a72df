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
    entity::Entity,
    error::Result,
    index::{Lookup, LookupIndex},
    value::Parameters,
};

/// Fans a single logical record or query out across several member indexes.
///
/// Mutations broadcast to every member. Broadcasting is not transactional:
/// the caller sees the first failure and later members are left untouched,
/// so a failed broadcast can leave members inconsistent. This is a caller
/// responsibility, the same way the aliasing contract is.
///
/// Lookups try the members in configured order; the first certain answer
/// (`Found` or `DoesNotExist`) wins. Different members cover different
/// attribute subsets, so whichever member can be certain for the given
/// parameters is the right one to trust, regardless of position. When no
/// member is certain the best uncertain outcome is returned.
pub struct CompositeIndex<T> {
    members: Vec<Box<dyn LookupIndex<T>>>,
}

impl<T> Debug for CompositeIndex<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeIndex")
            .field("members", &self.members.len())
            .finish()
    }
}

impl<T> Default for CompositeIndex<T> {
    fn default() -> Self {
        Self { members: Vec::new() }
    }
}

impl<T> CompositeIndex<T>
where
    T: Entity,
{
    /// Create a composite with no members.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a member index. Lookup order is configuration order.
    pub fn push(&mut self, member: impl LookupIndex<T> + 'static) {
        self.members.push(Box::new(member));
    }

    /// Number of member indexes.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the composite has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl<T> LookupIndex<T> for CompositeIndex<T>
where
    T: Entity,
{
    fn add(&mut self, record: Arc<T>) -> Result<()> {
        for member in &mut self.members {
            member.add(record.clone())?;
        }
        Ok(())
    }

    fn bulk_add(&mut self, records: &[Arc<T>]) -> Result<()> {
        for member in &mut self.members {
            member.bulk_add(records)?;
        }
        Ok(())
    }

    fn delete(&mut self, record: &T) -> Result<()> {
        for member in &mut self.members {
            member.delete(record)?;
        }
        Ok(())
    }

    fn clear(&mut self) {
        for member in &mut self.members {
            member.clear();
        }
    }

    fn lookup(&self, params: &Parameters) -> Result<Lookup<T>> {
        let mut best = Lookup::NotSupported;
        for member in &self.members {
            let outcome = member.lookup(params)?;
            if outcome.is_certain() {
                return Ok(outcome);
            }
            if outcome.rank() > best.rank() {
                best = outcome;
            }
        }
        Ok(best)
    }

    fn authoritative(&self, params: &Parameters) -> bool {
        self.members.iter().any(|member| member.authoritative(params))
    }
}
