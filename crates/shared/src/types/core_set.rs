/*
 * Copyright 2024 Fluence Labs Limited
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */


use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use super::ProcessorId;

/// An ordered set of physical cores. Iteration is ascending by core id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoreSet(BTreeSet<ProcessorId>);

impl CoreSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    pub fn single(core_id: ProcessorId) -> Self {
        Self(BTreeSet::from([core_id]))
    }

    /// Returns true if the core wasn't present before.
    pub fn insert(&mut self, core_id: ProcessorId) -> bool {
        self.0.insert(core_id)
    }

    pub fn extend_from(&mut self, other: &CoreSet) {
        self.0.extend(other.0.iter().copied());
    }

    /// Replaces the content of this set with the content of the other one,
    /// reusing the allocation when possible.
    pub fn copy_from(&mut self, other: &CoreSet) {
        self.0.clone_from(&other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = ProcessorId> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<ProcessorId> for CoreSet {
    fn from_iter<T: IntoIterator<Item = ProcessorId>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<ProcessorId> for CoreSet {
    fn extend<T: IntoIterator<Item = ProcessorId>>(&mut self, iter: T) {
        self.0.extend(iter)
    }
}

impl<const N: usize> From<[ProcessorId; N]> for CoreSet {
    fn from(value: [ProcessorId; N]) -> Self {
        Self(BTreeSet::from(value))
    }
}

impl std::fmt::Display for CoreSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (position, core_id) in self.0.iter().enumerate() {
            if position > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{core_id}")?;
        }
        write!(f, "}}")
    }
}
