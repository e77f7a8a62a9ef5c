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

use dvmbm_hw::layout::AffinityLayout;
use dvmbm_shared::types::AffinityId;

/// Composite key of a die: socket id and die index within the socket.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DieKey {
    pub socket: u32,
    pub die: u32,
}

/// Hierarchical address of a core.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CoreLocation {
    pub socket: u32,
    /// Die index within the socket, 0 for the first die slot and 1 for the second one.
    pub die: u32,
    pub cluster: u32,
    pub core: u32,
    /// Raw die-level affinity value (socket and die bits), identifies a die in the scope register.
    pub die_id: u64,
}

impl DieKey {
    pub fn new(socket: u32, die: u32) -> Self {
        Self { socket, die }
    }
}

impl std::fmt::Display for DieKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "socket {} die {}", self.socket, self.die)
    }
}

impl CoreLocation {
    pub fn die_key(&self) -> DieKey {
        DieKey::new(self.socket, self.die)
    }
}

/// Splits raw affinity values into socket, die, cluster and core.
#[derive(Copy, Clone, Debug)]
pub struct TopologyResolver {
    layout: AffinityLayout,
}

impl TopologyResolver {
    pub fn new(layout: AffinityLayout) -> Self {
        Self { layout }
    }

    pub fn die_level(&self, affinity_id: AffinityId) -> u64 {
        (affinity_id.raw() >> self.layout.die_level_shift) & self.layout.level_mask
    }

    pub fn socket(&self, affinity_id: AffinityId) -> u32 {
        let die_level = self.die_level(affinity_id);
        ((die_level & self.layout.socket_mask) >> self.layout.socket_shift) as u32
    }

    pub fn raw_die(&self, affinity_id: AffinityId) -> u64 {
        let die_level = self.die_level(affinity_id);
        (die_level & self.layout.die_mask) >> self.layout.die_shift
    }

    /// Maps the raw die id onto the first or the second die slot of a socket.
    pub fn die_index(&self, affinity_id: AffinityId) -> u32 {
        if self.raw_die(affinity_id) == self.layout.first_die_id {
            0
        } else {
            1
        }
    }

    pub fn cluster(&self, affinity_id: AffinityId) -> u32 {
        ((affinity_id.raw() >> self.layout.cluster_level_shift) & self.layout.level_mask) as u32
    }

    pub fn core(&self, affinity_id: AffinityId) -> u32 {
        ((affinity_id.raw() >> self.layout.core_level_shift) & self.layout.level_mask) as u32
    }

    pub fn resolve(&self, affinity_id: AffinityId) -> CoreLocation {
        CoreLocation {
            socket: self.socket(affinity_id),
            die: self.die_index(affinity_id),
            cluster: self.cluster(affinity_id),
            core: self.core(affinity_id),
            die_id: self.die_level(affinity_id),
        }
    }
}

/// Applies the extractor to every value and returns the number of distinct results with them.
pub fn enumerate_unique<V, T>(
    values: impl IntoIterator<Item = V>,
    extractor: impl Fn(V) -> T,
) -> (usize, BTreeSet<T>)
where
    T: Ord,
{
    let unique = values.into_iter().map(extractor).collect::<BTreeSet<_>>();
    (unique.len(), unique)
}
