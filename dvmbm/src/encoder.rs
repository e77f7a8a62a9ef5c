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
use std::sync::Arc;

use dvmbm_hw::layout::ClusterCore;
use dvmbm_hw::layout::DieClusters;
use dvmbm_hw::layout::ScopeFields;
use dvmbm_shared::types::CoreSet;
use dvmbm_topology::CoreLocation;
use dvmbm_topology::PlatformTopology;

/// Distinct dies touched by a set of cores, in the order they were first seen.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DieAffinitySet {
    die_ids: Vec<u64>,
    overflowed: bool,
}

impl DieAffinitySet {
    /// Collects at most `capacity` dies, marks the set as overflowed if there are more.
    pub fn collect<'location>(
        locations: impl IntoIterator<Item = &'location CoreLocation>,
        capacity: usize,
    ) -> Self {
        let mut dies = Self::default();

        for location in locations {
            if dies.die_ids.contains(&location.die_id) {
                continue;
            }
            if dies.die_ids.len() >= capacity {
                dies.overflowed = true;
                break;
            }
            dies.die_ids.push(location.die_id);
        }

        dies
    }

    pub fn die_ids(&self) -> &[u64] {
        &self.die_ids
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedScope {
    fields: ScopeFields,
    value: u64,
}

impl EncodedScope {
    pub fn fields(&self) -> &ScopeFields {
        &self.fields
    }

    /// Bit-exact value of the broadcast-scope register.
    pub fn value(&self) -> u64 {
        self.value
    }
}

/// Turns a set of occupied cores into the broadcast-scope register value.
#[derive(Clone, Debug)]
pub struct ScopeEncoder {
    topology: Arc<PlatformTopology>,
}

impl ScopeEncoder {
    pub fn new(topology: Arc<PlatformTopology>) -> Self {
        Self { topology }
    }

    pub fn topology(&self) -> &PlatformTopology {
        &self.topology
    }

    pub fn encode(&self, occupied_cores: &CoreSet) -> EncodedScope {
        let fields = self.scope_fields(occupied_cores);
        let value = self.topology.layout().scope.serialize(&fields);

        EncodedScope { fields, value }
    }

    fn scope_fields(&self, occupied_cores: &CoreSet) -> ScopeFields {
        let mut locations = Vec::with_capacity(occupied_cores.len());
        for core_id in occupied_cores.iter() {
            match self.topology.location(core_id) {
                Some(location) => locations.push(*location),
                None => {
                    tracing::warn!("core {core_id} isn't a part of the platform topology, broadcasting to all dies");
                    return ScopeFields::AllDies;
                }
            }
        }

        let dies = DieAffinitySet::collect(&locations, self.topology.layout().max_tracked_dies);
        if dies.overflowed() {
            return ScopeFields::AllDies;
        }

        let fields = match *dies.die_ids() {
            [] => ScopeFields::Empty,
            [die_id] => self.one_die(die_id, &locations),
            [first, second] => self.two_dies(first, second, &locations),
            _ => ScopeFields::AllDies,
        };

        if !self.topology.layout().scope.fits(&fields) {
            tracing::warn!("scope {fields:?} doesn't fit the register, broadcasting to all dies");
            return ScopeFields::AllDies;
        }

        fields
    }

    fn one_die(&self, die_id: u64, locations: &[CoreLocation]) -> ScopeFields {
        let cores = locations
            .iter()
            .map(|location| ClusterCore::new(self.topology.physical_cluster(location), location.core))
            .collect::<BTreeSet<_>>();

        ScopeFields::OneDie { die_id, cores }
    }

    fn two_dies(&self, first_id: u64, second_id: u64, locations: &[CoreLocation]) -> ScopeFields {
        let mut first = DieClusters::new(first_id);
        let mut second = DieClusters::new(second_id);

        for location in locations {
            let cluster = self.topology.physical_cluster(location);
            if location.die_id == first_id {
                first.clusters.insert(cluster);
            } else {
                second.clusters.insert(cluster);
            }
        }

        ScopeFields::TwoDies { first, second }
    }
}
