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


use std::collections::BTreeMap;

use nonempty::NonEmpty;

use dvmbm_hw::GatingProbe;
use dvmbm_hw::PlatformLayout;
use dvmbm_hw::TopologyProbe;
use dvmbm_shared::types::ProcessorId;

use crate::enumerate_unique;
use crate::ClusterPermutation;
use crate::CoreLocation;
use crate::DieKey;
use crate::PermutationTable;
use crate::TopologyError;
use crate::TopologyResolver;
use crate::TopologyResult;

/// Topology of the running machine, built once at platform init and immutable afterwards.
#[derive(Clone, Debug)]
pub struct PlatformTopology {
    layout: PlatformLayout,
    cores: BTreeMap<ProcessorId, CoreLocation>,
    socket_count: u32,
    die_count: u32,
    permutations: PermutationTable,
}

impl PlatformTopology {
    pub fn probe(
        layout: PlatformLayout,
        topology_probe: &dyn TopologyProbe,
        gating_probe: &dyn GatingProbe,
    ) -> TopologyResult<Self> {
        let possible_cores = NonEmpty::from_vec(topology_probe.possible_cores())
            .ok_or(TopologyError::NoCores)?;
        let resolver = TopologyResolver::new(layout.affinity);

        let affinity_ids = possible_cores
            .iter()
            .map(|(_, affinity_id)| *affinity_id)
            .collect::<Vec<_>>();
        let (socket_count, _) = enumerate_unique(affinity_ids.iter().copied(), |affinity_id| {
            resolver.socket(affinity_id)
        });
        let (die_count, _) = enumerate_unique(affinity_ids.iter().copied(), |affinity_id| {
            resolver.raw_die(affinity_id)
        });
        let socket_count = socket_count as u32;
        let die_count = die_count as u32;

        if socket_count > layout.max_sockets {
            return Err(TopologyError::too_many_sockets(
                socket_count,
                layout.max_sockets,
            ));
        }
        if die_count > layout.max_dies_per_socket {
            return Err(TopologyError::too_many_dies(
                die_count,
                layout.max_dies_per_socket,
            ));
        }

        let mut cores = BTreeMap::new();
        for (core_id, affinity_id) in possible_cores.iter() {
            let location = resolver.resolve(*affinity_id);
            if cores.insert(*core_id, location).is_some() {
                return Err(TopologyError::duplicate_core(*core_id));
            }
        }

        let permutations = Self::probe_permutations(&layout, socket_count, die_count, gating_probe)?;

        tracing::info!(
            "platform {}: {} cores, {socket_count} sockets with {die_count} dies each",
            layout.name,
            cores.len()
        );

        let topology = Self {
            layout,
            cores,
            socket_count,
            die_count,
            permutations,
        };
        Ok(topology)
    }

    fn probe_permutations(
        layout: &PlatformLayout,
        socket_count: u32,
        die_count: u32,
        gating_probe: &dyn GatingProbe,
    ) -> TopologyResult<PermutationTable> {
        let mut permutations = PermutationTable::new();

        for socket in 0..socket_count {
            for die in 0..die_count {
                let gating_mask = gating_probe
                    .read_gating_config(socket, die)
                    .map_err(|error| TopologyError::gating_probe_failed(socket, die, error))?;

                let permutation =
                    ClusterPermutation::from_gating_mask(gating_mask, layout.max_clusters_per_die);
                tracing::debug!(
                    "socket {socket} die {die}: gating mask {gating_mask:#x}, cluster permutation {permutation}"
                );

                permutations.insert(DieKey::new(socket, die), permutation);
            }
        }

        Ok(permutations)
    }

    pub fn layout(&self) -> &PlatformLayout {
        &self.layout
    }

    pub fn socket_count(&self) -> u32 {
        self.socket_count
    }

    pub fn die_count(&self) -> u32 {
        self.die_count
    }

    pub fn location(&self, core_id: ProcessorId) -> Option<&CoreLocation> {
        self.cores.get(&core_id)
    }

    pub fn cores(&self) -> impl Iterator<Item = ProcessorId> + '_ {
        self.cores.keys().copied()
    }

    pub fn permutations(&self) -> &PermutationTable {
        &self.permutations
    }

    /// Physical (post-permutation) cluster of a core.
    pub fn physical_cluster(&self, location: &CoreLocation) -> u32 {
        self.permutations
            .physical_cluster(location.die_key(), location.cluster)
    }
}

#[cfg(test)]
mod tests {
    use maplit::btreemap;

    use dvmbm_hw::HwError;
    use dvmbm_hw::StaticGatingProbe;
    use dvmbm_hw::StaticTopologyProbe;
    use dvmbm_hw::HIP09_LAYOUT;
    use dvmbm_shared::types::AffinityId;
    use dvmbm_test_utils::machine::FakeMachine;

    use super::*;

    #[test_log::test]
    fn probes_counts_and_permutations() {
        let machine = FakeMachine::hip09(2);
        let gating = StaticGatingProbe::new(btreemap! { (1, 1) => 0b0000_0001 }).with_default(0);

        let topology =
            PlatformTopology::probe(HIP09_LAYOUT, &machine.topology_probe(), &gating).unwrap();

        assert_eq!(topology.socket_count(), 2);
        assert_eq!(topology.die_count(), 2);
        assert_eq!(topology.permutations().len(), 4);
        assert_eq!(topology.cores().count(), machine.cores().len());

        let core_id = machine.core_id(1, 1, 0, 2);
        let location = topology.location(core_id).unwrap();
        assert_eq!(location.die_key(), DieKey::new(1, 1));
        assert_eq!(topology.physical_cluster(location), 7);

        let core_id = machine.core_id(0, 1, 0, 2);
        let location = topology.location(core_id).unwrap();
        assert_eq!(topology.physical_cluster(location), 0);
    }

    #[test]
    fn empty_machine_is_rejected() {
        let result = PlatformTopology::probe(
            HIP09_LAYOUT,
            &StaticTopologyProbe::default(),
            &StaticGatingProbe::default(),
        );

        assert!(matches!(result, Err(TopologyError::NoCores)));
    }

    #[test]
    fn too_many_sockets_are_rejected() {
        let machine = FakeMachine::hip09(5);
        let gating = StaticGatingProbe::default().with_default(0);

        let result = PlatformTopology::probe(HIP09_LAYOUT, &machine.topology_probe(), &gating);

        assert!(matches!(
            result,
            Err(TopologyError::TooManySockets { count: 5, max: 4 })
        ));
    }

    #[test]
    fn too_many_dies_are_rejected() {
        let affinity = HIP09_LAYOUT.affinity;
        let die_level = |raw_die: u64| AffinityId::new(raw_die << affinity.die_level_shift);
        let probe = StaticTopologyProbe::new(vec![
            (ProcessorId::new(0), die_level(3)),
            (ProcessorId::new(1), die_level(1)),
            (ProcessorId::new(2), die_level(5)),
        ]);
        let gating = StaticGatingProbe::default().with_default(0);

        let result = PlatformTopology::probe(HIP09_LAYOUT, &probe, &gating);

        assert!(matches!(
            result,
            Err(TopologyError::TooManyDies { count: 3, max: 2 })
        ));
    }

    #[test]
    fn duplicate_cores_are_rejected() {
        let affinity_id = HIP09_LAYOUT.affinity.compose(0, 0, 0, 0);
        let probe = StaticTopologyProbe::new(vec![
            (ProcessorId::new(4), affinity_id),
            (ProcessorId::new(4), affinity_id),
        ]);
        let gating = StaticGatingProbe::default().with_default(0);

        let result = PlatformTopology::probe(HIP09_LAYOUT, &probe, &gating);

        assert!(matches!(
            result,
            Err(TopologyError::DuplicateCore { core_id }) if core_id == ProcessorId::new(4)
        ));
    }

    #[test]
    fn gating_probe_failure_is_reported() {
        let machine = FakeMachine::hip09(1);
        let gating = StaticGatingProbe::new(btreemap! { (0, 0) => 0 });

        let result = PlatformTopology::probe(HIP09_LAYOUT, &machine.topology_probe(), &gating);

        assert!(matches!(
            result,
            Err(TopologyError::GatingProbeFailed {
                socket: 0,
                die: 1,
                source: HwError::GatingNotDescribed { .. }
            })
        ));
    }
}
