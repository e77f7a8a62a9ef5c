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


use dvmbm_hw::StaticGatingProbe;
use dvmbm_hw::StaticTopologyProbe;
use dvmbm_hw::HIP09_LAYOUT;
use dvmbm_shared::types::AffinityId;
use dvmbm_shared::types::ProcessorId;

/// A machine laid out like HIP09: every socket has two dies of 8 clusters with 4 cores each.
/// Cores are numbered sequentially socket by socket, die by die, cluster by cluster.
#[derive(Clone, Debug)]
pub struct FakeMachine {
    dies_per_socket: u32,
    clusters_per_die: u32,
    cores_per_cluster: u32,
    cores: Vec<(ProcessorId, AffinityId)>,
}

impl FakeMachine {
    pub fn hip09(sockets: u32) -> Self {
        Self::new(sockets, 2, 8, 4)
    }

    pub fn new(
        sockets: u32,
        dies_per_socket: u32,
        clusters_per_die: u32,
        cores_per_cluster: u32,
    ) -> Self {
        let mut machine = Self {
            dies_per_socket,
            clusters_per_die,
            cores_per_cluster,
            cores: Vec::new(),
        };

        for socket in 0..sockets {
            for die in 0..dies_per_socket {
                for cluster in 0..clusters_per_die {
                    for core in 0..cores_per_cluster {
                        let core_id = machine.core_id(socket, die, cluster, core);
                        let affinity_id = HIP09_LAYOUT.affinity.compose(socket, die, cluster, core);
                        machine.cores.push((core_id, affinity_id));
                    }
                }
            }
        }

        machine
    }

    pub fn core_id(&self, socket: u32, die: u32, cluster: u32, core: u32) -> ProcessorId {
        let die_number = socket * self.dies_per_socket + die;
        let cluster_number = die_number * self.clusters_per_die + cluster;
        ProcessorId::new(cluster_number * self.cores_per_cluster + core)
    }

    /// Raw die-level affinity value of a die, as it appears in the scope register die fields.
    pub fn die_id(&self, socket: u32, die: u32) -> u64 {
        let affinity_id = HIP09_LAYOUT.affinity.compose(socket, die, 0, 0);
        affinity_id.raw() >> HIP09_LAYOUT.affinity.die_level_shift
    }

    pub fn cores(&self) -> &[(ProcessorId, AffinityId)] {
        &self.cores
    }

    pub fn topology_probe(&self) -> StaticTopologyProbe {
        StaticTopologyProbe::new(self.cores.clone())
    }

    /// Gating probe reporting every cluster of every die enabled.
    pub fn ungated(&self) -> StaticGatingProbe {
        StaticGatingProbe::default().with_default(0)
    }
}
