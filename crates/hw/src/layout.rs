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


//! Platform constant tables. Every numeric bit offset, mask and address the
//! workspace needs lives here, the algorithms in other crates only refer to
//! these tables by field name.

use std::collections::BTreeSet;

use dvmbm_shared::types::AffinityId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlatformLayout {
    pub name: &'static str,
    pub affinity: AffinityLayout,
    pub scope: ScopeRegisterLayout,
    pub gating: GatingLayout,
    pub control: ControlLayout,
    pub max_sockets: u32,
    pub max_dies_per_socket: u32,
    pub max_clusters_per_die: u32,
    /// How many distinct dies the encoder tracks before falling back to the all-dies scope.
    pub max_tracked_dies: usize,
}

/// Packing of the hierarchical affinity value (MPIDR) into socket, die, cluster and core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AffinityLayout {
    pub level_mask: u64,
    /// Affinity level holding socket and die bits (Aff3).
    pub die_level_shift: u32,
    /// Affinity level holding the cluster (Aff2).
    pub cluster_level_shift: u32,
    /// Affinity level holding the core within a cluster (Aff1).
    pub core_level_shift: u32,
    pub socket_mask: u64,
    pub socket_shift: u32,
    pub die_mask: u64,
    pub die_shift: u32,
    /// Raw die id of the first die slot of a socket (totem B).
    pub first_die_id: u64,
    /// Raw die id of the second die slot of a socket (totem A).
    pub second_die_id: u64,
}

/// Field layout of the broadcast-scope register (LSUDVMBM_EL2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScopeRegisterLayout {
    pub range_shift: u32,
    pub range_one_die: u64,
    pub range_two_dies: u64,
    pub range_all_dies: u64,
    pub granularity_shift: u32,
    pub granularity_cluster: u64,
    pub die_id_mask: u64,
    pub first_die_shift: u32,
    pub second_die_shift: u32,
    pub first_die_cluster_shift: u32,
    pub second_die_cluster_shift: u32,
    pub cores_per_cluster: u32,
    pub clusters_per_die: u32,
}

/// Location of the per-die power-gating configuration registers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GatingLayout {
    pub first_die_base: u64,
    pub second_die_base: u64,
    pub eco0_offset: u64,
    pub value_mask: u32,
}

/// Bits of the control and identification registers involved in enabling the feature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControlLayout {
    /// Enable bit of LSUDVM_CTRL_EL2.
    pub filtering_enable_mask: u64,
    /// Feature bit of AIDR_EL1.
    pub feature_mask: u64,
}

pub const HIP09_LAYOUT: PlatformLayout = PlatformLayout {
    name: "hip09",
    affinity: AffinityLayout {
        level_mask: 0xff,
        die_level_shift: 32,
        cluster_level_shift: 16,
        core_level_shift: 8,
        socket_mask: 0xf8,
        socket_shift: 3,
        die_mask: 0x7,
        die_shift: 0,
        first_die_id: 3,
        second_die_id: 1,
    },
    scope: ScopeRegisterLayout {
        range_shift: 62,
        range_one_die: 0,
        range_two_dies: 1,
        range_all_dies: 3,
        granularity_shift: 61,
        granularity_cluster: 0,
        die_id_mask: 0xff,
        first_die_shift: 53,
        second_die_shift: 45,
        first_die_cluster_shift: 22,
        second_die_cluster_shift: 0,
        cores_per_cluster: 4,
        clusters_per_die: 8,
    },
    gating: GatingLayout {
        first_die_base: 0x00C6_067F_0000,
        second_die_base: 0x0046_067F_0000,
        eco0_offset: 0xc00,
        value_mask: 0xff,
    },
    control: ControlLayout {
        filtering_enable_mask: 1 << 0,
        feature_mask: 1 << 12,
    },
    max_sockets: 4,
    max_dies_per_socket: 2,
    max_clusters_per_die: 8,
    max_tracked_dies: 32,
};

impl PlatformLayout {
    pub fn by_name(name: &str) -> Option<&'static PlatformLayout> {
        [&HIP09_LAYOUT]
            .into_iter()
            .find(|layout| layout.name.eq_ignore_ascii_case(name))
    }
}

impl AffinityLayout {
    pub fn raw_die_id(&self, die_index: u32) -> u64 {
        if die_index == 0 {
            self.first_die_id
        } else {
            self.second_die_id
        }
    }

    /// Packs a location back into a raw affinity value, used to describe machines.
    pub fn compose(&self, socket: u32, die_index: u32, cluster: u32, core: u32) -> AffinityId {
        let die_level = ((socket as u64) << self.socket_shift) & self.socket_mask
            | (self.raw_die_id(die_index) << self.die_shift) & self.die_mask;
        let raw = (die_level & self.level_mask) << self.die_level_shift
            | (cluster as u64 & self.level_mask) << self.cluster_level_shift
            | (core as u64 & self.level_mask) << self.core_level_shift;

        AffinityId::new(raw)
    }
}

/// A core addressed by its physical (post-permutation) cluster within a die.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusterCore {
    pub cluster: u32,
    pub core: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DieClusters {
    pub die_id: u64,
    pub clusters: BTreeSet<u32>,
}

/// Typed content of the broadcast-scope register.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScopeFields {
    /// Nothing is occupied.
    Empty,
    /// Core granularity within one die.
    OneDie {
        die_id: u64,
        cores: BTreeSet<ClusterCore>,
    },
    /// Cluster granularity within two dies.
    TwoDies {
        first: DieClusters,
        second: DieClusters,
    },
    /// Broadcast to every die.
    AllDies,
}

impl ClusterCore {
    pub fn new(cluster: u32, core: u32) -> Self {
        Self { cluster, core }
    }
}

impl DieClusters {
    pub fn new(die_id: u64) -> Self {
        Self {
            die_id,
            clusters: BTreeSet::new(),
        }
    }
}

impl ScopeRegisterLayout {
    pub fn core_fits(&self, cluster_core: ClusterCore) -> bool {
        cluster_core.cluster < self.clusters_per_die && cluster_core.core < self.cores_per_cluster
    }

    pub fn cluster_fits(&self, cluster: u32) -> bool {
        cluster < self.clusters_per_die
    }

    pub fn fits(&self, fields: &ScopeFields) -> bool {
        match fields {
            ScopeFields::Empty | ScopeFields::AllDies => true,
            ScopeFields::OneDie { cores, .. } => {
                cores.iter().all(|cluster_core| self.core_fits(*cluster_core))
            }
            ScopeFields::TwoDies { first, second } => first
                .clusters
                .iter()
                .chain(second.clusters.iter())
                .all(|cluster| self.cluster_fits(*cluster)),
        }
    }

    /// Serializes the typed fields into the bit-exact register value.
    /// Fields that don't fit the register are widened to the all-dies scope.
    pub fn serialize(&self, fields: &ScopeFields) -> u64 {
        if !self.fits(fields) {
            return self.all_dies_value();
        }

        match fields {
            ScopeFields::Empty => 0,
            ScopeFields::OneDie { die_id, cores } => {
                let header = self.range_one_die << self.range_shift
                    | (die_id & self.die_id_mask) << self.first_die_shift;

                cores.iter().fold(header, |value, cluster_core| {
                    let bit = cluster_core.cluster * self.cores_per_cluster + cluster_core.core;
                    value | 1u64 << bit
                })
            }
            ScopeFields::TwoDies { first, second } => {
                let header = self.range_two_dies << self.range_shift
                    | self.granularity_cluster << self.granularity_shift
                    | (first.die_id & self.die_id_mask) << self.first_die_shift
                    | (second.die_id & self.die_id_mask) << self.second_die_shift;

                let value = first.clusters.iter().fold(header, |value, cluster| {
                    value | 1u64 << (cluster + self.first_die_cluster_shift)
                });
                second.clusters.iter().fold(value, |value, cluster| {
                    value | 1u64 << (cluster + self.second_die_cluster_shift)
                })
            }
            ScopeFields::AllDies => self.all_dies_value(),
        }
    }

    pub fn all_dies_value(&self) -> u64 {
        self.range_all_dies << self.range_shift
    }
}

impl GatingLayout {
    /// Address offset of a socket (chip) in the physical address space.
    pub fn chip_offset(&self, socket: u32) -> u64 {
        let socket = socket as u64;
        let high = if (socket >> 3) & 0x1 == 1 {
            0x0800_0000_0000
        } else {
            0
        };

        high + ((socket >> 2) & 0x1) * 0x1000_0000_0000 + (socket & 0x3) * 0x2000_0000_0000
    }

    pub fn register_address(&self, socket: u32, die_index: u32) -> u64 {
        let base = if die_index == 0 {
            self.first_die_base
        } else {
            self.second_die_base
        };

        base + self.chip_offset(socket) + self.eco0_offset
    }
}

impl ControlLayout {
    pub fn feature_present(&self, identification: u64) -> bool {
        identification & self.feature_mask != 0
    }

    /// Value of the control register with the filtering bit switched, other bits preserved.
    pub fn control_value(&self, current: u64, enabled: bool) -> u64 {
        let new_value = if enabled {
            self.filtering_enable_mask
        } else {
            0
        };
        masked_value(current, new_value, self.filtering_enable_mask)
    }

    pub fn filtering_enabled(&self, control: u64) -> bool {
        control & self.filtering_enable_mask != 0
    }
}

pub fn masked_value(old_value: u64, new_value: u64, mask: u64) -> u64 {
    (new_value & mask) | (old_value & !mask)
}

#[cfg(test)]
mod tests {
    use maplit::btreeset;

    use super::*;

    const SCOPE: ScopeRegisterLayout = HIP09_LAYOUT.scope;

    #[test]
    fn one_die_sets_core_bits_and_die_field() {
        let fields = ScopeFields::OneDie {
            die_id: 0x03,
            cores: btreeset! { ClusterCore::new(0, 1), ClusterCore::new(2, 3) },
        };

        let expected: u64 = 0x03 << 53 | 1 << 1 | 1 << (2 * 4 + 3);
        assert_eq!(SCOPE.serialize(&fields), expected);
    }

    #[test]
    fn two_dies_set_cluster_bits_per_die() {
        let fields = ScopeFields::TwoDies {
            first: DieClusters {
                die_id: 0x03,
                clusters: btreeset! {1},
            },
            second: DieClusters {
                die_id: 0x01,
                clusters: btreeset! {0, 7},
            },
        };

        let expected: u64 = 1 << 62 | 0x03 << 53 | 0x01 << 45 | 1 << 23 | 1 << 0 | 1 << 7;
        assert_eq!(SCOPE.serialize(&fields), expected);
    }

    #[test]
    fn all_dies_has_only_range() {
        assert_eq!(SCOPE.serialize(&ScopeFields::AllDies), 3u64 << 62);
        assert_eq!(SCOPE.serialize(&ScopeFields::Empty), 0);
    }

    #[test]
    fn oversized_fields_widen_to_all_dies() {
        let fields = ScopeFields::OneDie {
            die_id: 0x03,
            cores: btreeset! { ClusterCore::new(8, 0) },
        };

        assert_eq!(SCOPE.serialize(&fields), SCOPE.all_dies_value());
    }

    #[test]
    fn compose_packs_affinity_levels() {
        let affinity = HIP09_LAYOUT.affinity;

        let actual = affinity.compose(1, 1, 5, 2);

        let die_level: u64 = 1 << 3 | 0x1;
        let expected = die_level << 32 | 5 << 16 | 2 << 8;
        assert_eq!(actual.raw(), expected);
    }

    #[test]
    fn gating_register_address() {
        let gating = HIP09_LAYOUT.gating;

        assert_eq!(gating.register_address(0, 0), 0x00C6_067F_0C00);
        assert_eq!(gating.register_address(1, 1), 0x2046_067F_0C00);
        assert_eq!(gating.register_address(4, 0), 0x10C6_067F_0C00);
    }

    #[test]
    fn control_value_preserves_other_bits() {
        let control = HIP09_LAYOUT.control;

        assert_eq!(control.control_value(0b1010, true), 0b1011);
        assert_eq!(control.control_value(0b1011, false), 0b1010);
        assert!(control.feature_present(1 << 12));
        assert!(!control.feature_present(1 << 11));
    }

    #[test]
    fn layout_lookup_is_case_insensitive() {
        assert_eq!(PlatformLayout::by_name("HIP09"), Some(&HIP09_LAYOUT));
        assert_eq!(PlatformLayout::by_name("hip08"), None);
    }
}
