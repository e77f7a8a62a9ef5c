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

use super::DieKey;

/// Maps logical cluster slots of a die onto physical cluster indices.
///
/// Power-gated clusters in the low part of the index space are swapped with
/// enabled clusters from the tail, so that compact bitmaps never address a
/// gated cluster. The mapping is its own inverse.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterPermutation {
    slots: Vec<u32>,
}

impl ClusterPermutation {
    pub fn identity(clusters_count: u32) -> Self {
        Self {
            slots: (0..clusters_count).collect(),
        }
    }

    /// Builds the permutation from a mask where a set bit marks a gated cluster.
    /// Bits above the cluster count are ignored.
    pub fn from_gating_mask(gating_mask: u32, clusters_count: u32) -> Self {
        let is_gated = |cluster: u32| {
            cluster < clusters_count && gating_mask.checked_shr(cluster).unwrap_or(0) & 1 == 1
        };

        let mut permutation = Self::identity(clusters_count);
        let gated_count = (0..clusters_count).filter(|&cluster| is_gated(cluster)).count() as u32;
        let tail_start = clusters_count - gated_count;
        let mut substitute_used = vec![false; clusters_count as usize];

        // there are exactly as many enabled clusters in the tail as gated ones before it
        for gated in (0..tail_start).filter(|&cluster| is_gated(cluster)) {
            let substitute = (tail_start..clusters_count).find(|&candidate| {
                !is_gated(candidate) && !substitute_used[candidate as usize]
            });

            if let Some(substitute) = substitute {
                substitute_used[substitute as usize] = true;
                permutation.slots[gated as usize] = substitute;
                permutation.slots[substitute as usize] = gated;
            }
        }

        permutation
    }

    /// Physical cluster index of a logical slot; slots out of range map onto themselves.
    pub fn physical(&self, cluster: u32) -> u32 {
        self.slots
            .get(cluster as usize)
            .copied()
            .unwrap_or(cluster)
    }

    pub fn slots(&self) -> &[u32] {
        &self.slots
    }

    pub fn is_identity(&self) -> bool {
        self.slots
            .iter()
            .enumerate()
            .all(|(slot, &cluster)| slot as u32 == cluster)
    }

    pub fn is_involution(&self) -> bool {
        self.slots
            .iter()
            .enumerate()
            .all(|(slot, &cluster)| self.physical(cluster) == slot as u32)
    }
}

impl std::fmt::Display for ClusterPermutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (slot, cluster) in self.slots.iter().enumerate() {
            if slot > 0 {
                write!(f, " ")?;
            }
            write!(f, "{cluster}")?;
        }
        write!(f, "]")
    }
}

/// Cluster permutations of every die, built once at platform init.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PermutationTable {
    dies: BTreeMap<DieKey, ClusterPermutation>,
}

impl PermutationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, die: DieKey, permutation: ClusterPermutation) {
        self.dies.insert(die, permutation);
    }

    pub fn get(&self, die: DieKey) -> Option<&ClusterPermutation> {
        self.dies.get(&die)
    }

    /// A die without gating information is treated as having every cluster enabled.
    pub fn physical_cluster(&self, die: DieKey, cluster: u32) -> u32 {
        self.dies
            .get(&die)
            .map(|permutation| permutation.physical(cluster))
            .unwrap_or(cluster)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DieKey, &ClusterPermutation)> {
        self.dies.iter()
    }

    pub fn len(&self) -> usize {
        self.dies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dies.is_empty()
    }
}
