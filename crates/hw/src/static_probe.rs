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

use dvmbm_shared::types::AffinityId;
use dvmbm_shared::types::ProcessorId;

use crate::layout::ControlLayout;
use crate::FeatureProbe;
use crate::GatingProbe;
use crate::HwError;
use crate::HwResult;
use crate::TopologyProbe;

/// Machine described up front (by a config file or a test) instead of probed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StaticTopologyProbe {
    cores: Vec<(ProcessorId, AffinityId)>,
}

impl StaticTopologyProbe {
    pub fn new(cores: Vec<(ProcessorId, AffinityId)>) -> Self {
        Self { cores }
    }
}

impl TopologyProbe for StaticTopologyProbe {
    fn possible_cores(&self) -> Vec<(ProcessorId, AffinityId)> {
        self.cores.clone()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StaticGatingProbe {
    masks: BTreeMap<(u32, u32), u32>,
    default_mask: Option<u32>,
}

impl StaticGatingProbe {
    pub fn new(masks: BTreeMap<(u32, u32), u32>) -> Self {
        Self {
            masks,
            default_mask: None,
        }
    }

    /// Every die which isn't described explicitly gets the provided mask.
    pub fn with_default(mut self, mask: u32) -> Self {
        self.default_mask = Some(mask);
        self
    }
}

impl GatingProbe for StaticGatingProbe {
    fn read_gating_config(&self, socket: u32, die_index: u32) -> HwResult<u32> {
        self.masks
            .get(&(socket, die_index))
            .copied()
            .or(self.default_mask)
            .ok_or_else(|| HwError::gating_not_described(socket, die_index))
    }
}

/// Feature checks answered from a described identification register value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StaticFeatureProbe {
    control: ControlLayout,
    identification: u64,
    hyp_mode: bool,
}

impl StaticFeatureProbe {
    pub fn new(control: ControlLayout, identification: u64, hyp_mode: bool) -> Self {
        Self {
            control,
            identification,
            hyp_mode,
        }
    }
}

impl FeatureProbe for StaticFeatureProbe {
    fn has_broadcast_filtering(&self) -> bool {
        self.control.feature_present(self.identification)
    }

    fn in_hyp_mode(&self) -> bool {
        self.hyp_mode
    }
}
