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

use dvmbm_hw::PlatformLayout;
use dvmbm_hw::PlatformVariant;
use dvmbm_hw::HIP09_LAYOUT;
use dvmbm_shared::types::AffinityId;
use dvmbm_shared::types::ProcessorId;

use crate::defaults::default_feature_enabled;
use crate::defaults::default_hyp_mode;
use crate::defaults::default_identification;
use crate::defaults::default_log_level;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DvmbmConfig {
    pub feature: Feature,
    pub logs: Logs,
    pub platform: Platform,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Feature {
    /// Boot switch of the broadcast filtering.
    pub enabled: bool,
    pub variant: PlatformVariant,
    /// Identification register (AIDR) value the feature bit is looked up in.
    pub identification: u64,
    /// Whether the hypervisor owns the EL2 registers.
    pub hyp_mode: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Logs {
    pub log_level: tracing_subscriber::filter::LevelFilter,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Platform {
    pub layout: PlatformLayout,
    /// Possible cores of the machine with their raw affinity values.
    pub cores: Vec<(ProcessorId, AffinityId)>,
    pub gating: GatingSource,
}

/// Where the power-gating masks of the dies come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatingSource {
    /// Masks are listed in the config, keyed by (socket, die index).
    Static {
        masks: BTreeMap<(u32, u32), u32>,
        /// Mask of the dies which aren't listed, unlisted dies fail the probe without it.
        default_mask: Option<u32>,
    },
    /// Masks are read from the physical memory of the machine.
    DevMem,
}

impl Default for Feature {
    fn default() -> Self {
        Self {
            enabled: default_feature_enabled(),
            variant: PlatformVariant::default(),
            identification: default_identification(),
            hyp_mode: default_hyp_mode(),
        }
    }
}

impl Default for Logs {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_tracing_filter(),
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self {
            layout: HIP09_LAYOUT,
            cores: Vec::new(),
            gating: GatingSource::Static {
                masks: BTreeMap::new(),
                default_mask: None,
            },
        }
    }
}
