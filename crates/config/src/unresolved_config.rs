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

use eyre::eyre;
use eyre::Context;
use serde::Deserialize;
use serde::Serialize;

use dvmbm_hw::PlatformLayout;
use dvmbm_hw::PlatformVariant;
use dvmbm_shared::types::AffinityId;
use dvmbm_shared::types::ProcessorId;

use super::defaults::default_hyp_mode;
use super::defaults::default_identification;
use super::defaults::default_layout_name;
use super::defaults::default_log_level;
use super::defaults::default_probe_gating;
use super::defaults::default_switch;
use crate::parse_switch;
use crate::DvmbmConfig;
use crate::Feature;
use crate::GatingSource;
use crate::Logs;
use crate::Platform;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UnresolvedDvmbmConfig {
    #[serde(default)]
    pub feature: UnresolvedFeature,
    #[serde(default)]
    pub logs: UnresolvedLogs,
    #[serde(default)]
    pub platform: UnresolvedPlatform,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UnresolvedFeature {
    #[serde(default = "default_switch")]
    pub enabled: String,

    #[serde(default)]
    pub variant: PlatformVariant,

    #[serde(default = "default_identification")]
    pub identification: u64,

    #[serde(default = "default_hyp_mode")]
    pub hyp_mode: bool,
}

impl Default for UnresolvedFeature {
    fn default() -> Self {
        Self {
            enabled: default_switch(),
            variant: PlatformVariant::default(),
            identification: default_identification(),
            hyp_mode: default_hyp_mode(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UnresolvedLogs {
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
}

impl Default for UnresolvedLogs {
    fn default() -> Self {
        UnresolvedLogs {
            log_level: default_log_level(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UnresolvedPlatform {
    #[serde(default = "default_layout_name")]
    pub layout: String,

    #[serde(default)]
    pub cores: Vec<UnresolvedCore>,

    #[serde(default)]
    pub gating: Vec<UnresolvedGating>,

    pub default_gating_mask: Option<u32>,

    #[serde(default = "default_probe_gating")]
    pub probe_gating: bool,
}

impl Default for UnresolvedPlatform {
    fn default() -> Self {
        Self {
            layout: default_layout_name(),
            cores: Vec::new(),
            gating: Vec::new(),
            default_gating_mask: None,
            probe_gating: default_probe_gating(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UnresolvedCore {
    pub id: u32,
    pub affinity: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UnresolvedGating {
    pub socket: u32,
    pub die: u32,
    pub mask: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl UnresolvedDvmbmConfig {
    pub fn resolve(self) -> eyre::Result<DvmbmConfig> {
        let feature = self.feature.resolve()?;
        let logs = self.logs.resolve();
        let platform = self.platform.resolve()?;

        let config = DvmbmConfig {
            feature,
            logs,
            platform,
        };
        Ok(config)
    }
}

impl UnresolvedFeature {
    pub fn resolve(self) -> eyre::Result<Feature> {
        let enabled = parse_switch(&self.enabled).context("feature.enabled")?;

        let feature = Feature {
            enabled,
            variant: self.variant,
            identification: self.identification,
            hyp_mode: self.hyp_mode,
        };
        Ok(feature)
    }
}

impl LogLevel {
    pub fn to_tracing_filter(&self) -> tracing_subscriber::filter::LevelFilter {
        use tracing_subscriber::filter::LevelFilter;

        match self {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

impl UnresolvedLogs {
    pub fn resolve(self) -> Logs {
        Logs {
            log_level: self.log_level.to_tracing_filter(),
        }
    }
}

impl UnresolvedPlatform {
    pub fn resolve(self) -> eyre::Result<Platform> {
        let layout = PlatformLayout::by_name(&self.layout)
            .copied()
            .ok_or_else(|| eyre!("unknown platform layout '{}'", self.layout))?;

        let cores = self
            .cores
            .into_iter()
            .map(|core| (ProcessorId::new(core.id), AffinityId::new(core.affinity)))
            .collect::<Vec<_>>();

        let gating = if self.probe_gating {
            if !self.gating.is_empty() || self.default_gating_mask.is_some() {
                return Err(eyre!(
                    "gating masks can't be listed when they are probed from the machine"
                ));
            }
            GatingSource::DevMem
        } else {
            let mut masks = BTreeMap::new();
            for gating in self.gating {
                if masks.insert((gating.socket, gating.die), gating.mask).is_some() {
                    return Err(eyre!(
                        "gating mask of socket {} die {} is listed twice",
                        gating.socket,
                        gating.die
                    ));
                }
            }
            GatingSource::Static {
                masks,
                default_mask: self.default_gating_mask,
            }
        };

        let platform = Platform {
            layout,
            cores,
            gating,
        };
        Ok(platform)
    }
}
