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


use thiserror::Error as ThisError;

use dvmbm_hw::HwError;
use dvmbm_shared::types::ProcessorId;

#[derive(Debug, ThisError)]
pub enum TopologyError {
    #[error("topology probe didn't report any core")]
    NoCores,

    #[error("core {core_id} is reported more than once")]
    DuplicateCore { core_id: ProcessorId },

    #[error("{count} sockets detected, but the platform supports at most {max}")]
    TooManySockets { count: u32, max: u32 },

    #[error("{count} dies per socket detected, but the platform supports at most {max}")]
    TooManyDies { count: u32, max: u32 },

    #[error("reading gating config of socket {socket} die {die} failed: {source}")]
    GatingProbeFailed {
        socket: u32,
        die: u32,
        #[source]
        source: HwError,
    },
}

impl TopologyError {
    pub fn duplicate_core(core_id: ProcessorId) -> Self {
        Self::DuplicateCore { core_id }
    }

    pub fn too_many_sockets(count: u32, max: u32) -> Self {
        Self::TooManySockets { count, max }
    }

    pub fn too_many_dies(count: u32, max: u32) -> Self {
        Self::TooManyDies { count, max }
    }

    pub fn gating_probe_failed(socket: u32, die: u32, source: HwError) -> Self {
        Self::GatingProbeFailed {
            socket,
            die,
            source,
        }
    }
}
