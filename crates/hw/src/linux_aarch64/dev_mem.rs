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


use crate::layout::GatingLayout;
use crate::GatingProbe;
use crate::HwResult;

use super::utils;

/// Reads die gating configuration straight from the physical address space through `/dev/mem`.
#[derive(Clone, Debug)]
pub struct DevMemGatingProbe {
    layout: GatingLayout,
}

impl DevMemGatingProbe {
    pub fn new(layout: GatingLayout) -> Self {
        Self { layout }
    }
}

impl GatingProbe for DevMemGatingProbe {
    fn read_gating_config(&self, socket: u32, die_index: u32) -> HwResult<u32> {
        let address = self.layout.register_address(socket, die_index);
        let value = utils::read_mmio_u32(address)?;

        tracing::debug!(
            "Read gating config {value:#x} for socket {socket} die {die_index} at {address:#x}"
        );

        Ok(value & self.layout.value_mask)
    }
}
