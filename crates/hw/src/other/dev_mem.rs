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
use crate::HwError;
use crate::HwResult;

#[derive(Clone, Debug)]
pub struct DevMemGatingProbe {}

impl DevMemGatingProbe {
    pub fn new(_layout: GatingLayout) -> Self {
        Self {}
    }
}

impl GatingProbe for DevMemGatingProbe {
    fn read_gating_config(&self, _socket: u32, _die_index: u32) -> HwResult<u32> {
        Err(HwError::unsupported("MMIO gating probe"))
    }
}
