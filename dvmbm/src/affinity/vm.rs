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


use dvmbm_shared::types::CoreSet;

/// Union of the cores every vCPU of a VM may touch.
#[derive(Clone, Debug, Default)]
pub struct VmAffinity {
    occupied_cores: CoreSet,
}

impl VmAffinity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a freshly computed union, returns true if it differs from the stored one.
    pub fn update(&mut self, union: &CoreSet) -> bool {
        if &self.occupied_cores == union {
            return false;
        }

        self.occupied_cores.copy_from(union);
        true
    }

    pub fn occupied_cores(&self) -> &CoreSet {
        &self.occupied_cores
    }
}
