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
use dvmbm_shared::types::ProcessorId;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ScheduleState {
    #[default]
    Descheduled,
    Scheduled { core_id: ProcessorId },
}

/// Cores a vCPU may touch now and the ones it could touch at its previous run.
#[derive(Clone, Debug, Default)]
pub struct VcpuAffinity {
    current_cores: CoreSet,
    previous_cores: CoreSet,
    state: ScheduleState,
}

impl VcpuAffinity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that the vCPU is about to run on `core_id` while its host task may be
    /// placed on any of `allowed`. Returns true if the set of cores differs from the
    /// one recorded at the previous schedule-out.
    pub fn schedule_in(&mut self, core_id: ProcessorId, allowed: &CoreSet) -> bool {
        self.current_cores.copy_from(allowed);
        self.current_cores.insert(core_id);
        self.state = ScheduleState::Scheduled { core_id };

        self.current_cores != self.previous_cores
    }

    /// Remembers the cores of the run which has just ended.
    /// Returns false and keeps the state untouched if the vCPU wasn't scheduled.
    pub fn schedule_out(&mut self) -> bool {
        if !self.is_scheduled() {
            return false;
        }

        self.previous_cores.copy_from(&self.current_cores);
        self.state = ScheduleState::Descheduled;
        true
    }

    pub fn current_cores(&self) -> &CoreSet {
        &self.current_cores
    }

    pub fn previous_cores(&self) -> &CoreSet {
        &self.previous_cores
    }

    pub fn state(&self) -> ScheduleState {
        self.state
    }

    pub fn is_scheduled(&self) -> bool {
        matches!(self.state, ScheduleState::Scheduled { .. })
    }
}
