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

use parking_lot::Mutex;

use dvmbm_shared::types::ProcessorId;

use crate::layout::ControlLayout;
use crate::HwError;
use crate::HwResult;
use crate::ScopeRegister;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct CoreRegisters {
    control: u64,
    scope: u64,
}

/// In-memory copy of the per-core control and scope registers,
/// used where the privileged registers can't be reached.
#[derive(Debug)]
pub struct ShadowScopeRegister {
    control: ControlLayout,
    registers: Mutex<BTreeMap<ProcessorId, CoreRegisters>>,
}

impl ShadowScopeRegister {
    pub fn new(control: ControlLayout, cores: impl IntoIterator<Item = ProcessorId>) -> Self {
        let registers = cores
            .into_iter()
            .map(|core_id| (core_id, CoreRegisters::default()))
            .collect();

        Self {
            control,
            registers: Mutex::new(registers),
        }
    }

    pub fn scope(&self, core_id: ProcessorId) -> Option<u64> {
        self.registers
            .lock()
            .get(&core_id)
            .map(|registers| registers.scope)
    }

    pub fn filtering_enabled(&self, core_id: ProcessorId) -> Option<bool> {
        self.registers
            .lock()
            .get(&core_id)
            .map(|registers| self.control.filtering_enabled(registers.control))
    }

    /// Cores with the filtering bit set.
    pub fn filtering_cores(&self) -> usize {
        self.registers
            .lock()
            .values()
            .filter(|registers| self.control.filtering_enabled(registers.control))
            .count()
    }
}

impl ScopeRegister for ShadowScopeRegister {
    fn write_scope(&self, core_id: ProcessorId, value: u64) -> HwResult<()> {
        let mut registers = self.registers.lock();
        let core = registers
            .get_mut(&core_id)
            .ok_or_else(|| HwError::register_access(core_id, "core isn't known"))?;

        core.scope = value;
        Ok(())
    }

    fn set_filtering(&self, core_id: ProcessorId, enabled: bool) -> HwResult<()> {
        let mut registers = self.registers.lock();
        let core = registers
            .get_mut(&core_id)
            .ok_or_else(|| HwError::register_access(core_id, "core isn't known"))?;

        core.control = self.control.control_value(core.control, enabled);
        tracing::trace!("core {core_id}: control register is {:#x}", core.control);
        Ok(())
    }
}
