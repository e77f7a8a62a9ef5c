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
use std::collections::BTreeSet;

use parking_lot::Mutex;

use dvmbm_hw::FeatureProbe;
use dvmbm_hw::HwError;
use dvmbm_hw::HwResult;
use dvmbm_hw::ScopeRegister;
use dvmbm_hw::TlbFlush;
use dvmbm_shared::types::ProcessorId;
use dvmbm_shared::types::VmId;

/// Remembers every register access instead of touching hardware.
#[derive(Debug, Default)]
pub struct RecordingScopeRegister {
    writes: Mutex<Vec<(ProcessorId, u64)>>,
    filtering: Mutex<BTreeMap<ProcessorId, bool>>,
    failing_cores: Mutex<BTreeSet<ProcessorId>>,
}

impl RecordingScopeRegister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent access to the core fail.
    pub fn fail_on(&self, core_id: ProcessorId) {
        self.failing_cores.lock().insert(core_id);
    }

    pub fn writes(&self) -> Vec<(ProcessorId, u64)> {
        self.writes.lock().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    pub fn last_write(&self) -> Option<(ProcessorId, u64)> {
        self.writes.lock().last().copied()
    }

    pub fn last_write_on(&self, core_id: ProcessorId) -> Option<u64> {
        self.writes
            .lock()
            .iter()
            .rev()
            .find(|(written_core, _)| *written_core == core_id)
            .map(|(_, value)| *value)
    }

    pub fn filtering(&self, core_id: ProcessorId) -> Option<bool> {
        self.filtering.lock().get(&core_id).copied()
    }

    pub fn filtering_states(&self) -> BTreeMap<ProcessorId, bool> {
        self.filtering.lock().clone()
    }

    fn check_core(&self, core_id: ProcessorId) -> HwResult<()> {
        if self.failing_cores.lock().contains(&core_id) {
            return Err(HwError::register_access(core_id, "injected failure"));
        }
        Ok(())
    }
}

impl ScopeRegister for RecordingScopeRegister {
    fn write_scope(&self, core_id: ProcessorId, value: u64) -> HwResult<()> {
        self.check_core(core_id)?;
        self.writes.lock().push((core_id, value));
        Ok(())
    }

    fn set_filtering(&self, core_id: ProcessorId, enabled: bool) -> HwResult<()> {
        self.check_core(core_id)?;
        self.filtering.lock().insert(core_id, enabled);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct CountingTlbFlush {
    flushes: Mutex<Vec<VmId>>,
}

impl CountingTlbFlush {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.lock().len()
    }

    pub fn flushes_of(&self, vm_id: VmId) -> usize {
        self.flushes
            .lock()
            .iter()
            .filter(|flushed| **flushed == vm_id)
            .count()
    }
}

impl TlbFlush for CountingTlbFlush {
    fn flush_vm_tlbs(&self, vm_id: VmId) {
        self.flushes.lock().push(vm_id);
    }
}

#[derive(Copy, Clone, Debug)]
pub struct FakeFeatures {
    pub broadcast_filtering: bool,
    pub hyp_mode: bool,
}

impl FakeFeatures {
    pub fn capable() -> Self {
        Self {
            broadcast_filtering: true,
            hyp_mode: true,
        }
    }
}

impl FeatureProbe for FakeFeatures {
    fn has_broadcast_filtering(&self) -> bool {
        self.broadcast_filtering
    }

    fn in_hyp_mode(&self) -> bool {
        self.hyp_mode
    }
}
