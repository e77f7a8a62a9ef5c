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


use dvmbm_shared::types::AffinityId;
use dvmbm_shared::types::ProcessorId;
use dvmbm_shared::types::VmId;

use crate::HwResult;

/// Source of the machine layout, consumed once at platform init.
pub trait TopologyProbe {
    /// Returns every possible core with its raw affinity value.
    fn possible_cores(&self) -> Vec<(ProcessorId, AffinityId)>;
}

/// Reads the power-gating configuration of a die, consumed once at platform init.
pub trait GatingProbe {
    /// Returns a bitmask where a set bit marks a power-gated cluster.
    fn read_gating_config(&self, socket: u32, die_index: u32) -> HwResult<u32>;
}

/// Runtime checks which decide whether the broadcast filtering could be enabled at all.
pub trait FeatureProbe {
    /// Whether the identification register advertises the broadcast filtering.
    fn has_broadcast_filtering(&self) -> bool;

    /// Whether the hypervisor runs at the privilege level that owns the scope register.
    fn in_hyp_mode(&self) -> bool;
}

/// Per-core privileged registers of the broadcast filtering.
pub trait ScopeRegister: Send + Sync {
    /// Programs the broadcast-scope register of the given core with a full value.
    fn write_scope(&self, core_id: ProcessorId, value: u64) -> HwResult<()>;

    /// Switches the broadcast filtering control bit of the given core.
    fn set_filtering(&self, core_id: ProcessorId, enabled: bool) -> HwResult<()>;
}

/// Invalidates stale translations of a VM on every core it may have run on.
pub trait TlbFlush: Send + Sync {
    /// Returns once subsequent scope register reprogramming is safe.
    fn flush_vm_tlbs(&self, vm_id: VmId);
}
