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


#[cfg(test)]
mod tests;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use dvmbm_hw::FeatureProbe;
use dvmbm_hw::GatingProbe;
use dvmbm_hw::PlatformLayout;
use dvmbm_hw::PlatformVariant;
use dvmbm_hw::ScopeRegister;
use dvmbm_hw::TlbFlush;
use dvmbm_hw::TopologyProbe;
use dvmbm_shared::types::CoreSet;
use dvmbm_shared::types::ProcessorId;
use dvmbm_shared::types::VmId;
use dvmbm_topology::PlatformTopology;

use crate::capability::disable_filtering;
use crate::capability::Capability;
use crate::encoder::ScopeEncoder;
use crate::errors::ScopeError;
use crate::handles::VcpuScope;
use crate::handles::VcpuState;
use crate::handles::VmScope;
use crate::handles::VmState;
use crate::ScopeResult;

/// vCPU slots allocated along with a VM, more are reserved one by one.
const INITIAL_VCPU_CAPACITY: usize = 8;

/// Everything needed to decide on and set up broadcast scoping at boot.
pub struct PlatformContext<'probe> {
    pub variant: PlatformVariant,
    /// Parsed boot switch.
    pub switch_enabled: bool,
    pub layout: PlatformLayout,
    pub features: &'probe dyn FeatureProbe,
    pub topology_probe: &'probe dyn TopologyProbe,
    pub gating_probe: &'probe dyn GatingProbe,
    pub register: Arc<dyn ScopeRegister>,
    pub tlb: Arc<dyn TlbFlush>,
}

struct Backend {
    encoder: ScopeEncoder,
    register: Arc<dyn ScopeRegister>,
    tlb: Arc<dyn TlbFlush>,
}

/// Keeps the broadcast-scope register of every core in line with the cores
/// the running VM occupies. Every hook is a no-op when the feature is off.
pub struct ScopeController {
    backend: Option<Backend>,
}

impl ScopeController {
    pub fn new(
        topology: Arc<PlatformTopology>,
        register: Arc<dyn ScopeRegister>,
        tlb: Arc<dyn TlbFlush>,
    ) -> Self {
        let backend = Backend {
            encoder: ScopeEncoder::new(topology),
            register,
            tlb,
        };

        Self {
            backend: Some(backend),
        }
    }

    pub fn disabled() -> Self {
        Self { backend: None }
    }

    /// Detects the capability and probes the platform, any failure leaves the
    /// controller disabled with the filtering control off everywhere.
    pub fn bootstrap(context: PlatformContext<'_>) -> Self {
        let cores = context
            .topology_probe
            .possible_cores()
            .into_iter()
            .map(|(core_id, _)| core_id)
            .collect::<Vec<_>>();

        let capability = Capability::detect(
            context.variant,
            context.switch_enabled,
            context.features,
            context.register.as_ref(),
            &cores,
        );
        if !capability.is_enabled() {
            return Self::disabled();
        }

        let topology = PlatformTopology::probe(
            context.layout,
            context.topology_probe,
            context.gating_probe,
        );
        match topology {
            Ok(topology) => {
                tracing::info!(
                    "broadcast scoping is set up for {} sockets with {} dies each",
                    topology.socket_count(),
                    topology.die_count()
                );
                Self::new(Arc::new(topology), context.register, context.tlb)
            }
            Err(error) => {
                tracing::warn!("probing the platform failed, broadcast scoping is off: {error}");
                disable_filtering(context.register.as_ref(), &cores);
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn encoder(&self) -> Option<&ScopeEncoder> {
        self.backend.as_ref().map(|backend| &backend.encoder)
    }

    pub fn vm_init(&self, vm_id: VmId) -> ScopeResult<VmScope> {
        if self.backend.is_none() {
            return Ok(VmScope::disabled(vm_id));
        }

        let mut vcpus = Vec::new();
        vcpus
            .try_reserve(INITIAL_VCPU_CAPACITY)
            .map_err(|error| ScopeError::allocation_failed("vm scope", error))?;

        tracing::debug!("vm {vm_id}: broadcast scope is initialized");
        Ok(VmScope::enabled(Arc::new(VmState::new(vm_id, vcpus))))
    }

    /// Tears the VM scope down. vCPU handles which outlive it never touch the register again.
    pub fn vm_destroy(&self, vm: VmScope) {
        if let Some(state) = vm.state {
            let mut sched = state.sched.lock();
            state.destroyed.store(true, Ordering::Release);
            sched.vcpus.clear();
            tracing::debug!("vm {}: broadcast scope is destroyed", state.id);
        }
    }

    pub fn vcpu_init(&self, vm: &VmScope, index: u32) -> ScopeResult<VcpuScope> {
        let (Some(_), Some(vm_state)) = (&self.backend, &vm.state) else {
            return Ok(VcpuScope::disabled(vm.id(), index));
        };

        let mut sched = vm_state.sched.lock();
        if sched.vcpus.iter().any(|vcpu| vcpu.index == index) {
            return Err(ScopeError::vcpu_already_registered(vm_state.id, index));
        }
        sched
            .vcpus
            .try_reserve(1)
            .map_err(|error| ScopeError::allocation_failed("vcpu scope", error))?;

        let vcpu = Arc::new(VcpuState::new(index));
        sched.vcpus.push(vcpu.clone());

        Ok(VcpuScope::enabled(vm_state.clone(), vcpu))
    }

    /// Unregisters the vCPU. The VM scope isn't narrowed until the next change.
    pub fn vcpu_destroy(&self, vcpu: VcpuScope) {
        if let Some((vm, state)) = vcpu.inner {
            vm.sched
                .lock()
                .vcpus
                .retain(|registered| !Arc::ptr_eq(registered, &state));
        }
    }

    /// Called right before the vCPU enters the guest on `core_id`, with the
    /// cores its host task is allowed to run on.
    pub fn on_vcpu_schedule_in(&self, vcpu: &VcpuScope, core_id: ProcessorId, allowed: &CoreSet) {
        let (Some(backend), Some((vm, state))) = (&self.backend, &vcpu.inner) else {
            return;
        };

        if vm.is_destroyed() {
            tracing::warn!(
                "vm {}: vcpu {} is scheduled after the vm is destroyed",
                vm.id,
                vcpu.index()
            );
            return;
        }

        let changed = state.affinity.lock().schedule_in(core_id, allowed);
        if !changed {
            vm.stats.record_fast_path();
            backend.write_local(core_id, vm.scope_value.load(Ordering::Acquire));
            return;
        }

        vm.stats.record_slow_path();
        let mut sched = vm.sched.lock();
        if vm.is_destroyed() {
            return;
        }

        let mut union = CoreSet::new();
        for registered in &sched.vcpus {
            union.extend_from(registered.affinity.lock().current_cores());
        }

        if sched.affinity.update(&union) {
            vm.stats.record_scope_change();
            backend.tlb.flush_vm_tlbs(vm.id);

            let scope = backend.encoder.encode(sched.affinity.occupied_cores());
            vm.scope_value.store(scope.value(), Ordering::Release);
            for registered in &sched.vcpus {
                registered.reload_pending.store(true, Ordering::Release);
            }

            tracing::debug!(
                "vm {}: occupied cores {}, scope {:?} ({:#x})",
                vm.id,
                sched.affinity.occupied_cores(),
                scope.fields(),
                scope.value()
            );
        }

        backend.write_local(core_id, vm.scope_value.load(Ordering::Acquire));
    }

    pub fn on_vcpu_schedule_out(&self, vcpu: &VcpuScope) {
        if self.backend.is_none() {
            return;
        }
        if let Some((vm, state)) = &vcpu.inner {
            if !state.affinity.lock().schedule_out() {
                tracing::debug!("vm {}: vcpu {} isn't scheduled", vm.id, vcpu.index());
            }
        }
    }

    /// Reprograms the local register with the current VM scope.
    pub fn force_reload(&self, vcpu: &VcpuScope, core_id: ProcessorId) {
        let (Some(backend), Some((vm, _))) = (&self.backend, &vcpu.inner) else {
            return;
        };
        if vm.is_destroyed() {
            return;
        }

        vm.stats.record_reload();
        backend.write_local(core_id, vm.scope_value.load(Ordering::Acquire));
    }

    /// Consumes a pending reload request at vCPU entry, returns true if there was one.
    pub fn process_requests(&self, vcpu: &VcpuScope, core_id: ProcessorId) -> bool {
        let Some((_, state)) = &vcpu.inner else {
            return false;
        };
        if self.backend.is_none() || !state.reload_pending.swap(false, Ordering::AcqRel) {
            return false;
        }

        self.force_reload(vcpu, core_id);
        true
    }
}

impl Backend {
    fn write_local(&self, core_id: ProcessorId, value: u64) {
        if let Err(error) = self.register.write_scope(core_id, value) {
            tracing::error!("writing scope {value:#x} on core {core_id} failed: {error}");
        }
    }
}
