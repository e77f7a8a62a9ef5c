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


use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;

use dvmbm_shared::types::CoreSet;
use dvmbm_shared::types::VmId;

use crate::affinity::ScheduleState;
use crate::affinity::VcpuAffinity;
use crate::affinity::VmAffinity;
use crate::stats::ScopeStats;
use crate::ScopeStatsSnapshot;

/// State guarded by the VM lock.
#[derive(Debug)]
pub(crate) struct VmSched {
    pub(crate) affinity: VmAffinity,
    pub(crate) vcpus: Vec<Arc<VcpuState>>,
}

#[derive(Debug)]
pub(crate) struct VmState {
    pub(crate) id: VmId,
    pub(crate) sched: Mutex<VmSched>,
    /// Encoded scope of `sched.affinity`, readable without the VM lock.
    pub(crate) scope_value: AtomicU64,
    /// Set under the VM lock once the VM is destroyed, surviving vCPU handles stop writing then.
    pub(crate) destroyed: AtomicBool,
    pub(crate) stats: ScopeStats,
}

#[derive(Debug)]
pub(crate) struct VcpuState {
    pub(crate) index: u32,
    pub(crate) affinity: Mutex<VcpuAffinity>,
    pub(crate) reload_pending: AtomicBool,
}

impl VmState {
    pub(crate) fn new(id: VmId, vcpus: Vec<Arc<VcpuState>>) -> Self {
        let sched = VmSched {
            affinity: VmAffinity::new(),
            vcpus,
        };

        Self {
            id,
            sched: Mutex::new(sched),
            scope_value: AtomicU64::new(0),
            destroyed: AtomicBool::new(false),
            stats: ScopeStats::default(),
        }
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

impl VcpuState {
    pub(crate) fn new(index: u32) -> Self {
        Self {
            index,
            affinity: Mutex::new(VcpuAffinity::new()),
            reload_pending: AtomicBool::new(false),
        }
    }
}

/// Broadcast scoping state of one VM, owns nothing when the feature is off.
#[derive(Debug)]
pub struct VmScope {
    id: VmId,
    pub(crate) state: Option<Arc<VmState>>,
}

impl VmScope {
    pub(crate) fn enabled(state: Arc<VmState>) -> Self {
        Self {
            id: state.id,
            state: Some(state),
        }
    }

    pub(crate) fn disabled(id: VmId) -> Self {
        Self { id, state: None }
    }

    pub fn id(&self) -> VmId {
        self.id
    }

    pub fn is_enabled(&self) -> bool {
        self.state.is_some()
    }

    pub fn occupied_cores(&self) -> CoreSet {
        self.state
            .as_ref()
            .map(|state| state.sched.lock().affinity.occupied_cores().clone())
            .unwrap_or_default()
    }

    /// Last encoded scope register value, 0 when nothing is occupied or the feature is off.
    pub fn scope_value(&self) -> u64 {
        self.state
            .as_ref()
            .map(|state| state.scope_value.load(Ordering::Acquire))
            .unwrap_or_default()
    }

    pub fn vcpu_count(&self) -> usize {
        self.state
            .as_ref()
            .map(|state| state.sched.lock().vcpus.len())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> ScopeStatsSnapshot {
        self.state
            .as_ref()
            .map(|state| state.stats.snapshot())
            .unwrap_or_default()
    }
}

/// Broadcast scoping state of one vCPU, used only by the thread running the vCPU.
#[derive(Debug)]
pub struct VcpuScope {
    vm_id: VmId,
    index: u32,
    pub(crate) inner: Option<(Arc<VmState>, Arc<VcpuState>)>,
}

impl VcpuScope {
    pub(crate) fn enabled(vm: Arc<VmState>, vcpu: Arc<VcpuState>) -> Self {
        Self {
            vm_id: vm.id,
            index: vcpu.index,
            inner: Some((vm, vcpu)),
        }
    }

    pub(crate) fn disabled(vm_id: VmId, index: u32) -> Self {
        Self {
            vm_id,
            index,
            inner: None,
        }
    }

    pub fn vm_id(&self) -> VmId {
        self.vm_id
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn current_cores(&self) -> CoreSet {
        self.inner
            .as_ref()
            .map(|(_, vcpu)| vcpu.affinity.lock().current_cores().clone())
            .unwrap_or_default()
    }

    pub fn schedule_state(&self) -> ScheduleState {
        self.inner
            .as_ref()
            .map(|(_, vcpu)| vcpu.affinity.lock().state())
            .unwrap_or_default()
    }

    /// Whether the VM scope changed since this vCPU last loaded it.
    pub fn reload_pending(&self) -> bool {
        self.inner
            .as_ref()
            .map(|(_, vcpu)| vcpu.reload_pending.load(Ordering::Acquire))
            .unwrap_or_default()
    }
}
