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


use std::collections::TryReserveError;

use thiserror::Error as ThisError;

use dvmbm_shared::types::VmId;

#[derive(ThisError, Debug)]
pub enum ScopeError {
    #[error("allocating {what} failed: {source}")]
    AllocationFailed {
        what: &'static str,
        #[source]
        source: TryReserveError,
    },

    #[error("vcpu {vcpu_index} of vm {vm_id} is already registered")]
    VcpuAlreadyRegistered { vm_id: VmId, vcpu_index: u32 },
}

impl ScopeError {
    pub(crate) fn allocation_failed(what: &'static str, source: TryReserveError) -> Self {
        Self::AllocationFailed { what, source }
    }

    pub(crate) fn vcpu_already_registered(vm_id: VmId, vcpu_index: u32) -> Self {
        Self::VcpuAlreadyRegistered { vm_id, vcpu_index }
    }
}
