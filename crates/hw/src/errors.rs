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


use thiserror::Error as ThisError;

use dvmbm_shared::types::ProcessorId;

#[derive(ThisError, Debug)]
pub enum HwError {
    #[error("opening '/dev/mem' for read there is an error: {io_error:?}")]
    OpenForRead { io_error: std::io::Error },

    #[error("reading MMIO register at {address:#x} there is an error: {errno:?}")]
    ReadWNoErr { address: u64, errno: nix::errno::Errno },

    #[error("reading MMIO register at {address:#x} returned {read} bytes instead of 4")]
    ShortRead { address: u64, read: usize },

    #[error("{what} is not supported on this platform")]
    Unsupported { what: &'static str },

    #[error("gating config for socket {socket} die {die} isn't described")]
    GatingNotDescribed { socket: u32, die: u32 },

    #[error("accessing a register on core {core_id} failed: {message}")]
    RegisterAccess { core_id: ProcessorId, message: String },
}

#[cfg(all(target_arch = "aarch64", target_os = "linux"))]
impl HwError {
    pub(crate) fn open_for_read(io_error: std::io::Error) -> Self {
        Self::OpenForRead { io_error }
    }

    pub(crate) fn read_w_no_err(address: u64, errno: nix::errno::Errno) -> Self {
        Self::ReadWNoErr { address, errno }
    }

    pub(crate) fn short_read(address: u64, read: usize) -> Self {
        Self::ShortRead { address, read }
    }
}

impl HwError {
    pub fn unsupported(what: &'static str) -> Self {
        Self::Unsupported { what }
    }

    pub fn gating_not_described(socket: u32, die: u32) -> Self {
        Self::GatingNotDescribed { socket, die }
    }

    pub fn register_access(core_id: ProcessorId, message: impl Into<String>) -> Self {
        Self::RegisterAccess {
            core_id,
            message: message.into(),
        }
    }
}
