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


use std::fs::File;
use std::io;

use crate::HwError;
use crate::HwResult;

const DEV_MEM_PATH: &str = "/dev/mem";

pub(crate) fn read_mmio_u32(address: u64) -> HwResult<u32> {
    use nix::sys::uio::pread;

    let file = open_dev_mem().map_err(HwError::open_for_read)?;

    let mut value = [0u8; 4];
    let read = pread(&file, &mut value, address as i64)
        .map_err(|errno| HwError::read_w_no_err(address, errno))?;
    if read != value.len() {
        return Err(HwError::short_read(address, read));
    }

    Ok(u32::from_le_bytes(value))
}

fn open_dev_mem() -> io::Result<File> {
    use std::fs::OpenOptions;

    OpenOptions::new().read(true).open(DEV_MEM_PATH)
}
