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


use eyre::eyre;

/// Parses a boot switch the way the kernel parses boolean parameters:
/// only the leading characters matter, `y`, `1` and `on` enable, `n`, `0` and `off` disable.
pub fn parse_switch(value: &str) -> eyre::Result<bool> {
    let mut chars = value.chars();

    match (chars.next(), chars.next()) {
        (Some('y' | 'Y' | '1'), _) => Ok(true),
        (Some('n' | 'N' | '0'), _) => Ok(false),
        (Some('o' | 'O'), Some('n' | 'N')) => Ok(true),
        (Some('o' | 'O'), Some('f' | 'F')) => Ok(false),
        _ => Err(eyre!("invalid boolean switch value '{value}'")),
    }
}
