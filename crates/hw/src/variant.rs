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


use serde::Deserialize;
use serde::Serialize;

/// CPU model classification, provided by the platform detection at boot.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformVariant {
    Hi1612,
    Hi1616,
    Hi1620,
    Hip09,
    #[default]
    Unknown,
}

impl PlatformVariant {
    /// Only this variant has the broadcast-scope register.
    pub fn has_scope_register(&self) -> bool {
        matches!(self, PlatformVariant::Hip09)
    }
}

impl std::fmt::Display for PlatformVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PlatformVariant::Hi1612 => "Hisi1612",
            PlatformVariant::Hi1616 => "Hisi1616",
            PlatformVariant::Hi1620 => "Hisi1620",
            PlatformVariant::Hip09 => "HIP09",
            PlatformVariant::Unknown => "Unknown",
        };
        write!(f, "{name}")
    }
}
