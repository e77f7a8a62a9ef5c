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


use crate::unresolved_config::LogLevel;

pub(crate) fn default_log_level() -> LogLevel {
    LogLevel::Error
}

pub(crate) fn default_switch() -> String {
    "off".to_string()
}

pub(crate) fn default_feature_enabled() -> bool {
    false
}

pub(crate) fn default_identification() -> u64 {
    0
}

pub(crate) fn default_hyp_mode() -> bool {
    true
}

pub(crate) fn default_layout_name() -> String {
    "hip09".to_string()
}

pub(crate) fn default_probe_gating() -> bool {
    false
}
