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


#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![deny(
    dead_code,
    nonstandard_style,
    unused_imports,
    unused_mut,
    unused_variables,
    unused_unsafe,
    unreachable_patterns
)]

mod config;
mod config_loader;
mod defaults;
mod switch;
mod unresolved_config;


pub use crate::config::DvmbmConfig;
pub use crate::config::Feature;
pub use crate::config::GatingSource;
pub use crate::config::Logs;
pub use crate::config::Platform;
pub use config_loader::load_config;
pub use config_loader::SWITCH_VARIABLE;
pub use switch::parse_switch;
pub use unresolved_config::LogLevel;
pub use unresolved_config::UnresolvedDvmbmConfig;
