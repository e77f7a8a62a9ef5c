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

pub mod affinity;
mod capability;
pub mod controller;
mod encoder;
mod errors;
mod handles;
mod stats;

pub use capability::disable_filtering;
pub use capability::Capability;
pub use controller::PlatformContext;
pub use controller::ScopeController;
pub use encoder::DieAffinitySet;
pub use encoder::EncodedScope;
pub use encoder::ScopeEncoder;
pub use errors::ScopeError;
pub use handles::VcpuScope;
pub use handles::VmScope;
pub use stats::ScopeStatsSnapshot;

pub use dvmbm_hw::layout::ScopeFields;

pub type ScopeResult<T> = Result<T, ScopeError>;
