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

/// Hardware interface of broadcast scoping: the platform constant tables
/// (affinity packing, scope register layout, gating registers) and the probes
/// through which the rest of the workspace touches the machine.
/// MMIO probing is only implemented for Linux on aarch64,
/// for everything else the probe reports that it's unsupported.

#[cfg(all(target_arch = "aarch64", target_os = "linux"))]
#[path = "linux_aarch64/mod.rs"]
mod hw_impl;
#[cfg(not(all(target_arch = "aarch64", target_os = "linux")))]
#[path = "other/mod.rs"]
mod hw_impl;

mod errors;
pub mod layout;
mod probes;
mod shadow_register;
mod static_probe;
mod variant;

pub use errors::HwError;
pub use hw_impl::*;
pub use layout::PlatformLayout;
pub use layout::HIP09_LAYOUT;
pub use probes::FeatureProbe;
pub use probes::GatingProbe;
pub use probes::ScopeRegister;
pub use probes::TlbFlush;
pub use probes::TopologyProbe;
pub use shadow_register::ShadowScopeRegister;
pub use static_probe::StaticFeatureProbe;
pub use static_probe::StaticGatingProbe;
pub use static_probe::StaticTopologyProbe;
pub use variant::PlatformVariant;

pub type HwResult<T> = Result<T, HwError>;
