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


use dvmbm_hw::FeatureProbe;
use dvmbm_hw::HwResult;
use dvmbm_hw::PlatformVariant;
use dvmbm_hw::ScopeRegister;
use dvmbm_shared::types::ProcessorId;

/// Process-wide decision whether broadcast scoping is active, made once at boot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Capability {
    enabled: bool,
}

impl Capability {
    pub fn unsupported() -> Self {
        Self { enabled: false }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Checks the platform variant, the hardware feature bit, the boot switch and the
    /// privilege level. When the hardware has the feature but it must stay off, the
    /// filtering control is explicitly turned off on every core.
    pub fn detect(
        variant: PlatformVariant,
        switch_enabled: bool,
        features: &dyn FeatureProbe,
        register: &dyn ScopeRegister,
        cores: &[ProcessorId],
    ) -> Self {
        tracing::info!("detected: Hisi CPU type '{variant}'");

        if !variant.has_scope_register() {
            return Self::unsupported();
        }

        if !features.has_broadcast_filtering() {
            tracing::info!("broadcast filtering isn't advertised by the hardware");
            return Self::unsupported();
        }

        if !switch_enabled || !features.in_hyp_mode() {
            tracing::info!(
                "broadcast filtering is turned off: switch enabled {switch_enabled}, hyp mode {}",
                features.in_hyp_mode()
            );
            disable_filtering(register, cores);
            return Self::unsupported();
        }

        if let Err(error) = enable_filtering(register, cores) {
            tracing::warn!("enabling broadcast filtering failed, turning it off: {error}");
            disable_filtering(register, cores);
            return Self::unsupported();
        }

        tracing::info!("broadcast filtering is enabled on {} cores", cores.len());
        Self { enabled: true }
    }
}

fn enable_filtering(register: &dyn ScopeRegister, cores: &[ProcessorId]) -> HwResult<()> {
    for core_id in cores {
        register.set_filtering(*core_id, true)?;
    }
    Ok(())
}

/// Turns the filtering control off on every core, failures are only logged.
pub fn disable_filtering(register: &dyn ScopeRegister, cores: &[ProcessorId]) {
    for core_id in cores {
        if let Err(error) = register.set_filtering(*core_id, false) {
            tracing::warn!("disabling broadcast filtering on core {core_id} failed: {error}");
        }
    }
}
