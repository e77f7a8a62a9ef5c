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


use std::path::Path;
use std::path::PathBuf;

use maplit::btreemap;

use dvmbm_hw::PlatformVariant;
use dvmbm_hw::HIP09_LAYOUT;
use dvmbm_shared::types::AffinityId;
use dvmbm_shared::types::ProcessorId;

use crate::config_loader::load_config;
use crate::config_loader::load_config_with_switch;
use crate::DvmbmConfig;
use crate::Feature;
use crate::GatingSource;
use crate::Logs;
use crate::Platform;
use crate::UnresolvedDvmbmConfig;

fn test_config_path(name: &str) -> String {
    let mut manifest_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_path.push("src/tests");
    manifest_path.push(name);
    manifest_path.as_os_str().to_str().unwrap().to_string()
}

#[test]
fn parse_basic_config() {
    let actual_config = load_config(&test_config_path("default.toml")).unwrap();

    let feature = Feature {
        enabled: true,
        variant: PlatformVariant::Hip09,
        identification: 0x1000,
        hyp_mode: true,
    };
    let logs = Logs {
        log_level: tracing_subscriber::filter::LevelFilter::WARN,
    };
    let cores = vec![
        (ProcessorId::new(0), AffinityId::new(0x0300000000)),
        (ProcessorId::new(1), AffinityId::new(0x0300000001)),
        (ProcessorId::new(2), AffinityId::new(0x0300010000)),
        (ProcessorId::new(3), AffinityId::new(0x0100000000)),
    ];
    let platform = Platform {
        layout: HIP09_LAYOUT,
        cores,
        gating: GatingSource::Static {
            masks: btreemap! { (0, 1) => 0x0a },
            default_mask: Some(0),
        },
    };
    let expected_config = DvmbmConfig {
        feature,
        logs,
        platform,
    };

    assert_eq!(actual_config, expected_config);
}

#[test]
fn parse_probed_gating_config() {
    let actual_config = load_config(&test_config_path("probed.toml")).unwrap();

    assert!(!actual_config.feature.enabled);
    assert_eq!(actual_config.feature.variant, PlatformVariant::Unknown);
    assert_eq!(actual_config.feature.identification, 0);
    assert!(actual_config.feature.hyp_mode);
    assert_eq!(actual_config.logs, Logs::default());
    assert_eq!(actual_config.platform.gating, GatingSource::DevMem);
    assert!(actual_config.platform.cores.is_empty());
}

#[test]
fn defaults_keep_feature_off() {
    let config = UnresolvedDvmbmConfig::default().resolve().unwrap();

    assert_eq!(config.feature, Feature::default());
    assert_eq!(config.platform, Platform::default());
}

#[test]
fn invalid_switch_is_rejected() {
    let mut config = UnresolvedDvmbmConfig::default();
    config.feature.enabled = "maybe".to_string();

    assert!(config.resolve().is_err());
}

#[test]
fn unknown_layout_is_rejected() {
    let mut config = UnresolvedDvmbmConfig::default();
    config.platform.layout = "hi1620".to_string();

    assert!(config.resolve().is_err());
}

#[test]
fn listed_masks_conflict_with_probing() {
    let mut config = UnresolvedDvmbmConfig::default();
    config.platform.probe_gating = true;
    config.platform.default_gating_mask = Some(0);

    assert!(config.resolve().is_err());
}

#[test]
fn switch_override_wins_over_file() {
    let path = test_config_path("default.toml");

    let config = load_config_with_switch(Path::new(&path), Some("0".to_string())).unwrap();
    assert!(!config.feature.enabled);

    let config = load_config_with_switch(Path::new(&path), None).unwrap();
    assert!(config.feature.enabled);

    let result = load_config_with_switch(Path::new(&path), Some("sometimes".to_string()));
    assert!(result.is_err());
}

#[test]
fn missing_config_file_is_reported() {
    let path = test_config_path("absent.toml");

    let error = load_config(&path).unwrap_err();
    assert!(error.to_string().contains("absent.toml"));
}
