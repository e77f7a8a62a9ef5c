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

use config::Config;
use config::File;
use config::FileFormat;
use eyre::eyre;
use eyre::Context;

use crate::unresolved_config::UnresolvedDvmbmConfig;
use crate::DvmbmConfig;

/// Environment variable which takes precedence over `feature.enabled` of the file,
/// the same way the boot parameter overrides the build default.
pub const SWITCH_VARIABLE: &str = "DVMBM_ENABLED";

pub fn load_config(path: impl AsRef<Path>) -> eyre::Result<DvmbmConfig> {
    let switch = std::env::var(SWITCH_VARIABLE).ok();
    load_config_with_switch(path.as_ref(), switch)
}

pub(crate) fn load_config_with_switch(
    path: &Path,
    switch: Option<String>,
) -> eyre::Result<DvmbmConfig> {
    if !path.is_file() {
        return Err(eyre!("config file {} doesn't exist", path.display()));
    }

    let file_source = File::from(path).format(FileFormat::Toml).required(true);
    let config = Config::builder()
        .add_source(file_source)
        .set_override_option("feature.enabled", switch)
        .context("overriding the feature switch")?
        .build()
        .with_context(|| format!("loading config from {}", path.display()))?;

    let config: UnresolvedDvmbmConfig = config
        .try_deserialize()
        .with_context(|| format!("parsing config at {}", path.display()))?;
    config.resolve()
}
