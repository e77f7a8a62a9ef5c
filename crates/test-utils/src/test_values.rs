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


use rand::distributions::Distribution;
use rand::distributions::Uniform;

use dvmbm_shared::types::CoreSet;
use dvmbm_shared::types::ProcessorId;

pub fn generate_core_set(cores: &[u32]) -> CoreSet {
    cores.iter().copied().map(ProcessorId::new).collect()
}

pub fn generate_random_core_set(
    rng: &mut impl rand::Rng,
    size: usize,
    range: std::ops::Range<u32>,
) -> CoreSet {
    Uniform::from(range)
        .sample_iter(rng)
        .take(size)
        .map(ProcessorId::new)
        .collect()
}
