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


use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// Per-VM counters of the schedule-in paths.
#[derive(Debug, Default)]
pub(crate) struct ScopeStats {
    fast_path: AtomicU64,
    slow_path: AtomicU64,
    scope_changes: AtomicU64,
    reloads: AtomicU64,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ScopeStatsSnapshot {
    /// Schedule-ins which reused the cached scope value.
    pub fast_path: u64,
    /// Schedule-ins which recomputed the union under the VM lock.
    pub slow_path: u64,
    /// Slow paths which changed the VM scope.
    pub scope_changes: u64,
    /// Forced reloads of the scope register.
    pub reloads: u64,
}

impl ScopeStats {
    pub(crate) fn record_fast_path(&self) {
        self.fast_path.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_slow_path(&self) {
        self.slow_path.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_scope_change(&self) {
        self.scope_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reload(&self) {
        self.reloads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ScopeStatsSnapshot {
        ScopeStatsSnapshot {
            fast_path: self.fast_path.load(Ordering::Relaxed),
            slow_path: self.slow_path.load(Ordering::Relaxed),
            scope_changes: self.scope_changes.load(Ordering::Relaxed),
            reloads: self.reloads.load(Ordering::Relaxed),
        }
    }
}
