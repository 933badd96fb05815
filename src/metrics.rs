//! Per-build metrics snapshot, persisted as `metrics.json`.
//!
//! Byte and route counts come from the hashing pass; memory usage and
//! missing-translation counts are added after promotion. Nothing here is
//! cumulative across builds.

use crate::manifest::HashedPath;
use crate::translations::TranslationCache;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the metrics file within the control directory.
pub const METRICS_FILENAME: &str = "metrics.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildMetrics {
    pub memory_usage_bytes: u64,
    pub locale_to_missing_translation_count: BTreeMap<String, usize>,
    pub missing_translation_count: usize,
    pub document_route_count: usize,
    pub static_route_count: usize,
    pub document_bytes: u64,
    pub static_bytes: u64,
}

impl BuildMetrics {
    /// Route counts and byte totals per kind.
    pub fn from_hashed(hashed: &[HashedPath]) -> Self {
        let mut metrics = Self::default();
        for h in hashed {
            if h.is_static {
                metrics.static_route_count += 1;
                metrics.static_bytes += h.bytes;
            } else {
                metrics.document_route_count += 1;
                metrics.document_bytes += h.bytes;
            }
        }
        metrics
    }

    pub fn total_bytes(&self) -> u64 {
        self.document_bytes + self.static_bytes
    }

    /// Record missing-translation counts for every non-default locale that
    /// has at least one.
    pub fn add_missing_translations(&mut self, translations: &TranslationCache) {
        for locale in translations.non_default_locales() {
            let count = translations.missing_count(locale);
            if count > 0 {
                self.locale_to_missing_translation_count
                    .insert(locale.to_string(), count);
                self.missing_translation_count += count;
            }
        }
    }

    pub fn add_memory_usage(&mut self) {
        self.memory_usage_bytes = current_memory_usage().unwrap_or(0);
    }
}

/// Resident memory of this process in bytes, if the platform reports it.
pub fn current_memory_usage() -> Option<u64> {
    use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

    let pid = sysinfo::get_current_pid().ok()?;
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::nothing().with_memory(),
    );
    system.process(pid).map(|p| p.memory())
}
