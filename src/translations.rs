//! Missing-translation bookkeeping shared with the content model.
//!
//! Renderers call [`TranslationCache::record_missing`] when a string has no
//! translation for the requested locale. The builder only reads the counts
//! back when assembling metrics.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

pub struct TranslationCache {
    default_locale: String,
    locales: BTreeSet<String>,
    missing: Mutex<BTreeMap<String, BTreeSet<String>>>,
}

impl TranslationCache {
    pub fn new(default_locale: impl Into<String>, locales: &[String]) -> Self {
        let default_locale = default_locale.into();
        let mut known: BTreeSet<String> = locales.iter().cloned().collect();
        known.insert(default_locale.clone());
        Self {
            default_locale,
            locales: known,
            missing: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    /// Known locales other than the default, in sorted order.
    pub fn non_default_locales(&self) -> impl Iterator<Item = &str> {
        self.locales
            .iter()
            .map(String::as_str)
            .filter(move |l| *l != self.default_locale)
    }

    /// Record a lookup of `key` that had no translation in `locale`.
    /// Repeated lookups of the same key count once.
    pub fn record_missing(&self, locale: &str, key: &str) {
        if let Ok(mut missing) = self.missing.lock() {
            missing
                .entry(locale.to_string())
                .or_default()
                .insert(key.to_string());
        }
    }

    pub fn missing_count(&self, locale: &str) -> usize {
        self.missing
            .lock()
            .map(|m| m.get(locale).map_or(0, BTreeSet::len))
            .unwrap_or(0)
    }
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::new("en", &[])
    }
}
