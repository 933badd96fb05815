//! Per-build state shared by every component of one export.
//!
//! Constructed once per builder and passed by reference; nothing here is
//! process-global.

use crate::profile::Profiler;
use crate::translations::TranslationCache;

#[derive(Default)]
pub struct BuildContext {
    pub translations: TranslationCache,
    pub profiler: Profiler,
}

impl BuildContext {
    pub fn new(translations: TranslationCache) -> Self {
        Self {
            translations,
            profiler: Profiler::new(),
        }
    }
}
