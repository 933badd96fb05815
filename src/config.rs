//! Export configuration module.
//!
//! Handles loading, validating, and merging `pagepress.toml`. Stock
//! defaults are serialized to a TOML value, the user's file is merged on
//! top key-by-key, and the result is deserialized and validated.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! output_dir = "build"        # Export target, relative to the pod root
//! control_dir = ".pagepress"  # Under output_dir: manifest.json, metrics.json, benchmark.txt
//! content_dir = "content"     # Markdown documents
//! static_dir = "static"       # Files copied verbatim
//! default_locale = "en"
//! locales = ["en"]
//!
//! [concurrency]
//! render = 40                 # Routes staged at once
//! hash = 2000                 # Staged files hashed at once
//! promote = 2000              # Files moved into place at once
//!
//! [progress]
//! enabled = true
//! move_threshold = 1000       # Show the move bar only for this many files or more
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Name of the config file in the pod root.
pub const CONFIG_FILENAME: &str = "pagepress.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Export configuration loaded from `pagepress.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    /// Export target directory, relative to the pod root.
    pub output_dir: String,
    /// Control directory under `output_dir` holding build records.
    pub control_dir: String,
    /// Markdown document directory, relative to the pod root.
    pub content_dir: String,
    /// Static file directory, relative to the pod root.
    pub static_dir: String,
    pub default_locale: String,
    pub locales: Vec<String>,
    /// Per-phase concurrency bounds.
    pub concurrency: ConcurrencyConfig,
    /// Terminal progress display settings.
    pub progress: ProgressConfig,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: "build".to_string(),
            control_dir: ".pagepress".to_string(),
            content_dir: "content".to_string(),
            static_dir: "static".to_string(),
            default_locale: "en".to_string(),
            locales: vec!["en".to_string()],
            concurrency: ConcurrencyConfig::default(),
            progress: ProgressConfig::default(),
        }
    }
}

impl ExportConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.concurrency;
        if c.render == 0 || c.hash == 0 || c.promote == 0 {
            return Err(ConfigError::Validation(
                "concurrency bounds must be non-zero".into(),
            ));
        }
        if !self.locales.contains(&self.default_locale) {
            return Err(ConfigError::Validation(format!(
                "default_locale {:?} must be listed in locales",
                self.default_locale
            )));
        }
        if !is_plain_relative(&self.control_dir) {
            return Err(ConfigError::Validation(
                "control_dir must be a non-empty relative path inside output_dir".into(),
            ));
        }
        Ok(())
    }

    pub fn output_path(&self, root: &Path) -> PathBuf {
        root.join(&self.output_dir)
    }

    pub fn control_path(&self, root: &Path) -> PathBuf {
        self.output_path(root).join(&self.control_dir)
    }
}

fn is_plain_relative(path: &str) -> bool {
    let path = Path::new(path);
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Concurrency bounds for each parallel phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConcurrencyConfig {
    /// Maximum routes rendered or copied at once.
    pub render: usize,
    /// Maximum staged files hashed at once.
    pub hash: usize,
    /// Maximum files moved into the output directory at once.
    pub promote: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            render: 40,
            hash: 2000,
            promote: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProgressConfig {
    pub enabled: bool,
    /// Minimum number of staged files before the move bar is shown.
    pub move_threshold: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            move_threshold: 1000,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ExportConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `pagepress.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file doesn't exist.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ExportConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ExportConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `pagepress.toml` in the pod root, merged over defaults.
pub fn load_config(root: &Path) -> Result<ExportConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(root)?)
}

/// Fully-commented stock `pagepress.toml`, printed by `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# pagepress configuration
# =======================
# All keys are optional; the values below are the defaults.

# Export target, relative to the pod root.
output_dir = "build"

# Directory under output_dir holding manifest.json, metrics.json and
# benchmark.txt. Never contains site output.
control_dir = ".pagepress"

# Markdown documents. content/about.md is exported to about/index.html.
content_dir = "content"

# Files copied verbatim. static/site.css is exported to static/site.css.
static_dir = "static"

# Locales known to the translation cache. Missing-translation counts are
# reported for every locale except the default.
default_locale = "en"
locales = ["en"]

[concurrency]
# Maximum routes rendered or copied at once.
render = 40
# Maximum staged files hashed at once.
hash = 2000
# Maximum files moved into output_dir at once.
promote = 2000

[progress]
enabled = true
# The move progress bar is only shown for builds with at least this many files.
move_threshold = 1000
"##
}
