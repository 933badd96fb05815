//! # Pagepress
//!
//! Export orchestration for static sites. A route source lists every page
//! and asset of the site; the exporter turns that list into files under an
//! output directory, touching only what changed and never leaving the
//! output half-written.
//!
//! # Architecture: Staged Export
//!
//! ```text
//! 1. Stage     routes   →  <tmp>/pagepress-*/   (render or copy, bounded)
//! 2. Hash      staged   →  manifest             (SHA-256 per file)
//! 3. Diff      manifest ×  previous manifest    (adds / edits / no-changes / deletes)
//! 4. Promote   staged   →  output/              (rename, copy across devices)
//! 5. Clean     deletes  →  removed from output/ (full builds only)
//! 6. Persist   manifest.json, metrics.json      (only after 1-5 succeed)
//! ```
//!
//! A build filtered by glob patterns is incremental: it renders only the
//! matching routes and never deletes anything.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`route`] | The `Route` and `RouteSource` traits the exporter consumes |
//! | [`pod`] | Filesystem route source: markdown documents and static files |
//! | [`paths`] | URL path → output file path normalization |
//! | [`filter`] | Glob-pattern route selection |
//! | [`pool`] | Bounded-concurrency task runner on rayon |
//! | [`stage`] | Stage 1: render or copy each route into the staging tree |
//! | [`manifest`] | Stage 2/3: hashing, `manifest.json`, diffing |
//! | [`promote`] | Stage 4: move staged files into the output directory |
//! | [`clean`] | Stage 5: delete stale outputs, remove the staging tree |
//! | [`metrics`] | `metrics.json`: route counts, bytes, memory, missing translations |
//! | [`builder`] | The export state machine tying the stages together |
//! | [`hooks`] | `before_build` / `after_build` callbacks |
//! | [`context`] | Collaborators shared with renders (translations, profiler) |
//! | [`translations`] | Missing-translation bookkeeping per locale |
//! | [`profile`] | Render and phase timings, `benchmark.txt` report |
//! | [`progress`] | Progress reporting (indicatif bars or silent) |
//! | [`vcs`] | Git branch and commit for the manifest |
//! | [`config`] | `pagepress.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Stage Everything First
//!
//! Renders write into a private temp directory, never into the output
//! directory. A render failure aborts the export before a single output
//! file is touched, and the previous `manifest.json` stays valid.
//!
//! ## Manifest Paths, Not Routes
//!
//! The manifest records normalized output paths rather than URLs or source
//! paths. Diffing by output path lets deletes be applied directly to the
//! output directory, and survives routes being renamed in the source.

pub mod builder;
pub mod clean;
pub mod config;
pub mod context;
pub mod filter;
pub mod hooks;
pub mod manifest;
pub mod metrics;
pub mod output;
pub mod paths;
pub mod pod;
pub mod pool;
pub mod profile;
pub mod progress;
pub mod promote;
pub mod route;
pub mod stage;
pub mod translations;
pub mod vcs;

#[cfg(test)]
pub(crate) mod test_helpers;
