//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! Routes
//!     12 documents (48.2 KB)
//!     30 static files (1.4 MB)
//!
//! Changes
//!     3 added
//!     1 edited
//!     37 unchanged
//!     1 deleted
//!
//! Missing translations
//!     de: 4
//!
//! Exported 42 files → build
//! ```
//!
//! ## Routes
//!
//! ```text
//! /content/about.md → about/index.html (markdown)
//! /static/site.css → static/site.css (static)
//! ```
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout.

use crate::builder::BuildResult;
use crate::paths;
use crate::route::{Provider, Route};
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Format a byte count with binary units, one decimal above bytes.
fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

// ============================================================================
// Build
// ============================================================================

pub fn format_summary(result: &BuildResult, output_dir: &Path) -> Vec<String> {
    let metrics = &result.metrics;
    let diff = &result.diff;
    let mut lines = vec![
        "Routes".to_string(),
        format!(
            "{}{} ({})",
            indent(1),
            plural(metrics.document_route_count, "document", "documents"),
            human_bytes(metrics.document_bytes)
        ),
        format!(
            "{}{} ({})",
            indent(1),
            plural(metrics.static_route_count, "static file", "static files"),
            human_bytes(metrics.static_bytes)
        ),
        String::new(),
        "Changes".to_string(),
        format!("{}{} added", indent(1), diff.adds.len()),
        format!("{}{} edited", indent(1), diff.edits.len()),
        format!("{}{} unchanged", indent(1), diff.no_changes.len()),
        format!("{}{} deleted", indent(1), diff.deletes.len()),
    ];

    if result.clean.failed > 0 {
        lines.push(format!(
            "{}{} could not be removed",
            indent(1),
            plural(result.clean.failed, "stale file", "stale files")
        ));
    }

    if !metrics.locale_to_missing_translation_count.is_empty() {
        lines.push(String::new());
        lines.push("Missing translations".to_string());
        for (locale, count) in &metrics.locale_to_missing_translation_count {
            lines.push(format!("{}{locale}: {count}", indent(1)));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "Exported {} \u{2192} {}",
        plural(result.manifest.files.len(), "file", "files"),
        output_dir.display()
    ));
    lines
}

pub fn print_summary(result: &BuildResult, output_dir: &Path) {
    for line in format_summary(result, output_dir) {
        println!("{}", line);
    }
}

// ============================================================================
// Routes
// ============================================================================

pub fn format_routes(routes: &[Box<dyn Route>]) -> Vec<String> {
    routes
        .iter()
        .map(|route| {
            let kind = match route.provider() {
                Provider::StaticDir { .. } => "static",
                Provider::Render { kind } => kind,
            };
            format!(
                "{} \u{2192} {} ({})",
                route.pod_path(),
                paths::normalize(route.url_path()),
                kind
            )
        })
        .collect()
}

pub fn print_routes(routes: &[Box<dyn Route>]) {
    for line in format_routes(routes) {
        println!("{}", line);
    }
}
