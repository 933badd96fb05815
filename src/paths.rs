//! URL path → output file path mapping.
//!
//! Every route's URL is turned into a relative file path under the output
//! directory. The mapping must be stable across builds: the manifest records
//! these paths and the next build diffs against them.
//!
//! ```text
//! /                    → index.html
//! /pages/about/        → pages/about/index.html
//! /pages/about         → pages/about/index.html
//! /static/site.css     → static/site.css
//! ```

use crate::route::Route;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Map a URL path to a relative output path.
///
/// - trailing `/` → append `index.html`
/// - no extension on the last segment → append `/index.html`
/// - otherwise unchanged
///
/// Leading slashes are stripped so the result can be joined onto a directory.
pub fn normalize(url_path: &str) -> String {
    let path = if url_path.ends_with('/') {
        format!("{url_path}index.html")
    } else if !has_extension(url_path) {
        format!("{url_path}/index.html")
    } else {
        url_path.to_string()
    };
    path.trim_start_matches('/').to_string()
}

fn has_extension(url_path: &str) -> bool {
    let last = url_path.rsplit('/').next().unwrap_or(url_path);
    Path::new(last).extension().is_some()
}

/// Per-route bookkeeping for one export: where the route is staged, and
/// where it finally lands.
pub struct CreatedPath<'a> {
    pub route: &'a dyn Route,
    /// Relative output path, as recorded in the manifest.
    pub normalized: String,
    pub staging: PathBuf,
    pub output: PathBuf,
}

impl<'a> CreatedPath<'a> {
    pub fn new(route: &'a dyn Route, staging_root: &Path, output_root: &Path) -> Self {
        let normalized = normalize(route.url_path());
        Self {
            route,
            staging: staging_root.join(&normalized),
            output: output_root.join(&normalized),
            normalized,
        }
    }
}

/// Output paths claimed by more than one route, each with the sorted pod
/// paths that claim it. Empty when every route has its own output file.
pub fn collisions(routes: &[&dyn Route]) -> BTreeMap<String, Vec<String>> {
    let mut claims: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for route in routes {
        claims
            .entry(normalize(route.url_path()))
            .or_default()
            .push(route.pod_path().to_string());
    }
    claims.retain(|_, pod_paths| pod_paths.len() > 1);
    for pod_paths in claims.values_mut() {
        pod_paths.sort();
    }
    claims
}
