//! Shared test utilities: in-memory routes and route sources.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let source = MemorySource::new(vec![
//!     MemoryRoute::document("/content/about.md", "/about/", "<h1>About</h1>"),
//!     MemoryRoute::static_file("/static/site.css", "/static/site.css", &css_path),
//!     MemoryRoute::failing("/content/bad.md", "/bad/", "template exploded"),
//! ]);
//! ```

use std::path::{Path, PathBuf};

use crate::paths::CreatedPath;
use crate::route::{Provider, RenderError, Route, RouteSource};

#[derive(Debug, Clone)]
enum Body {
    Rendered(Vec<u8>),
    Static(PathBuf),
    Failing(String),
}

/// A route whose output is fixed at construction time.
#[derive(Debug, Clone)]
pub struct MemoryRoute {
    pod_path: String,
    url_path: String,
    body: Body,
}

impl MemoryRoute {
    pub fn document(pod_path: &str, url_path: &str, content: &str) -> Self {
        Self {
            pod_path: pod_path.to_string(),
            url_path: url_path.to_string(),
            body: Body::Rendered(content.as_bytes().to_vec()),
        }
    }

    pub fn static_file(pod_path: &str, url_path: &str, source: &Path) -> Self {
        Self {
            pod_path: pod_path.to_string(),
            url_path: url_path.to_string(),
            body: Body::Static(source.to_path_buf()),
        }
    }

    /// A document whose render always fails with `message`.
    pub fn failing(pod_path: &str, url_path: &str, message: &str) -> Self {
        Self {
            pod_path: pod_path.to_string(),
            url_path: url_path.to_string(),
            body: Body::Failing(message.to_string()),
        }
    }
}

impl Route for MemoryRoute {
    fn pod_path(&self) -> &str {
        &self.pod_path
    }

    fn url_path(&self) -> &str {
        &self.url_path
    }

    fn provider(&self) -> Provider<'_> {
        match &self.body {
            Body::Static(source) => Provider::StaticDir { source },
            Body::Rendered(_) | Body::Failing(_) => Provider::Render { kind: "memory" },
        }
    }

    fn build(&self) -> Result<Vec<u8>, RenderError> {
        match &self.body {
            Body::Rendered(content) => Ok(content.clone()),
            Body::Failing(message) => Err(message.clone().into()),
            Body::Static(_) => Err("static routes are copied, not built".into()),
        }
    }
}

/// A route source over a fixed list of [`MemoryRoute`]s.
pub struct MemorySource {
    routes: Vec<MemoryRoute>,
}

impl MemorySource {
    pub fn new(routes: Vec<MemoryRoute>) -> Self {
        Self { routes }
    }
}

impl RouteSource for MemorySource {
    fn routes(&self) -> Result<Vec<Box<dyn Route>>, RenderError> {
        Ok(self
            .routes
            .iter()
            .cloned()
            .map(|r| Box::new(r) as Box<dyn Route>)
            .collect())
    }
}

/// Build [`CreatedPath`]s for every route.
pub fn created_paths<'a>(
    routes: &'a [Box<dyn Route>],
    staging_root: &Path,
    output_root: &Path,
) -> Vec<CreatedPath<'a>> {
    routes
        .iter()
        .map(|r| CreatedPath::new(r.as_ref(), staging_root, output_root))
        .collect()
}
