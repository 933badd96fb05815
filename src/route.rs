//! Collaborator interfaces consumed by the export pipeline.
//!
//! The builder never resolves URLs, parses content, or renders templates
//! itself. It sees an ordered list of [`Route`]s, each of which knows:
//!
//! - its **pod path**: source identity, used for pattern filtering
//! - its **URL path**: output identity, normalized into a file path
//! - its **provider**: either a static file to copy, or something to render
//!
//! A [`RouteSource`] hands out that list once per export.

use std::path::Path;

/// Error returned by a route's render operation.
///
/// Boxed so that any content model can plug in its own error type; the
/// builder passes it through without reinterpreting it.
pub type RenderError = Box<dyn std::error::Error + Send + Sync>;

/// How a route produces its output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider<'a> {
    /// Copy `source` byte-for-byte.
    StaticDir { source: &'a Path },
    /// Call [`Route::build`] and write the result. `kind` names the provider
    /// (e.g. `"document"`) and is informational only.
    Render { kind: &'a str },
}

impl Provider<'_> {
    pub fn is_static(&self) -> bool {
        matches!(self, Provider::StaticDir { .. })
    }
}

/// A single unit of output. Immutable for the duration of one export.
pub trait Route: Send + Sync {
    /// Source identity, e.g. `/content/pages/about.md`.
    fn pod_path(&self) -> &str;

    /// Output identity, e.g. `/pages/about/`.
    fn url_path(&self) -> &str;

    fn provider(&self) -> Provider<'_>;

    /// Render the route. Never called for [`Provider::StaticDir`] routes.
    fn build(&self) -> Result<Vec<u8>, RenderError>;
}

/// Supplies the full, ordered route list for an export.
pub trait RouteSource: Sync {
    fn routes(&self) -> Result<Vec<Box<dyn Route>>, RenderError>;
}
