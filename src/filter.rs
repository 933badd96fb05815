//! Route selection for incremental builds.
//!
//! An export may be narrowed to the routes whose pod path matches one or
//! more glob patterns. Matching ignores leading slashes on both sides, and a
//! pattern without any `/` is matched against the file name only, so
//! `*.md` selects every markdown document regardless of depth.
//!
//! An empty selection is always an error: zero routes almost certainly
//! means the pod root or the patterns are wrong.

use crate::route::Route;
use globset::{GlobBuilder, GlobMatcher};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

struct Pattern {
    matcher: GlobMatcher,
    base_name_only: bool,
}

/// Compiled set of incremental-build patterns.
pub struct RouteFilter {
    patterns: Vec<Pattern>,
}

impl RouteFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, FilterError> {
        let patterns = patterns
            .iter()
            .map(|raw| {
                let raw = raw.as_ref();
                let trimmed = raw.trim_start_matches('/');
                let glob = GlobBuilder::new(trimmed)
                    .literal_separator(true)
                    .build()
                    .map_err(|source| FilterError::Pattern {
                        pattern: raw.to_string(),
                        source,
                    })?;
                Ok(Pattern {
                    matcher: glob.compile_matcher(),
                    base_name_only: !trimmed.contains('/'),
                })
            })
            .collect::<Result<Vec<_>, FilterError>>()?;
        Ok(Self { patterns })
    }

    /// True if `pod_path` matches at least one pattern.
    pub fn matches(&self, pod_path: &str) -> bool {
        let path = pod_path.trim_start_matches('/');
        let base = Path::new(path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(path);
        self.patterns.iter().any(|p| {
            if p.base_name_only {
                p.matcher.is_match(base)
            } else {
                p.matcher.is_match(path)
            }
        })
    }
}

/// Apply optional patterns to a route list.
///
/// `None` (or an empty list) passes every route through.
pub fn select<'a>(
    routes: &'a [Box<dyn Route>],
    patterns: Option<&[String]>,
) -> Result<Vec<&'a dyn Route>, FilterError> {
    match patterns {
        Some(patterns) if !patterns.is_empty() => {
            let filter = RouteFilter::new(patterns)?;
            Ok(routes
                .iter()
                .map(|r| r.as_ref())
                .filter(|r| filter.matches(r.pod_path()))
                .collect())
        }
        _ => Ok(routes.iter().map(|r| r.as_ref()).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MemoryRoute;

    fn routes() -> Vec<Box<dyn Route>> {
        vec![
            Box::new(MemoryRoute::document("/blog/first.md", "/blog/first/", "a")),
            Box::new(MemoryRoute::document("/blog/2024/second.md", "/blog/second/", "b")),
            Box::new(MemoryRoute::document("/pages/about.md", "/about/", "c")),
            Box::new(MemoryRoute::document("/pages/notes.txt", "/notes.txt", "d")),
        ]
    }

    fn pods(selected: &[&dyn Route]) -> Vec<String> {
        selected.iter().map(|r| r.pod_path().to_string()).collect()
    }

    #[test]
    fn no_patterns_passes_everything() {
        let routes = routes();
        assert_eq!(select(&routes, None).unwrap().len(), 4);
        assert_eq!(select(&routes, Some(&[])).unwrap().len(), 4);
    }

    #[test]
    fn double_star_matches_nested() {
        let routes = routes();
        let selected = select(&routes, Some(&["/blog/**".to_string()])).unwrap();
        assert_eq!(pods(&selected), vec!["/blog/first.md", "/blog/2024/second.md"]);
    }

    #[test]
    fn single_star_does_not_cross_directories() {
        let routes = routes();
        let selected = select(&routes, Some(&["blog/*".to_string()])).unwrap();
        assert_eq!(pods(&selected), vec!["/blog/first.md"]);
    }

    #[test]
    fn slashless_pattern_matches_base_name() {
        let routes = routes();
        let selected = select(&routes, Some(&["*.md".to_string()])).unwrap();
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn any_pattern_is_enough() {
        let routes = routes();
        let patterns = vec!["/pages/about.md".to_string(), "*.txt".to_string()];
        let selected = select(&routes, Some(&patterns)).unwrap();
        assert_eq!(pods(&selected), vec!["/pages/about.md", "/pages/notes.txt"]);
    }

    #[test]
    fn no_match_yields_empty_selection() {
        let routes = routes();
        let selected = select(&routes, Some(&["/nothing/**".to_string()])).unwrap();
        assert!(selected.is_empty());
    }

    #[test]
    fn invalid_pattern_is_error() {
        let err = RouteFilter::new(&["blog/[".to_string()]).err().unwrap();
        assert!(err.to_string().contains("blog/["));
    }
}
