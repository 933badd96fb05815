//! Filesystem route source.
//!
//! A pod is a project root with two optional trees:
//!
//! ```text
//! <root>/
//! ├── content/             # markdown documents, rendered to HTML
//! │   ├── index.md         → /
//! │   └── blog/post.md     → /blog/post/
//! └── static/              # copied byte for byte
//!     └── css/site.css     → /static/css/site.css
//! ```
//!
//! Pod paths carry the directory as configured (`/content/index.md`,
//! `/static/css/site.css`), so patterns follow renamed directories. URLs do
//! not: static files are always served under `/static/`.
//!
//! Hidden files and directories (leading `.`) are skipped. Files under
//! `content/` that are not markdown are ignored.

use crate::config::ExportConfig;
use crate::route::{Provider, RenderError, Route, RouteSource};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use pulldown_cmark::{Parser, html as md_html};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum PodError {
    #[error("failed to walk {dir}: {source}")]
    Walk {
        dir: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Routes discovered from a project directory.
#[derive(Debug, Clone)]
pub struct FsPod {
    content_dir: PathBuf,
    static_dir: PathBuf,
    /// Pod path prefixes, e.g. `content` for `/content/about.md`.
    content_prefix: String,
    static_prefix: String,
    lang: String,
}

impl FsPod {
    /// Pod paths are prefixed with each directory's own name.
    pub fn new(content_dir: impl Into<PathBuf>, static_dir: impl Into<PathBuf>) -> Self {
        let content_dir = content_dir.into();
        let static_dir = static_dir.into();
        Self {
            content_prefix: dir_name(&content_dir, "content"),
            static_prefix: dir_name(&static_dir, "static"),
            content_dir,
            static_dir,
            lang: "en".to_string(),
        }
    }

    /// Pod paths are prefixed with the configured directories, relative to
    /// `root` (`content_dir = "site/pages"` gives `/site/pages/about.md`).
    pub fn from_config(config: &ExportConfig, root: &Path) -> Self {
        Self {
            content_dir: root.join(&config.content_dir),
            static_dir: root.join(&config.static_dir),
            content_prefix: config_prefix(&config.content_dir),
            static_prefix: config_prefix(&config.static_dir),
            lang: config.default_locale.clone(),
        }
    }

    /// Walk both trees and return every route, sorted by URL path.
    pub fn discover(&self) -> Result<Vec<Box<dyn Route>>, PodError> {
        let mut routes: Vec<Box<dyn Route>> = Vec::new();

        for (rel, source) in walk_files(&self.static_dir)? {
            routes.push(Box::new(StaticRoute {
                pod_path: format!("/{}/{rel}", self.static_prefix),
                url_path: format!("/static/{rel}"),
                source,
            }));
        }

        for (rel, source) in walk_files(&self.content_dir)? {
            if !is_markdown(&source) {
                continue;
            }
            routes.push(Box::new(DocumentRoute {
                pod_path: format!("/{}/{rel}", self.content_prefix),
                url_path: document_url(&rel),
                source,
                lang: self.lang.clone(),
            }));
        }

        routes.sort_by(|a, b| a.url_path().cmp(b.url_path()));
        Ok(routes)
    }
}

impl RouteSource for FsPod {
    fn routes(&self) -> Result<Vec<Box<dyn Route>>, RenderError> {
        Ok(self.discover()?)
    }
}

/// All visible files under `dir` as `(relative path with '/' separators, absolute path)`.
/// A missing directory yields nothing.
fn walk_files(dir: &Path) -> Result<Vec<(String, PathBuf)>, PodError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));
    for entry in walker {
        let entry = entry.map_err(|source| PodError::Walk {
            dir: dir.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((rel, entry.into_path()));
    }
    Ok(files)
}

fn dir_name(dir: &Path, fallback: &str) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| fallback.to_string())
}

/// `./site/pages/` → `site/pages`; backslashes count as separators.
fn config_prefix(dir: &str) -> String {
    dir.replace('\\', "/")
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("md"))
        .unwrap_or(false)
}

/// `blog/post.md` → `/blog/post/`, `blog/index.md` → `/blog/`, `index.md` → `/`.
fn document_url(rel: &str) -> String {
    let stem = &rel[..rel.len() - ".md".len()];
    let dir = match stem.rsplit_once('/') {
        Some((parent, "index")) => Some(parent),
        None if stem == "index" => Some(""),
        _ => None,
    };
    match dir {
        Some("") => "/".to_string(),
        Some(parent) => format!("/{parent}/"),
        None => format!("/{stem}/"),
    }
}

#[derive(Debug)]
struct StaticRoute {
    pod_path: String,
    url_path: String,
    source: PathBuf,
}

impl Route for StaticRoute {
    fn pod_path(&self) -> &str {
        &self.pod_path
    }

    fn url_path(&self) -> &str {
        &self.url_path
    }

    fn provider(&self) -> Provider<'_> {
        Provider::StaticDir {
            source: &self.source,
        }
    }

    fn build(&self) -> Result<Vec<u8>, RenderError> {
        Ok(fs::read(&self.source)?)
    }
}

#[derive(Debug)]
struct DocumentRoute {
    pod_path: String,
    url_path: String,
    source: PathBuf,
    lang: String,
}

impl Route for DocumentRoute {
    fn pod_path(&self) -> &str {
        &self.pod_path
    }

    fn url_path(&self) -> &str {
        &self.url_path
    }

    fn provider(&self) -> Provider<'_> {
        Provider::Render { kind: "markdown" }
    }

    fn build(&self) -> Result<Vec<u8>, RenderError> {
        let markdown = fs::read_to_string(&self.source)?;
        let stem = self
            .source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let title = document_title(&markdown).unwrap_or(stem);
        Ok(render_document(&title, &self.lang, &markdown)
            .into_string()
            .into_bytes())
    }
}

/// Text of the first `# ` heading line.
fn document_title(markdown: &str) -> Option<String> {
    markdown
        .lines()
        .find(|line| line.starts_with("# "))
        .map(|line| line.trim_start_matches("# ").trim().to_string())
}

fn render_document(title: &str, lang: &str, markdown: &str) -> Markup {
    let mut body_html = String::new();
    md_html::push_html(&mut body_html, Parser::new(markdown));

    html! {
        (DOCTYPE)
        html lang=(lang) {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
            }
            body {
                main {
                    (PreEscaped(body_html))
                }
            }
        }
    }
}
