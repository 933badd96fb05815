//! Build manifest: content hashes of every output, and the diff between
//! two builds.
//!
//! The manifest is the durable record of a successful export. It lives at
//! `<output>/<control_dir>/manifest.json` and is the only input the next
//! export uses to decide what was added, edited, left alone, or removed.
//!
//! ```json
//! {
//!   "branch": "main",
//!   "builtAt": "2026-01-01T00:00:00Z",
//!   "commit": "3f1c…",
//!   "files": [{ "path": "about/index.html", "hash": "9b74…" }]
//! }
//! ```
//!
//! ## Hashing
//!
//! Each staged file is hashed with SHA-256 (streamed, never fully loaded
//! into memory) and stat'ed for its size. Identical bytes at two paths are
//! two entries; the path is the identity, not the hash.
//!
//! ## Diffing
//!
//! Every path in the union of the previous and new manifests lands in
//! exactly one of `adds`, `edits`, `no_changes`, `deletes`. Deletes are
//! only computed for full builds: an incremental build looks at a subset of
//! routes and cannot know what was really removed.

use crate::paths::CreatedPath;
use crate::pool;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the manifest file within the control directory.
pub const MANIFEST_FILENAME: &str = "manifest.json";

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to hash {path}: {error}")]
    Hash {
        path: PathBuf,
        #[source]
        error: io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to start hashing workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathHash {
    pub path: String,
    pub hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildManifest {
    pub branch: Option<String>,
    pub built_at: String,
    pub commit: Option<String>,
    pub files: Vec<PathHash>,
}

impl BuildManifest {
    /// Load the previous build's manifest.
    ///
    /// Returns `Ok(None)` when no manifest exists (first build). A manifest
    /// that exists but can't be parsed is an error: silently treating it as
    /// absent would report every file as added.
    pub fn load(control_dir: &Path) -> Result<Option<Self>, ManifestError> {
        let path = control_dir.join(MANIFEST_FILENAME);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Write pretty-printed JSON to the control directory.
    pub fn save(&self, control_dir: &Path) -> Result<(), ManifestError> {
        write_json(&control_dir.join(MANIFEST_FILENAME), self)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.path.as_str())
    }
}

/// Serialize `value` pretty-printed, via a temp file in the same directory
/// so a crash never leaves a truncated file behind.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ManifestError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let json = serde_json::to_string_pretty(value)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(json.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// SHA-256 of a file's contents as lowercase hex, streamed.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Hash and size of one staged output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedPath {
    pub path: String,
    pub hash: String,
    pub bytes: u64,
    pub is_static: bool,
}

/// Hash and stat every staged file with at most `bound` in flight.
pub fn hash_staged(
    paths: &[CreatedPath<'_>],
    bound: usize,
) -> Result<Vec<HashedPath>, ManifestError> {
    pool::map_bounded(bound, paths, |created| {
        let hash_err = |error| ManifestError::Hash {
            path: created.staging.clone(),
            error,
        };
        let hash = hash_file(&created.staging).map_err(hash_err)?;
        let bytes = fs::metadata(&created.staging).map_err(hash_err)?.len();
        Ok(HashedPath {
            path: created.normalized.clone(),
            hash,
            bytes,
            is_static: created.route.provider().is_static(),
        })
    })
}

/// Assemble a manifest from hashed outputs.
pub fn build_manifest(
    hashed: &[HashedPath],
    branch: Option<String>,
    commit: Option<String>,
    built_at: String,
) -> BuildManifest {
    BuildManifest {
        branch,
        built_at,
        commit,
        files: hashed
            .iter()
            .map(|h| PathHash {
                path: h.path.clone(),
                hash: h.hash.clone(),
            })
            .collect(),
    }
}

/// Classification of every output path between two builds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildDiffPaths {
    pub adds: BTreeSet<String>,
    pub edits: BTreeSet<String>,
    pub no_changes: BTreeSet<String>,
    pub deletes: BTreeSet<String>,
}

impl BuildDiffPaths {
    pub fn total(&self) -> usize {
        self.adds.len() + self.edits.len() + self.no_changes.len() + self.deletes.len()
    }
}

/// Diff `current` against `previous`.
///
/// `incremental` suppresses deletes entirely.
pub fn diff(
    previous: Option<&BuildManifest>,
    current: &BuildManifest,
    incremental: bool,
) -> BuildDiffPaths {
    let mut result = BuildDiffPaths::default();
    let Some(previous) = previous else {
        result.adds = current.paths().map(str::to_string).collect();
        return result;
    };

    let previous_hashes: HashMap<&str, &str> = previous
        .files
        .iter()
        .map(|f| (f.path.as_str(), f.hash.as_str()))
        .collect();

    for file in &current.files {
        match previous_hashes.get(file.path.as_str()) {
            None => result.adds.insert(file.path.clone()),
            Some(hash) if *hash == file.hash => result.no_changes.insert(file.path.clone()),
            Some(_) => result.edits.insert(file.path.clone()),
        };
    }

    if !incremental {
        let current_paths: HashSet<&str> = current.paths().collect();
        result.deletes = previous
            .paths()
            .filter(|p| !current_paths.contains(p))
            .map(str::to_string)
            .collect();
    }

    result
}
