//! Removal of stale outputs after a full build.
//!
//! Deleting a file that is already gone counts as success. Any other
//! failure is logged and skipped: a leftover stale file is preferable to
//! failing a build whose new outputs are already in place.

use std::fs;
use std::io;
use std::path::Path;
use tempfile::TempDir;

/// Outcome counts for one cleanup pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanStats {
    pub deleted: usize,
    pub already_absent: usize,
    pub failed: usize,
    pub pruned_dirs: usize,
}

/// Delete each relative `path` under `output_dir`, then remove its parent
/// directory if it is empty (one level only). The parent is checked even
/// when the file was already gone.
pub fn delete_stale<'a>(
    output_dir: &Path,
    paths: impl IntoIterator<Item = &'a String>,
) -> CleanStats {
    let mut stats = CleanStats::default();
    for rel in paths {
        let path = output_dir.join(rel);
        match fs::remove_file(&path) {
            Ok(()) => stats.deleted += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => stats.already_absent += 1,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to delete stale output");
                stats.failed += 1;
                continue;
            }
        }
        if let Some(parent) = path.parent()
            && parent != output_dir
            && prune_if_empty(parent)
        {
            stats.pruned_dirs += 1;
        }
    }
    stats
}

/// Remove `dir` if it has no entries. Returns true if it was removed.
fn prune_if_empty(dir: &Path) -> bool {
    let empty = fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false);
    empty && fs::remove_dir(dir).is_ok()
}

/// Recursively delete the staging root. A root that is already gone is fine.
pub fn remove_staging_root(root: TempDir) -> io::Result<()> {
    match root.close() {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
