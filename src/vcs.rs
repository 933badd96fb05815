//! Optional git metadata recorded in the manifest.

use std::path::Path;
use std::process::Command;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VcsInfo {
    pub branch: Option<String>,
    pub commit: Option<String>,
}

/// Current branch and commit of the repository containing `root`.
/// Both are `None` when git is unavailable or `root` is not in a repo.
pub fn current(root: &Path) -> VcsInfo {
    VcsInfo {
        branch: git(root, &["rev-parse", "--abbrev-ref", "HEAD"]),
        commit: git(root, &["rev-parse", "HEAD"]),
    }
}

fn git(root: &Path, args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .filter(|s| !s.is_empty())
}
