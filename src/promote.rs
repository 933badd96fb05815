//! Promotion: move staged files into the output directory.
//!
//! Each file is moved with an atomic rename where possible. When the staging
//! tree and the output directory are on different filesystems the rename is
//! impossible, so the file is copied and the staged source removed instead.
//! Any other failure aborts the export.

use crate::pool;
use crate::progress::{Phase, ProgressReporter};
use crate::stage::Artifact;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PromoteError {
    #[error("failed to move {from} to {to}: {error}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        error: io::Error,
    },
    #[error("failed to start promotion workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// How a single file reached its final location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    Renamed,
    Copied,
}

/// Move `from` to `to`, creating parent directories.
pub fn move_file(from: &Path, to: &Path) -> io::Result<MoveKind> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::rename(from, to) {
        Ok(()) => Ok(MoveKind::Renamed),
        Err(e) if is_cross_device(&e) => {
            copy_then_remove(from, to)?;
            Ok(MoveKind::Copied)
        }
        Err(e) => Err(e),
    }
}

fn is_cross_device(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::CrossesDevices
}

fn copy_then_remove(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to)?;
    fs::remove_file(from)
}

/// Move every artifact with at most `bound` moves in flight.
///
/// The move progress display is shown only when there are at least
/// `threshold` artifacts.
pub fn promote_all(
    artifacts: &[Artifact],
    bound: usize,
    threshold: usize,
    progress: &dyn ProgressReporter,
) -> Result<(), PromoteError> {
    let show = artifacts.len() >= threshold;
    if show {
        progress.start(Phase::Move, artifacts.len());
    }
    let result = pool::run_bounded(bound, artifacts, |artifact| {
        let kind = move_file(&artifact.staging, &artifact.output).map_err(|error| {
            PromoteError::Move {
                from: artifact.staging.clone(),
                to: artifact.output.clone(),
                error,
            }
        })?;
        if kind == MoveKind::Copied {
            tracing::debug!(path = %artifact.output.display(), "copied across filesystems");
        }
        if show {
            progress.tick(Phase::Move);
        }
        Ok(())
    });
    if show {
        progress.finish(Phase::Move);
    }
    result
}
