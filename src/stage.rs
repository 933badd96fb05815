//! Staging: render or copy every selected route into a private temp tree.
//!
//! Nothing under the output directory is touched here. Each route's result
//! lands at its [`CreatedPath::staging`] location; promotion happens later,
//! and only if every route staged successfully.
//!
//! ## Bookkeeping
//!
//! Every route, whether its action succeeds or fails, appends exactly one
//! [`Artifact`] and emits one progress tick. This is done from a drop guard
//! around each task, so it runs on the error path too. Render time is
//! measured the same way.
//!
//! ## Failure
//!
//! Staging is not best-effort. The first failing route aborts the phase and
//! the error propagates unchanged to the caller.

use crate::context::BuildContext;
use crate::paths::CreatedPath;
use crate::pool;
use crate::profile::RENDER_PREFIX;
use crate::progress::{Phase, ProgressReporter};
use crate::route::{Provider, RenderError};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StageError {
    #[error("failed to copy {source_path} for {pod_path}: {error}")]
    Copy {
        pod_path: String,
        source_path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error("failed to write {path}: {error}")]
    Write {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    /// A route's own render error, passed through untouched.
    #[error(transparent)]
    Render(RenderError),
    #[error("failed to start staging workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// A staged route, recorded whether or not staging succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub staging: PathBuf,
    pub output: PathBuf,
}

/// Thread-safe artifact collection appended to by staging tasks.
#[derive(Default)]
pub struct ArtifactLog {
    artifacts: Mutex<Vec<Artifact>>,
}

impl ArtifactLog {
    pub fn push(&self, artifact: Artifact) {
        if let Ok(mut artifacts) = self.artifacts.lock() {
            artifacts.push(artifact);
        }
    }

    pub fn len(&self) -> usize {
        self.artifacts.lock().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_inner(self) -> Vec<Artifact> {
        self.artifacts.into_inner().unwrap_or_default()
    }
}

/// Records the artifact and progress tick for one route when dropped.
struct Bookkeeping<'a> {
    log: &'a ArtifactLog,
    progress: &'a dyn ProgressReporter,
    artifact: Option<Artifact>,
}

impl Drop for Bookkeeping<'_> {
    fn drop(&mut self) {
        if let Some(artifact) = self.artifact.take() {
            self.log.push(artifact);
        }
        self.progress.tick(Phase::Build);
    }
}

/// Stage every created path with at most `bound` routes in flight.
pub fn stage_all(
    paths: &[CreatedPath<'_>],
    bound: usize,
    ctx: &BuildContext,
    log: &ArtifactLog,
    progress: &dyn ProgressReporter,
) -> Result<(), StageError> {
    progress.start(Phase::Build, paths.len());
    let result = pool::run_bounded(bound, paths, |created| {
        let _bookkeeping = Bookkeeping {
            log,
            progress,
            artifact: Some(Artifact {
                staging: created.staging.clone(),
                output: created.output.clone(),
            }),
        };
        stage_one(created, ctx)
    });
    progress.finish(Phase::Build);
    result
}

/// Copy or render a single route into its staging path.
pub fn stage_one(created: &CreatedPath<'_>, ctx: &BuildContext) -> Result<(), StageError> {
    let route = created.route;
    match route.provider() {
        Provider::StaticDir { source } => {
            ensure_parent(&created.staging)?;
            fs::copy(source, &created.staging).map_err(|error| StageError::Copy {
                pod_path: route.pod_path().to_string(),
                source_path: source.to_path_buf(),
                error,
            })?;
        }
        Provider::Render { .. } => {
            let content = {
                let _timer = ctx
                    .profiler
                    .timer(format!("{RENDER_PREFIX}{}", route.pod_path()));
                route.build().map_err(StageError::Render)?
            };
            ensure_parent(&created.staging)?;
            fs::write(&created.staging, content).map_err(|error| StageError::Write {
                path: created.staging.clone(),
                error,
            })?;
        }
    }
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<(), StageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|error| StageError::Write {
            path: parent.to_path_buf(),
            error,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::CountingProgress;
    use crate::route::Route;
    use crate::test_helpers::{MemoryRoute, created_paths};
    use tempfile::TempDir;

    #[test]
    fn renders_documents_into_staging() {
        let tmp = TempDir::new().unwrap();
        let ctx = BuildContext::default();
        let route = MemoryRoute::document("/content/a.md", "/a/", "<p>A</p>");
        let created = CreatedPath::new(&route, &tmp.path().join("stage"), tmp.path());
        stage_one(&created, &ctx).unwrap();
        assert_eq!(fs::read_to_string(&created.staging).unwrap(), "<p>A</p>");
        assert!(ctx.profiler.get("render:/content/a.md").is_some());
    }

    #[test]
    fn copies_static_files_into_staging() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("site.css");
        fs::write(&src, "body{}").unwrap();
        let route = MemoryRoute::static_file("/static/site.css", "/static/site.css", &src);
        let created = CreatedPath::new(&route, &tmp.path().join("stage"), tmp.path());
        stage_one(&created, &BuildContext::default()).unwrap();
        assert_eq!(fs::read_to_string(&created.staging).unwrap(), "body{}");
    }

    #[test]
    fn missing_static_source_is_copy_error() {
        let tmp = TempDir::new().unwrap();
        let route = MemoryRoute::static_file("/static/x.css", "/static/x.css", &tmp.path().join("nope"));
        let created = CreatedPath::new(&route, &tmp.path().join("stage"), tmp.path());
        let err = stage_one(&created, &BuildContext::default()).unwrap_err();
        assert!(matches!(err, StageError::Copy { .. }));
    }

    #[test]
    fn bookkeeping_runs_for_every_route_even_on_failure() {
        let tmp = TempDir::new().unwrap();
        let routes: Vec<Box<dyn Route>> = vec![
            Box::new(MemoryRoute::document("/a.md", "/a/", "a")),
            Box::new(MemoryRoute::failing("/bad.md", "/bad/", "template exploded")),
            Box::new(MemoryRoute::document("/c.md", "/c/", "c")),
        ];
        let paths = created_paths(&routes, &tmp.path().join("stage"), &tmp.path().join("out"));
        let log = ArtifactLog::default();
        let progress = CountingProgress::default();

        // One worker: every route runs in order, so the failure is seen
        // after the first route and before the third is started.
        let err = stage_all(&paths, 1, &BuildContext::default(), &log, &progress).unwrap_err();

        assert_eq!(err.to_string(), "template exploded");
        let ticks = progress.ticks.lock().unwrap()[&Phase::Build];
        assert_eq!(ticks, log.len());
        assert!(log.len() >= 2);
        assert_eq!(*progress.finished.lock().unwrap(), vec![Phase::Build]);
    }

    #[test]
    fn render_timer_recorded_on_failure() {
        let tmp = TempDir::new().unwrap();
        let ctx = BuildContext::default();
        let route = MemoryRoute::failing("/bad.md", "/bad/", "boom");
        let created = CreatedPath::new(&route, &tmp.path().join("stage"), tmp.path());
        assert!(stage_one(&created, &ctx).is_err());
        assert!(ctx.profiler.get("render:/bad.md").is_some());
        assert!(!created.staging.exists());
    }

    #[test]
    fn stage_all_records_one_artifact_per_route() {
        let tmp = TempDir::new().unwrap();
        let routes: Vec<Box<dyn Route>> = (0..25)
            .map(|i| {
                Box::new(MemoryRoute::document(
                    &format!("/p{i}.md"),
                    &format!("/p{i}/"),
                    &format!("page {i}"),
                )) as Box<dyn Route>
            })
            .collect();
        let paths = created_paths(&routes, &tmp.path().join("stage"), &tmp.path().join("out"));
        let log = ArtifactLog::default();
        let progress = CountingProgress::default();
        stage_all(&paths, 40, &BuildContext::default(), &log, &progress).unwrap();

        assert_eq!(log.len(), 25);
        assert_eq!(*progress.started.lock().unwrap(), vec![(Phase::Build, 25)]);
        let artifacts = log.into_inner();
        assert!(artifacts.iter().all(|a| a.staging.exists()));
    }
}
