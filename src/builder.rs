//! Export orchestration.
//!
//! [`Builder::export`] turns the route list into files under the output
//! directory. Phases run strictly one after another:
//!
//! ```text
//! NotStarted → Staging → Hashing → Diffing → Promoting → Cleaning → Persisted → Done
//!      └──────────┴─────────┴─────────┴──────────┴───────────┴──────────→ Failed
//! ```
//!
//! - Nothing is written under the output directory until every route has
//!   been staged and hashed.
//! - Stale outputs are deleted only once the new manifest is known and all
//!   new files are in place.
//! - `manifest.json` and `metrics.json` are written last. A failed export
//!   leaves the previous records untouched.
//!
//! The staging tree is a fresh temp directory per export. It is removed on
//! success and, through its drop guard, on failure too.

use crate::clean::{self, CleanStats};
use crate::config::{ConcurrencyConfig, ExportConfig};
use crate::context::BuildContext;
use crate::filter::{self, FilterError};
use crate::hooks::{HookError, Hooks};
use crate::manifest::{self, BuildDiffPaths, BuildManifest, ManifestError};
use crate::metrics::{BuildMetrics, METRICS_FILENAME};
use crate::paths::{self, CreatedPath};
use crate::progress::{ProgressReporter, SilentProgress};
use crate::promote::{self, PromoteError};
use crate::route::{RenderError, RouteSource};
use crate::stage::{self, ArtifactLog, StageError};
use crate::vcs;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Name of the benchmark report within the control directory.
pub const BENCHMARK_FILENAME: &str = "benchmark.txt";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("no routes to export; check the pod root and patterns {patterns:?}")]
    NoRoutes { patterns: Vec<String> },
    #[error("output path {path} is produced by more than one route: {pod_paths:?}")]
    DuplicateOutput { path: String, pod_paths: Vec<String> },
    #[error("failed to list routes: {0}")]
    Routes(#[source] RenderError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Stage(#[from] StageError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Promote(#[from] PromoteError),
    #[error("{hook} hook failed: {source}")]
    Hook {
        hook: &'static str,
        #[source]
        source: HookError,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the export is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    NotStarted,
    Staging,
    Hashing,
    Diffing,
    Promoting,
    Cleaning,
    Persisted,
    Done,
    Failed,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildState::NotStarted => "not started",
            BuildState::Staging => "staging",
            BuildState::Hashing => "hashing",
            BuildState::Diffing => "diffing",
            BuildState::Promoting => "promoting",
            BuildState::Cleaning => "cleaning",
            BuildState::Persisted => "persisted",
            BuildState::Done => "done",
            BuildState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Options for a single export.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Glob patterns over pod paths. When non-empty the export is
    /// incremental: only matching routes are built and nothing is deleted.
    pub patterns: Option<Vec<String>>,
}

impl ExportOptions {
    pub fn with_patterns<S: Into<String>>(patterns: impl IntoIterator<Item = S>) -> Self {
        Self {
            patterns: Some(patterns.into_iter().map(Into::into).collect()),
        }
    }

    pub fn is_incremental(&self) -> bool {
        self.patterns.as_ref().is_some_and(|p| !p.is_empty())
    }
}

/// Everything an export produced.
#[derive(Debug, Clone, Default)]
pub struct BuildResult {
    pub metrics: BuildMetrics,
    pub manifest: BuildManifest,
    pub diff: BuildDiffPaths,
    pub clean: CleanStats,
}

/// Paths and limits for the builder.
#[derive(Debug, Clone)]
pub struct BuildSettings {
    pub output_dir: PathBuf,
    /// Directory holding manifest, metrics and benchmark files.
    pub control_dir: PathBuf,
    pub concurrency: ConcurrencyConfig,
    pub move_threshold: usize,
    /// Parent for the staging temp directory. System temp dir if `None`.
    pub staging_parent: Option<PathBuf>,
    /// Directory used to look up git branch and commit. Skipped if `None`.
    pub vcs_root: Option<PathBuf>,
}

impl BuildSettings {
    /// Defaults with control records under `<output_dir>/.pagepress`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        let defaults = ExportConfig::default();
        Self {
            control_dir: output_dir.join(&defaults.control_dir),
            output_dir,
            concurrency: defaults.concurrency,
            move_threshold: defaults.progress.move_threshold,
            staging_parent: None,
            vcs_root: None,
        }
    }

    pub fn from_config(config: &ExportConfig, root: &Path) -> Self {
        Self {
            output_dir: config.output_path(root),
            control_dir: config.control_path(root),
            concurrency: config.concurrency.clone(),
            move_threshold: config.progress.move_threshold,
            staging_parent: None,
            vcs_root: Some(root.to_path_buf()),
        }
    }
}

pub struct Builder {
    source: Box<dyn RouteSource>,
    settings: BuildSettings,
    context: BuildContext,
    hooks: Hooks,
    progress: Box<dyn ProgressReporter>,
    state: BuildState,
}

impl Builder {
    pub fn new(source: impl RouteSource + 'static, settings: BuildSettings) -> Self {
        Self {
            source: Box::new(source),
            settings,
            context: BuildContext::default(),
            hooks: Hooks::default(),
            progress: Box::new(SilentProgress),
            state: BuildState::NotStarted,
        }
    }

    pub fn with_context(mut self, context: BuildContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_progress(mut self, progress: impl ProgressReporter + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    /// Run a full or incremental export.
    pub fn export(&mut self, options: &ExportOptions) -> Result<BuildResult, ExportError> {
        self.state = BuildState::NotStarted;
        let result = self.run(options);
        match &result {
            Ok(_) => self.enter(BuildState::Done),
            Err(e) => {
                tracing::debug!(error = %e, "export failed");
                self.enter(BuildState::Failed);
            }
        }
        result
    }

    /// Run an export and write a timing report to `benchmark.txt`.
    pub fn export_benchmark(
        &mut self,
        options: &ExportOptions,
    ) -> Result<(BuildResult, String), ExportError> {
        let started = Instant::now();
        let result = self.export(options)?;
        let report = self.context.profiler.report(started.elapsed());
        fs::create_dir_all(&self.settings.control_dir)?;
        fs::write(self.settings.control_dir.join(BENCHMARK_FILENAME), &report)?;
        Ok((result, report))
    }

    fn enter(&mut self, state: BuildState) {
        tracing::debug!(from = %self.state, to = %state, "export state");
        self.state = state;
    }

    fn run(&mut self, options: &ExportOptions) -> Result<BuildResult, ExportError> {
        let incremental = options.is_incremental();

        let routes = self.source.routes().map_err(ExportError::Routes)?;
        let selected = filter::select(&routes, options.patterns.as_deref())?;
        if selected.is_empty() {
            return Err(ExportError::NoRoutes {
                patterns: options.patterns.clone().unwrap_or_default(),
            });
        }
        if let Some((path, pod_paths)) = paths::collisions(&selected).into_iter().next() {
            return Err(ExportError::DuplicateOutput { path, pod_paths });
        }
        tracing::info!(
            routes = selected.len(),
            total = routes.len(),
            incremental,
            "exporting"
        );

        let previous = BuildManifest::load(&self.settings.control_dir)?;

        self.hooks
            .run_before_build(self)
            .map_err(|source| ExportError::Hook {
                hook: "before_build",
                source,
            })?;

        let staging = match &self.settings.staging_parent {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                tempfile::Builder::new()
                    .prefix("pagepress-")
                    .tempdir_in(parent)?
            }
            None => tempfile::Builder::new().prefix("pagepress-").tempdir()?,
        };
        let created: Vec<CreatedPath<'_>> = selected
            .iter()
            .map(|route| CreatedPath::new(*route, staging.path(), &self.settings.output_dir))
            .collect();
        let bounds = self.settings.concurrency.clone();

        self.enter(BuildState::Staging);
        let log = ArtifactLog::default();
        {
            let _t = self.context.profiler.timer("phase:staging");
            stage::stage_all(
                &created,
                bounds.render,
                &self.context,
                &log,
                self.progress.as_ref(),
            )?;
        }

        self.enter(BuildState::Hashing);
        let hashed = {
            let _t = self.context.profiler.timer("phase:hashing");
            manifest::hash_staged(&created, bounds.hash)?
        };
        let mut metrics = BuildMetrics::from_hashed(&hashed);
        let vcs_info = self
            .settings
            .vcs_root
            .as_deref()
            .map(vcs::current)
            .unwrap_or_default();
        let built_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        let new_manifest = manifest::build_manifest(&hashed, vcs_info.branch, vcs_info.commit, built_at);

        self.enter(BuildState::Diffing);
        let diff = manifest::diff(previous.as_ref(), &new_manifest, incremental);
        tracing::info!(
            adds = diff.adds.len(),
            edits = diff.edits.len(),
            no_changes = diff.no_changes.len(),
            deletes = diff.deletes.len(),
            "diffed against previous manifest"
        );

        self.enter(BuildState::Promoting);
        let artifacts = log.into_inner();
        {
            let _t = self.context.profiler.timer("phase:promoting");
            promote::promote_all(
                &artifacts,
                bounds.promote,
                self.settings.move_threshold,
                self.progress.as_ref(),
            )?;
        }

        self.enter(BuildState::Cleaning);
        let clean = if incremental {
            CleanStats::default()
        } else {
            clean::delete_stale(&self.settings.output_dir, &diff.deletes)
        };
        clean::remove_staging_root(staging)?;

        metrics.add_memory_usage();
        metrics.add_missing_translations(&self.context.translations);

        new_manifest.save(&self.settings.control_dir)?;
        manifest::write_json(&self.settings.control_dir.join(METRICS_FILENAME), &metrics)?;
        self.enter(BuildState::Persisted);

        let result = BuildResult {
            metrics,
            manifest: new_manifest,
            diff,
            clean,
        };
        self.hooks
            .run_after_build(&result)
            .map_err(|source| ExportError::Hook {
                hook: "after_build",
                source,
            })?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{CountingProgress, Phase};
    use crate::route::Route;
    use crate::test_helpers::{MemoryRoute, MemorySource};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn settings(tmp: &TempDir) -> BuildSettings {
        let mut s = BuildSettings::new(tmp.path().join("out"));
        s.staging_parent = Some(tmp.path().join("staging"));
        s
    }

    fn source(routes: Vec<MemoryRoute>) -> MemorySource {
        MemorySource::new(routes)
    }

    #[test]
    fn export_writes_outputs_and_records() {
        let tmp = TempDir::new().unwrap();
        let mut builder = Builder::new(
            source(vec![MemoryRoute::document("/a.md", "/a/", "A")]),
            settings(&tmp),
        );
        let result = builder.export(&ExportOptions::default()).unwrap();

        let out = tmp.path().join("out");
        assert_eq!(fs::read_to_string(out.join("a/index.html")).unwrap(), "A");
        assert!(out.join(".pagepress/manifest.json").exists());
        assert!(out.join(".pagepress/metrics.json").exists());
        assert!(!out.join(".pagepress/benchmark.txt").exists());
        assert_eq!(result.manifest.files.len(), 1);
        assert_eq!(builder.state(), BuildState::Done);
    }

    #[test]
    fn staging_root_removed_on_success() {
        let tmp = TempDir::new().unwrap();
        let mut builder = Builder::new(
            source(vec![MemoryRoute::document("/a.md", "/a/", "A")]),
            settings(&tmp),
        );
        builder.export(&ExportOptions::default()).unwrap();
        let leftovers = fs::read_dir(tmp.path().join("staging")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn staging_root_removed_on_failure() {
        let tmp = TempDir::new().unwrap();
        let mut builder = Builder::new(
            source(vec![
                MemoryRoute::document("/a.md", "/a/", "A"),
                MemoryRoute::failing("/b.md", "/b/", "broken"),
            ]),
            settings(&tmp),
        );
        assert!(builder.export(&ExportOptions::default()).is_err());
        let leftovers = fs::read_dir(tmp.path().join("staging")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn render_failure_aborts_before_promotion() {
        let tmp = TempDir::new().unwrap();
        let mut builder = Builder::new(
            source(vec![
                MemoryRoute::document("/a.md", "/a/", "A"),
                MemoryRoute::failing("/b.md", "/b/", "template exploded"),
            ]),
            settings(&tmp),
        );
        let err = builder.export(&ExportOptions::default()).unwrap_err();

        assert_eq!(err.to_string(), "template exploded");
        assert!(matches!(err, ExportError::Stage(StageError::Render(_))));
        assert_eq!(builder.state(), BuildState::Failed);
        assert!(!tmp.path().join("out/a/index.html").exists());
        assert!(!tmp.path().join("out/.pagepress/manifest.json").exists());
    }

    #[test]
    fn failure_keeps_previous_records() {
        let tmp = TempDir::new().unwrap();
        let routes = vec![MemoryRoute::document("/a.md", "/a/", "A")];
        Builder::new(source(routes), settings(&tmp))
            .export(&ExportOptions::default())
            .unwrap();
        let manifest_path = tmp.path().join("out/.pagepress/manifest.json");
        let before = fs::read_to_string(&manifest_path).unwrap();

        let mut failing = Builder::new(
            source(vec![MemoryRoute::failing("/a.md", "/a/", "nope")]),
            settings(&tmp),
        );
        assert!(failing.export(&ExportOptions::default()).is_err());
        assert_eq!(fs::read_to_string(&manifest_path).unwrap(), before);
        assert_eq!(fs::read_to_string(tmp.path().join("out/a/index.html")).unwrap(), "A");
    }

    #[test]
    fn empty_route_set_fails_without_io() {
        let tmp = TempDir::new().unwrap();
        let mut builder = Builder::new(source(vec![]), settings(&tmp));
        let err = builder.export(&ExportOptions::default()).unwrap_err();
        assert!(matches!(err, ExportError::NoRoutes { .. }));
        assert!(!tmp.path().join("out").exists());
        assert!(!tmp.path().join("staging").exists());
    }

    #[test]
    fn colliding_output_paths_fail_before_staging() {
        let tmp = TempDir::new().unwrap();
        let routes = vec![MemoryRoute::document("/content/blog.md", "/blog/", "old")];
        Builder::new(source(routes), settings(&tmp))
            .export(&ExportOptions::default())
            .unwrap();
        let manifest_path = tmp.path().join("out/.pagepress/manifest.json");
        let before = fs::read_to_string(&manifest_path).unwrap();

        let mut builder = Builder::new(
            source(vec![
                MemoryRoute::document("/content/blog.md", "/blog/", "page"),
                MemoryRoute::document("/content/blog/index.md", "/blog/", "index"),
            ]),
            settings(&tmp),
        );
        let err = builder.export(&ExportOptions::default()).unwrap_err();

        match err {
            ExportError::DuplicateOutput { path, pod_paths } => {
                assert_eq!(path, "blog/index.html");
                assert_eq!(pod_paths, vec!["/content/blog.md", "/content/blog/index.md"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(builder.state(), BuildState::Failed);
        assert_eq!(
            fs::read_to_string(tmp.path().join("out/blog/index.html")).unwrap(),
            "old"
        );
        assert_eq!(fs::read_to_string(&manifest_path).unwrap(), before);
        assert_eq!(fs::read_dir(tmp.path().join("staging")).unwrap().count(), 0);
    }

    #[test]
    fn unmatched_patterns_fail() {
        let tmp = TempDir::new().unwrap();
        let mut builder = Builder::new(
            source(vec![MemoryRoute::document("/a.md", "/a/", "A")]),
            settings(&tmp),
        );
        let err = builder
            .export(&ExportOptions::with_patterns(["/blog/**"]))
            .unwrap_err();
        assert!(matches!(err, ExportError::NoRoutes { ref patterns } if patterns == &["/blog/**"]));
    }

    #[test]
    fn hooks_run_in_order_around_export() {
        let tmp = TempDir::new().unwrap();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let before = Arc::clone(&calls);
        let after = Arc::clone(&calls);
        let hooks = Hooks::new()
            .before_build(move |builder| {
                assert_eq!(builder.state(), BuildState::NotStarted);
                before.lock().unwrap().push("before".to_string());
                Ok(())
            })
            .after_build(move |result| {
                after
                    .lock()
                    .unwrap()
                    .push(format!("after:{}", result.diff.adds.len()));
                Ok(())
            });
        let mut builder = Builder::new(
            source(vec![MemoryRoute::document("/a.md", "/a/", "A")]),
            settings(&tmp),
        )
        .with_hooks(hooks);
        builder.export(&ExportOptions::default()).unwrap();
        assert_eq!(*calls.lock().unwrap(), vec!["before", "after:1"]);
    }

    #[test]
    fn before_build_error_aborts() {
        let tmp = TempDir::new().unwrap();
        let hooks = Hooks::new().before_build(|_| Err("plugin refused".into()));
        let mut builder = Builder::new(
            source(vec![MemoryRoute::document("/a.md", "/a/", "A")]),
            settings(&tmp),
        )
        .with_hooks(hooks);
        let err = builder.export(&ExportOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "before_build hook failed: plugin refused");
        assert!(!tmp.path().join("out/a/index.html").exists());
    }

    #[test]
    fn progress_ticks_once_per_route() {
        let tmp = TempDir::new().unwrap();
        let progress = Arc::new(CountingProgress::default());
        let routes: Vec<MemoryRoute> = (0..5)
            .map(|i| MemoryRoute::document(&format!("/{i}.md"), &format!("/{i}/"), "x"))
            .collect();
        let mut builder = Builder::new(source(routes), settings(&tmp))
            .with_progress(SharedProgress(Arc::clone(&progress)));
        builder.export(&ExportOptions::default()).unwrap();
        assert_eq!(progress.ticks.lock().unwrap()[&Phase::Build], 5);
        // 5 artifacts is below the default move threshold.
        assert!(!progress.ticks.lock().unwrap().contains_key(&Phase::Move));
    }

    #[test]
    fn move_progress_shown_at_threshold() {
        let tmp = TempDir::new().unwrap();
        let progress = Arc::new(CountingProgress::default());
        let mut s = settings(&tmp);
        s.move_threshold = 3;
        let routes: Vec<MemoryRoute> = (0..3)
            .map(|i| MemoryRoute::document(&format!("/{i}.md"), &format!("/{i}/"), "x"))
            .collect();
        let mut builder =
            Builder::new(source(routes), s).with_progress(SharedProgress(Arc::clone(&progress)));
        builder.export(&ExportOptions::default()).unwrap();
        assert_eq!(progress.ticks.lock().unwrap()[&Phase::Move], 3);
    }

    #[test]
    fn missing_translations_reach_metrics() {
        use crate::translations::TranslationCache;
        let tmp = TempDir::new().unwrap();
        let translations = TranslationCache::new("en", &["en".to_string(), "de".to_string()]);
        translations.record_missing("de", "Read more");
        let mut builder = Builder::new(
            source(vec![MemoryRoute::document("/a.md", "/a/", "A")]),
            settings(&tmp),
        )
        .with_context(BuildContext::new(translations));
        let result = builder.export(&ExportOptions::default()).unwrap();
        assert_eq!(result.metrics.missing_translation_count, 1);
        assert_eq!(result.metrics.locale_to_missing_translation_count["de"], 1);
        assert!(result.metrics.memory_usage_bytes > 0 || cfg!(not(target_os = "linux")));
    }

    #[test]
    fn benchmark_export_writes_report() {
        let tmp = TempDir::new().unwrap();
        let mut builder = Builder::new(
            source(vec![MemoryRoute::document("/a.md", "/a/", "A")]),
            settings(&tmp),
        );
        let (_, report) = builder.export_benchmark(&ExportOptions::default()).unwrap();
        let written =
            fs::read_to_string(tmp.path().join("out/.pagepress").join(BENCHMARK_FILENAME))
                .unwrap();
        assert_eq!(written, report);
        assert!(report.contains("phase:staging"));
        assert!(report.contains("/a.md"));
    }

    #[test]
    fn export_options_incremental_only_with_patterns() {
        assert!(!ExportOptions::default().is_incremental());
        assert!(!ExportOptions { patterns: Some(vec![]) }.is_incremental());
        assert!(ExportOptions::with_patterns(["*.md"]).is_incremental());
    }

    #[test]
    fn routes_error_is_reported() {
        struct Broken;
        impl RouteSource for Broken {
            fn routes(&self) -> Result<Vec<Box<dyn Route>>, RenderError> {
                Err("pod root missing".into())
            }
        }
        let tmp = TempDir::new().unwrap();
        let err = Builder::new(Broken, settings(&tmp))
            .export(&ExportOptions::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "failed to list routes: pod root missing");
    }

    /// Lets a test keep a handle on the reporter the builder owns.
    struct SharedProgress(Arc<CountingProgress>);

    impl ProgressReporter for SharedProgress {
        fn start(&self, phase: Phase, total: usize) {
            self.0.start(phase, total);
        }
        fn tick(&self, phase: Phase) {
            self.0.tick(phase);
        }
        fn finish(&self, phase: Phase) {
            self.0.finish(phase);
        }
    }
}
