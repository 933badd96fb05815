//! Lifecycle hooks around an export.
//!
//! Hooks are plain optional function values. An absent hook is skipped; a
//! present one is called and awaited before the build continues. A hook
//! error aborts the export.

use crate::builder::{BuildResult, Builder};

pub type HookError = Box<dyn std::error::Error + Send + Sync>;

pub type BeforeBuild = Box<dyn Fn(&Builder) -> Result<(), HookError> + Send + Sync>;
pub type AfterBuild = Box<dyn Fn(&BuildResult) -> Result<(), HookError> + Send + Sync>;

#[derive(Default)]
pub struct Hooks {
    pub before_build: Option<BeforeBuild>,
    pub after_build: Option<AfterBuild>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before_build(
        mut self,
        hook: impl Fn(&Builder) -> Result<(), HookError> + Send + Sync + 'static,
    ) -> Self {
        self.before_build = Some(Box::new(hook));
        self
    }

    pub fn after_build(
        mut self,
        hook: impl Fn(&BuildResult) -> Result<(), HookError> + Send + Sync + 'static,
    ) -> Self {
        self.after_build = Some(Box::new(hook));
        self
    }

    pub(crate) fn run_before_build(&self, builder: &Builder) -> Result<(), HookError> {
        match &self.before_build {
            Some(hook) => hook(builder),
            None => Ok(()),
        }
    }

    pub(crate) fn run_after_build(&self, result: &BuildResult) -> Result<(), HookError> {
        match &self.after_build {
            Some(hook) => hook(result),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("before_build", &self.before_build.is_some())
            .field("after_build", &self.after_build.is_some())
            .finish()
    }
}
