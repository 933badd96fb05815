//! Progress reporting for the two long-running phases.
//!
//! The builder talks to a [`ProgressReporter`]; the CLI plugs in
//! [`TerminalProgress`] (indicatif bars) and tests use [`SilentProgress`].
//! Ticks arrive from worker threads, so implementations must be `Sync`.

use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Staging: render or copy every selected route.
    Build,
    /// Promotion: move staged files into the output directory.
    Move,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Build => "Building",
            Phase::Move => "Moving",
        }
    }
}

pub trait ProgressReporter: Send + Sync {
    fn start(&self, phase: Phase, total: usize);
    /// One unit of `phase` finished (successfully or not).
    fn tick(&self, phase: Phase);
    fn finish(&self, phase: Phase);
}

/// No-op reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn start(&self, _phase: Phase, _total: usize) {}
    fn tick(&self, _phase: Phase) {}
    fn finish(&self, _phase: Phase) {}
}

/// Terminal progress bars, one per phase.
#[derive(Default)]
pub struct TerminalProgress {
    bars: Mutex<HashMap<Phase, ProgressBar>>,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template("{msg:>9} [{bar:40.cyan/blue}] {pos}/{len} ({elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ")
    }

    fn with_bar(&self, phase: Phase, f: impl FnOnce(&ProgressBar)) {
        if let Ok(bars) = self.bars.lock()
            && let Some(bar) = bars.get(&phase)
        {
            f(bar);
        }
    }
}

impl ProgressReporter for TerminalProgress {
    fn start(&self, phase: Phase, total: usize) {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(Self::style());
        bar.set_message(phase.label());
        if let Ok(mut bars) = self.bars.lock() {
            bars.insert(phase, bar);
        }
    }

    fn tick(&self, phase: Phase) {
        self.with_bar(phase, |bar| bar.inc(1));
    }

    fn finish(&self, phase: Phase) {
        if let Ok(mut bars) = self.bars.lock()
            && let Some(bar) = bars.remove(&phase)
        {
            bar.finish_and_clear();
        }
    }
}

/// Reporter that counts calls, for asserting builder behavior.
#[cfg(test)]
#[derive(Default)]
pub struct CountingProgress {
    pub started: Mutex<Vec<(Phase, usize)>>,
    pub ticks: Mutex<HashMap<Phase, usize>>,
    pub finished: Mutex<Vec<Phase>>,
}

#[cfg(test)]
impl ProgressReporter for CountingProgress {
    fn start(&self, phase: Phase, total: usize) {
        self.started.lock().unwrap().push((phase, total));
    }

    fn tick(&self, phase: Phase) {
        *self.ticks.lock().unwrap().entry(phase).or_default() += 1;
    }

    fn finish(&self, phase: Phase) {
        self.finished.lock().unwrap().push(phase);
    }
}
