//! Render and phase timing, and the `benchmark.txt` report built from it.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Label prefix for per-route render timers.
pub const RENDER_PREFIX: &str = "render:";

/// Number of slowest renders listed in the benchmark report.
const SLOWEST_RENDERS: usize = 10;

#[derive(Default)]
pub struct Profiler {
    timers: Mutex<HashMap<String, Duration>>,
}

/// A running timer. Records its elapsed time into the profiler when
/// dropped, so it is recorded on both success and error paths.
pub struct Timer<'a> {
    profiler: &'a Profiler,
    label: String,
    started: Instant,
}

impl Drop for Timer<'_> {
    fn drop(&mut self) {
        self.profiler
            .record(std::mem::take(&mut self.label), self.started.elapsed());
    }
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timer(&self, label: impl Into<String>) -> Timer<'_> {
        Timer {
            profiler: self,
            label: label.into(),
            started: Instant::now(),
        }
    }

    /// Add `elapsed` to the total for `label`.
    pub fn record(&self, label: String, elapsed: Duration) {
        tracing::trace!(label = %label, elapsed_ms = elapsed.as_millis() as u64, "timer");
        if let Ok(mut timers) = self.timers.lock() {
            *timers.entry(label).or_default() += elapsed;
        }
    }

    pub fn get(&self, label: &str) -> Option<Duration> {
        self.timers.lock().ok()?.get(label).copied()
    }

    /// All timers, longest first.
    pub fn sorted(&self) -> Vec<(String, Duration)> {
        let mut entries: Vec<(String, Duration)> = self
            .timers
            .lock()
            .map(|t| t.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries
    }

    /// Plain-text benchmark report: phase timers, then the slowest renders.
    pub fn report(&self, total: Duration) -> String {
        let entries = self.sorted();
        let mut out = String::new();
        let _ = writeln!(out, "total: {}", format_duration(total));
        out.push_str("\nphases\n");
        for (label, elapsed) in entries.iter().filter(|(l, _)| !l.starts_with(RENDER_PREFIX)) {
            let _ = writeln!(out, "  {label}: {}", format_duration(*elapsed));
        }
        let renders: Vec<_> = entries
            .iter()
            .filter(|(l, _)| l.starts_with(RENDER_PREFIX))
            .collect();
        if !renders.is_empty() {
            let _ = writeln!(out, "\nslowest renders ({} total)", renders.len());
            for (label, elapsed) in renders.iter().take(SLOWEST_RENDERS) {
                let pod_path = &label[RENDER_PREFIX.len()..];
                let _ = writeln!(out, "  {pod_path}: {}", format_duration(*elapsed));
            }
        }
        out
    }
}

fn format_duration(d: Duration) -> String {
    format!("{:.3}ms", d.as_secs_f64() * 1000.0)
}
