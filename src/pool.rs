//! Bounded-concurrency execution for pipeline phases.
//!
//! Each phase gets its own rayon pool sized `min(bound, tasks)`, so the
//! bound is a hard ceiling on tasks in flight. The pool is further capped
//! at [`THREADS_PER_CORE`] threads per available core: I/O phases with a
//! bound of 2000 would otherwise spawn 2000 OS threads. The first task error stops
//! the phase: rayon's `try_for_each` short-circuits, tasks not yet started
//! are skipped, and tasks already running finish before the error returns.

use rayon::prelude::*;

pub const THREADS_PER_CORE: usize = 16;

/// Most threads any single phase may start on this machine.
pub fn thread_ceiling() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cores * THREADS_PER_CORE
}

/// Worker count for a phase: never more than the bound, the number of
/// tasks, or the thread ceiling; never zero.
pub fn effective_workers(bound: usize, tasks: usize) -> usize {
    bound.min(tasks).min(thread_ceiling()).max(1)
}

/// Run `task` over every item with at most `bound` tasks in flight.
///
/// Returns the first error encountered. `E` must be able to absorb a pool
/// construction failure.
pub fn run_bounded<T, E, F>(bound: usize, items: &[T], task: F) -> Result<(), E>
where
    T: Sync,
    E: Send + From<rayon::ThreadPoolBuildError>,
    F: Fn(&T) -> Result<(), E> + Sync + Send,
{
    if items.is_empty() {
        return Ok(());
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(effective_workers(bound, items.len()))
        .build()?;
    pool.install(|| items.par_iter().try_for_each(&task))
}

/// Like [`run_bounded`], collecting one output per item. Output order is
/// not significant to callers.
pub fn map_bounded<T, R, E, F>(bound: usize, items: &[T], task: F) -> Result<Vec<R>, E>
where
    T: Sync,
    R: Send,
    E: Send + From<rayon::ThreadPoolBuildError>,
    F: Fn(&T) -> Result<R, E> + Sync + Send,
{
    if items.is_empty() {
        return Ok(Vec::new());
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(effective_workers(bound, items.len()))
        .build()?;
    pool.install(|| items.par_iter().map(&task).collect())
}
