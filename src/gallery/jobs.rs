//! Background load jobs.
//!
//! A [`LoadPool`] runs stack load jobs on a small rayon pool. Which stacks
//! already have a job queued or running is tracked separately from the
//! pool's queue, in a [`JobTracker`], so a refresh can ask "is this stack
//! already being worked on?" without touching the queue.
//!
//! Job lifecycle:
//!
//! ```text
//! submit ─► claim path ─► queue ─► run_load_job ─► notify StackLoaded ─► release path
//! ```
//!
//! The claim is released after the notification is queued, so once
//! [`JobTracker::wait_idle`] returns every finished job's notification is
//! already on its way to observers.

use super::observers::{GalleryChange, Notifier};
use crate::imaging::ThumbnailDecoder;
use crate::stack::{LoadOutcome, Stack};
use parking_lot::{Condvar, Mutex};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Upper bound on load workers.
pub const MAX_WORKERS: usize = 4;

/// Stack paths with a load job queued or running.
#[derive(Default)]
pub(crate) struct JobTracker {
    in_flight: Mutex<HashSet<PathBuf>>,
    idle: Condvar,
}

/// Marks a stack path as in flight until dropped.
///
/// Dropping releases the claim even if the job panics.
pub(crate) struct Claim {
    tracker: Arc<JobTracker>,
    path: PathBuf,
}

impl JobTracker {
    /// Claim `path`, or `None` if a job for it is already outstanding.
    pub(crate) fn try_claim(self: &Arc<Self>, path: &Path) -> Option<Claim> {
        let inserted = self.in_flight.lock().insert(path.to_path_buf());
        inserted.then(|| Claim {
            tracker: Arc::clone(self),
            path: path.to_path_buf(),
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Block until nothing is in flight or `timeout` elapses. Returns whether idle.
    pub(crate) fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut in_flight = self.in_flight.lock();
        while !in_flight.is_empty() {
            if self.idle.wait_until(&mut in_flight, deadline).timed_out() {
                return in_flight.is_empty();
            }
        }
        true
    }

    fn release(&self, path: &Path) {
        let mut in_flight = self.in_flight.lock();
        in_flight.remove(path);
        if in_flight.is_empty() {
            self.idle.notify_all();
        }
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.tracker.release(&self.path);
    }
}

/// Bounded worker pool running stack load jobs.
pub(crate) struct LoadPool {
    pool: rayon::ThreadPool,
    tracker: Arc<JobTracker>,
    decoder: Arc<dyn ThumbnailDecoder>,
    notifier: Notifier,
}

impl LoadPool {
    /// Build a pool of `workers` threads, clamped to `1..=MAX_WORKERS`.
    pub(crate) fn new(
        workers: usize,
        decoder: Arc<dyn ThumbnailDecoder>,
        notifier: Notifier,
    ) -> Result<Self, rayon::ThreadPoolBuildError> {
        let workers = workers.clamp(1, MAX_WORKERS);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("gallery-worker-{i}"))
            .panic_handler(|_| tracing::error!("stack load job panicked"))
            .build()?;
        tracing::debug!(workers, "load pool started");
        Ok(Self {
            pool,
            tracker: Arc::default(),
            decoder,
            notifier,
        })
    }

    /// Queue a load job for `stack` unless one is already outstanding.
    ///
    /// Returns whether a job was queued.
    pub(crate) fn submit(&self, stack: Arc<Stack>) -> bool {
        let Some(claim) = self.tracker.try_claim(stack.index_path()) else {
            tracing::trace!(stack = %stack.name(), "load job already outstanding");
            return false;
        };
        tracing::debug!(stack = %stack.name(), images = stack.image_count(), "queueing load job");

        let decoder = Arc::clone(&self.decoder);
        let notifier = self.notifier.clone();
        self.pool.spawn(move || {
            let outcome = stack.run_load_job(decoder.as_ref());
            tracing::debug!(stack = %stack.name(), ?outcome, "load job finished");
            notifier.notify(GalleryChange::StackLoaded {
                index_path: stack.index_path().to_path_buf(),
                complete: outcome == LoadOutcome::Complete,
            });
            drop(claim);
        });
        true
    }

    pub(crate) fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    pub(crate) fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }
}
