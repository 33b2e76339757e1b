//! The gallery synchronizer.
//!
//! A [`Gallery`] keeps an ordered list of [`Stack`]s in step with the index
//! files on disk, loads their thumbnails in the background, and tells
//! observers when something changed.
//!
//! ## Reconciliation
//!
//! [`Gallery::refresh`] lists `img_####.xml` files in the gallery directory,
//! drops stacks whose file went away, parses and inserts new ones, then
//! queues a load job for every stack that is not fully loaded and has no
//! job outstanding. Stacks are kept in descending file-name order, newest
//! capture first.
//!
//! A refresh that removed stacks sends one [`GalleryChange::StacksRemoved`],
//! then one [`GalleryChange::StacksAdded`] if it inserted any, both before
//! load jobs are queued. Each finished job sends its own
//! [`GalleryChange::StackLoaded`].
//!
//! Refreshes are serialized. Index files are parsed while holding only the
//! refresh lock, so readers of the stack list never wait on file I/O.
//!
//! ## Threads
//!
//! | Context | Runs |
//! |---|---|
//! | caller | `refresh`, `delete_stack`, accessors |
//! | `gallery-worker-N` | stack load jobs (decode + histogram) |
//! | `gallery-notify` | every observer callback, one at a time |
//!
//! Dropping the gallery drains queued notifications and stops the
//! notification thread. Load jobs still running finish on their own; their
//! notifications go nowhere.

mod jobs;
pub mod observers;

pub use jobs::MAX_WORKERS;
pub use observers::{GalleryChange, GalleryObserver, NOTIFY_THREAD_NAME, ObserverError};

use crate::config::{GalleryConfig, effective_workers};
use crate::imaging::{RustDecoder, ThumbnailDecoder};
use crate::naming::is_stack_file_name;
use crate::stack::{RemovalSummary, Stack, StackError};
use jobs::LoadPool;
use observers::{NotificationThread, Notifier, ObserverRegistry, spawn_notifier};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("Failed to start load workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Failed to start notification thread: {0}")]
    NotifyThread(#[from] std::io::Error),
    #[error("No stack at position {0}")]
    NoSuchStack(usize),
}

/// Called by whoever writes into the gallery directory after it changed.
pub trait FileSystemChangeListener {
    fn on_file_system_change(&self);
}

/// What one [`Gallery::refresh`] did.
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub added: usize,
    pub removed: usize,
    /// Index files that failed to parse; they are retried on the next refresh.
    pub skipped: Vec<StackError>,
    /// Load jobs queued by this refresh.
    pub scheduled: usize,
}

impl RefreshReport {
    pub fn changed(&self) -> bool {
        self.added > 0 || self.removed > 0
    }
}

#[derive(Default)]
struct State {
    /// Descending by index path.
    stacks: Vec<Arc<Stack>>,
    known: HashSet<PathBuf>,
}

/// Ordered, background-loaded view of the stacks in one directory.
pub struct Gallery {
    dir: PathBuf,
    state: Mutex<State>,
    refresh_lock: Mutex<()>,
    observers: Arc<ObserverRegistry>,
    notifier: Notifier,
    pool: LoadPool,
    // Dropped last: drains notifications queued by everything above.
    _notify_thread: NotificationThread,
}

impl Gallery {
    /// Open the gallery described by `config`, decoding with the `image` crate.
    ///
    /// Nothing is read from disk until the first [`refresh`](Self::refresh).
    pub fn open(config: &GalleryConfig) -> Result<Self, GalleryError> {
        Self::with_decoder(
            &config.gallery.dir,
            effective_workers(&config.processing),
            Arc::new(RustDecoder::new()),
        )
    }

    /// Open a gallery over `dir` with `workers` load threads and the given decoder.
    pub fn with_decoder(
        dir: impl Into<PathBuf>,
        workers: usize,
        decoder: Arc<dyn ThumbnailDecoder>,
    ) -> Result<Self, GalleryError> {
        let observers = Arc::new(ObserverRegistry::default());
        let (notifier, notify_thread) = spawn_notifier(Arc::clone(&observers))?;
        let pool = LoadPool::new(workers, decoder, notifier.clone())?;
        Ok(Self {
            dir: dir.into(),
            state: Mutex::new(State::default()),
            refresh_lock: Mutex::new(()),
            observers,
            notifier,
            pool,
            _notify_thread: notify_thread,
        })
    }

    pub fn gallery_dir(&self) -> &Path {
        &self.dir
    }

    pub fn worker_count(&self) -> usize {
        self.pool.workers()
    }

    /// Bring the stack list in line with the directory and queue load jobs.
    ///
    /// Concurrent callers wait for each other. Never decodes on the calling thread.
    pub fn refresh(&self) -> RefreshReport {
        let _serial = self.refresh_lock.lock();
        let discovered = list_stack_files(&self.dir);
        let present: HashSet<&Path> = discovered.iter().map(PathBuf::as_path).collect();
        let mut report = RefreshReport::default();

        {
            let mut state = self.state.lock();
            let before = state.stacks.len();
            state
                .stacks
                .retain(|stack| present.contains(stack.index_path()));
            state.known.retain(|path| present.contains(path.as_path()));
            report.removed = before - state.stacks.len();
        }

        for path in discovered.iter().rev() {
            if self.state.lock().known.contains(path) {
                continue;
            }
            match Stack::open(path, &self.dir) {
                Ok(stack) => {
                    let mut state = self.state.lock();
                    let at = state
                        .stacks
                        .partition_point(|s| s.index_path() > path.as_path());
                    state.stacks.insert(at, Arc::new(stack));
                    state.known.insert(path.clone());
                    report.added += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable stack");
                    report.skipped.push(e);
                }
            }
        }

        if report.removed > 0 {
            self.notifier.notify(GalleryChange::StacksRemoved {
                count: report.removed,
            });
        }
        if report.added > 0 {
            self.notifier.notify(GalleryChange::StacksAdded {
                count: report.added,
            });
        }

        let incomplete: Vec<Arc<Stack>> = self
            .state
            .lock()
            .stacks
            .iter()
            .filter(|stack| !stack.is_load_complete())
            .cloned()
            .collect();
        for stack in incomplete {
            if self.pool.submit(stack) {
                report.scheduled += 1;
            }
        }

        if report.changed() {
            tracing::info!(
                dir = %self.dir.display(),
                added = report.added,
                removed = report.removed,
                skipped = report.skipped.len(),
                scheduled = report.scheduled,
                "gallery refreshed"
            );
        } else {
            tracing::debug!(
                dir = %self.dir.display(),
                skipped = report.skipped.len(),
                scheduled = report.scheduled,
                "gallery unchanged"
            );
        }
        report
    }

    pub fn stack_count(&self) -> usize {
        self.state.lock().stacks.len()
    }

    /// Stack at position `index`, newest first.
    pub fn stack(&self, index: usize) -> Option<Arc<Stack>> {
        self.state.lock().stacks.get(index).cloned()
    }

    /// Snapshot of the current stack list.
    pub fn stacks(&self) -> Vec<Arc<Stack>> {
        self.state.lock().stacks.clone()
    }

    /// Position and handle of the stack whose index file is named `name`.
    pub fn find_stack(&self, name: &str) -> Option<(usize, Arc<Stack>)> {
        let state = self.state.lock();
        state
            .stacks
            .iter()
            .position(|stack| stack.index_path().file_name().is_some_and(|n| n == name))
            .map(|at| (at, Arc::clone(&state.stacks[at])))
    }

    /// Delete the files of the stack at `index`, then refresh.
    ///
    /// Not guarded against the stack being replaced between lookup and deletion.
    pub fn delete_stack(&self, index: usize) -> Result<RemovalSummary, GalleryError> {
        let stack = self.stack(index).ok_or(GalleryError::NoSuchStack(index))?;
        let summary = stack.remove_from_file_system();
        tracing::info!(
            stack = %stack.name(),
            removed = summary.removed,
            missing = summary.missing,
            failed = summary.failed.len(),
            "stack deleted"
        );
        self.refresh();
        Ok(summary)
    }

    pub fn add_observer(&self, observer: Arc<dyn GalleryObserver>) -> Result<(), ObserverError> {
        self.observers.add(observer)
    }

    pub fn remove_observer(&self, observer: &Arc<dyn GalleryObserver>) -> Result<(), ObserverError> {
        self.observers.remove(observer)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Load jobs queued or running.
    pub fn pending_jobs(&self) -> usize {
        self.pool.tracker().len()
    }

    /// Block until no load job is outstanding or `timeout` elapses. Returns whether idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.pool.tracker().wait_idle(timeout)
    }

    /// Block until every notification queued so far has reached the observers.
    ///
    /// Returns `false` on timeout.
    pub fn sync_notifications(&self, timeout: Duration) -> bool {
        self.notifier.flush(timeout)
    }
}

impl FileSystemChangeListener for Gallery {
    fn on_file_system_change(&self) {
        self.refresh();
    }
}

/// Index files in `dir`, sorted ascending. A missing or unreadable directory is empty.
pub fn list_stack_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "gallery directory not listable");
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_str().is_some_and(is_stack_file_name))
        .map(|entry| entry.path())
        .collect();
    files.sort();
    tracing::debug!(dir = %dir.display(), count = files.len(), "listed stack files");
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::decoder::tests::MockDecoder;
    use crate::test_helpers::*;
    use image::RgbImage;
    use std::thread;
    use tempfile::TempDir;

    const WAIT: Duration = Duration::from_secs(10);

    fn names(gallery: &Gallery) -> Vec<String> {
        gallery.stacks().iter().map(|s| s.name()).collect()
    }

    fn mock_gallery(dir: &Path, decoder: Arc<MockDecoder>) -> Gallery {
        Gallery::with_decoder(dir, 2, decoder).unwrap()
    }

    /// Mock decoder that decodes every thumbnail of the given stacks.
    fn decoder_for(dir: &Path, stacks: &[(u32, u32)]) -> MockDecoder {
        let decoder = MockDecoder::new();
        for &(id, count) in stacks {
            for seq in 0..count {
                decoder.insert_image(
                    dir.join(crate::naming::thumbnail_file_name(id, seq)),
                    RgbImage::new(2, 2),
                );
            }
        }
        decoder
    }

    #[test]
    fn list_stack_files_filters_and_sorts() {
        let tmp = TempDir::new().unwrap();
        write_stack(tmp.path(), 3, 1);
        write_stack(tmp.path(), 1, 1);
        std::fs::write(tmp.path().join("img_12.xml"), "").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "").unwrap();
        std::fs::write(tmp.path().join("thumb_0001_00.jpg"), "").unwrap();

        let files: Vec<String> = list_stack_files(tmp.path())
            .iter()
            .map(|p| file_name(p))
            .collect();
        assert_eq!(files, vec!["img_0001.xml", "img_0003.xml"]);
    }

    #[test]
    fn list_stack_files_of_missing_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(list_stack_files(&tmp.path().join("absent")).is_empty());
    }

    #[test]
    fn refresh_orders_stacks_newest_first() {
        let tmp = TempDir::new().unwrap();
        for id in [1, 3, 2] {
            write_stack(tmp.path(), id, 1);
        }
        let decoder = Arc::new(decoder_for(tmp.path(), &[(1, 1), (2, 1), (3, 1)]));
        let gallery = mock_gallery(tmp.path(), decoder);

        let report = gallery.refresh();
        assert_eq!(report.added, 3);
        assert_eq!(report.removed, 0);
        assert_eq!(report.scheduled, 3);
        assert_eq!(names(&gallery), vec!["img_0003.xml", "img_0002.xml", "img_0001.xml"]);

        assert!(gallery.wait_idle(WAIT));
        assert!(gallery.stacks().iter().all(|s| s.is_load_complete()));
    }

    #[test]
    fn order_holds_across_inserts_and_removals() {
        let tmp = TempDir::new().unwrap();
        let gallery = mock_gallery(tmp.path(), Arc::new(MockDecoder::new()));

        write_stack(tmp.path(), 5, 0);
        write_stack(tmp.path(), 2, 0);
        gallery.refresh();

        write_stack(tmp.path(), 4, 0);
        write_stack(tmp.path(), 1, 0);
        std::fs::remove_file(tmp.path().join("img_0005.xml")).unwrap();
        let report = gallery.refresh();
        assert_eq!((report.added, report.removed), (2, 1));
        assert_eq!(names(&gallery), vec!["img_0004.xml", "img_0002.xml", "img_0001.xml"]);

        write_stack(tmp.path(), 3, 0);
        write_stack(tmp.path(), 9, 0);
        gallery.refresh();
        assert_eq!(
            names(&gallery),
            vec![
                "img_0009.xml",
                "img_0004.xml",
                "img_0003.xml",
                "img_0002.xml",
                "img_0001.xml"
            ]
        );
    }

    #[test]
    fn unchanged_directory_refresh_is_a_no_op() {
        let tmp = TempDir::new().unwrap();
        write_stack(tmp.path(), 1, 1);
        let decoder = Arc::new(decoder_for(tmp.path(), &[(1, 1)]));
        let gallery = mock_gallery(tmp.path(), decoder.clone());

        gallery.refresh();
        assert!(gallery.wait_idle(WAIT));
        let first = gallery.stack(0).unwrap();

        let report = gallery.refresh();
        assert!(!report.changed());
        assert_eq!(report.scheduled, 0, "complete stacks are not rescheduled");
        assert!(Arc::ptr_eq(&first, &gallery.stack(0).unwrap()));
        assert_eq!(decoder.call_count(), 1);
    }

    #[test]
    fn back_to_back_refreshes_queue_one_job_per_stack() {
        let tmp = TempDir::new().unwrap();
        write_stack(tmp.path(), 1, 1);
        let decoder = Arc::new(MockDecoder::gated());
        decoder.insert_image(
            tmp.path().join(crate::naming::thumbnail_file_name(1, 0)),
            RgbImage::new(2, 2),
        );
        let gallery = mock_gallery(tmp.path(), decoder.clone());

        assert_eq!(gallery.refresh().scheduled, 1);
        assert_eq!(gallery.refresh().scheduled, 0);
        assert_eq!(gallery.refresh().scheduled, 0);
        assert_eq!(gallery.pending_jobs(), 1);

        decoder.open_gate();
        assert!(gallery.wait_idle(WAIT));
        assert_eq!(decoder.call_count(), 1);
        assert_eq!(gallery.pending_jobs(), 0);
        assert!(gallery.stack(0).unwrap().is_load_complete());
    }

    #[test]
    fn unparseable_index_is_skipped_and_retried() {
        crate::logging::init_test_tracing();
        let tmp = TempDir::new().unwrap();
        write_stack(tmp.path(), 1, 0);
        let bad = tmp.path().join("img_0002.xml");
        std::fs::write(&bad, "<imagestack><image name=").unwrap();
        let gallery = mock_gallery(tmp.path(), Arc::new(MockDecoder::new()));

        let report = gallery.refresh();
        assert_eq!(report.added, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(names(&gallery), vec!["img_0001.xml"]);

        // Writer finishes the file: the next refresh picks it up
        write_stack(tmp.path(), 2, 0);
        let report = gallery.refresh();
        assert_eq!(report.added, 1);
        assert!(report.skipped.is_empty());
        assert_eq!(names(&gallery), vec!["img_0002.xml", "img_0001.xml"]);
    }

    #[test]
    fn failed_decode_is_resubmitted_on_next_refresh() {
        crate::logging::init_test_tracing();
        let tmp = TempDir::new().unwrap();
        write_stack(tmp.path(), 1, 2);
        let decoder = Arc::new(decoder_for(tmp.path(), &[(1, 1)]));
        let gallery = mock_gallery(tmp.path(), decoder.clone());

        gallery.refresh();
        assert!(gallery.wait_idle(WAIT));
        let stack = gallery.stack(0).unwrap();
        assert!(!stack.is_load_complete());
        assert!(stack.images()[0].is_loaded());
        assert!(!stack.images()[1].is_loaded());

        decoder.insert_image(
            tmp.path().join(crate::naming::thumbnail_file_name(1, 1)),
            RgbImage::new(2, 2),
        );
        assert_eq!(gallery.refresh().scheduled, 1);
        assert!(gallery.wait_idle(WAIT));
        assert!(stack.is_load_complete());
        // frame 0 once, frame 1 twice
        assert_eq!(decoder.call_count(), 3);
    }

    #[test]
    fn find_and_delete_stack() {
        let tmp = TempDir::new().unwrap();
        write_stack_with_thumbnails(tmp.path(), 1, 1);
        write_stack_with_thumbnails(tmp.path(), 2, 1);
        let gallery = mock_gallery(tmp.path(), Arc::new(MockDecoder::new()));
        gallery.refresh();

        let (at, stack) = gallery.find_stack("img_0001.xml").unwrap();
        assert_eq!(at, 1);
        assert_eq!(stack.name(), "img_0001.xml");
        assert!(gallery.find_stack("img_0007.xml").is_none());

        let summary = gallery.delete_stack(at).unwrap();
        assert_eq!(summary.removed, 2);
        assert_eq!(summary.missing, 1);
        assert_eq!(names(&gallery), vec!["img_0002.xml"]);
        assert!(!tmp.path().join("img_0001.xml").exists());
    }

    #[test]
    fn delete_out_of_range_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let gallery = mock_gallery(tmp.path(), Arc::new(MockDecoder::new()));
        assert!(matches!(
            gallery.delete_stack(0),
            Err(GalleryError::NoSuchStack(0))
        ));
    }

    #[test]
    fn file_system_change_runs_refresh() {
        let tmp = TempDir::new().unwrap();
        let gallery = mock_gallery(tmp.path(), Arc::new(MockDecoder::new()));
        write_stack(tmp.path(), 1, 0);

        gallery.on_file_system_change();
        assert_eq!(gallery.stack_count(), 1);
    }

    #[test]
    fn removal_notification_arrives_on_notify_thread() {
        let tmp = TempDir::new().unwrap();
        write_stack(tmp.path(), 1, 0);
        write_stack(tmp.path(), 2, 0);
        let gallery = mock_gallery(tmp.path(), Arc::new(MockDecoder::new()));
        let recorder = Arc::new(RecordingObserver::default());
        gallery.add_observer(recorder.clone()).unwrap();

        gallery.refresh();
        assert!(gallery.wait_idle(WAIT));
        std::fs::remove_file(tmp.path().join("img_0001.xml")).unwrap();
        gallery.refresh();
        assert!(gallery.sync_notifications(WAIT));

        let changes = recorder.changes();
        let removals: Vec<_> = changes
            .iter()
            .filter(|c| matches!(c, GalleryChange::StacksRemoved { .. }))
            .collect();
        assert_eq!(removals, vec![&GalleryChange::StacksRemoved { count: 1 }]);
        assert!(
            recorder
                .threads()
                .iter()
                .all(|name| name.as_deref() == Some(NOTIFY_THREAD_NAME))
        );
        assert_ne!(
            thread::current().name(),
            Some(NOTIFY_THREAD_NAME),
            "test thread is not the notify thread"
        );
    }

    #[test]
    fn added_stacks_notify_before_loading() {
        let tmp = TempDir::new().unwrap();
        write_stack(tmp.path(), 1, 1);
        let decoder = Arc::new(MockDecoder::gated());
        decoder.insert_image(
            tmp.path().join(crate::naming::thumbnail_file_name(1, 0)),
            RgbImage::new(2, 2),
        );
        let gallery = mock_gallery(tmp.path(), decoder.clone());
        let recorder = Arc::new(RecordingObserver::default());
        gallery.add_observer(recorder.clone()).unwrap();

        assert_eq!(gallery.refresh().added, 1);
        assert!(gallery.sync_notifications(WAIT));
        assert_eq!(gallery.pending_jobs(), 1, "decode is still held");
        assert_eq!(
            recorder.changes(),
            vec![GalleryChange::StacksAdded { count: 1 }]
        );

        decoder.open_gate();
        assert!(gallery.wait_idle(WAIT));
        gallery.refresh();
        assert!(gallery.sync_notifications(WAIT));
        assert_eq!(
            recorder.changes(),
            vec![
                GalleryChange::StacksAdded { count: 1 },
                GalleryChange::StackLoaded {
                    index_path: tmp.path().join("img_0001.xml"),
                    complete: true,
                },
            ],
            "an unchanged refresh adds nothing"
        );
    }

    #[test]
    fn removal_is_announced_before_additions() {
        let tmp = TempDir::new().unwrap();
        write_stack(tmp.path(), 1, 0);
        let gallery = mock_gallery(tmp.path(), Arc::new(MockDecoder::new()));
        gallery.refresh();
        let recorder = Arc::new(RecordingObserver::default());
        gallery.add_observer(recorder.clone()).unwrap();

        std::fs::remove_file(tmp.path().join("img_0001.xml")).unwrap();
        write_stack(tmp.path(), 2, 0);
        write_stack(tmp.path(), 3, 0);
        gallery.refresh();
        assert!(gallery.sync_notifications(WAIT));

        let structural: Vec<GalleryChange> = recorder
            .changes()
            .into_iter()
            .filter(|c| !matches!(c, GalleryChange::StackLoaded { .. }))
            .collect();
        assert_eq!(
            structural,
            vec![
                GalleryChange::StacksRemoved { count: 1 },
                GalleryChange::StacksAdded { count: 2 },
            ]
        );
    }

    #[test]
    fn only_changing_refreshes_log_at_info() {
        let tmp = TempDir::new().unwrap();
        write_stack(tmp.path(), 1, 0);
        let gallery = mock_gallery(tmp.path(), Arc::new(MockDecoder::new()));

        let (report, logged) = capture_logs(tracing::Level::INFO, || gallery.refresh());
        assert!(report.changed());
        assert!(logged.contains("gallery refreshed"), "{logged}");

        let (report, logged) = capture_logs(tracing::Level::INFO, || gallery.refresh());
        assert!(!report.changed());
        assert!(logged.is_empty(), "{logged}");

        let (_, logged) = capture_logs(tracing::Level::DEBUG, || gallery.refresh());
        assert!(logged.contains("gallery unchanged"), "{logged}");
    }

    #[test]
    fn observers_can_be_added_and_removed() {
        let tmp = TempDir::new().unwrap();
        let gallery = mock_gallery(tmp.path(), Arc::new(MockDecoder::new()));
        let observer: Arc<dyn GalleryObserver> = Arc::new(RecordingObserver::default());

        gallery.add_observer(Arc::clone(&observer)).unwrap();
        assert_eq!(
            gallery.add_observer(Arc::clone(&observer)).unwrap_err(),
            ObserverError::AlreadyRegistered
        );
        assert_eq!(gallery.observer_count(), 1);
        gallery.remove_observer(&observer).unwrap();
        assert_eq!(
            gallery.remove_observer(&observer).unwrap_err(),
            ObserverError::NotRegistered
        );
    }

    #[test]
    fn workers_are_clamped() {
        let tmp = TempDir::new().unwrap();
        let many = Gallery::with_decoder(tmp.path(), 64, Arc::new(MockDecoder::new())).unwrap();
        assert_eq!(many.worker_count(), MAX_WORKERS);
        let none = Gallery::with_decoder(tmp.path(), 0, Arc::new(MockDecoder::new())).unwrap();
        assert_eq!(none.worker_count(), 1);
    }
}
