//! Change observers and the thread that notifies them.
//!
//! Every change notification, whichever thread produced it, is queued on a
//! channel and delivered by one dedicated thread named
//! [`NOTIFY_THREAD_NAME`]. Observers are therefore never called from a
//! worker, and never called concurrently with each other.
//!
//! Each delivery works on a snapshot of the registry taken before the first
//! observer runs, so an observer may register or unregister observers
//! (including itself) from inside its callback.

use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use thiserror::Error;

/// Name of the thread that delivers every observer notification.
pub const NOTIFY_THREAD_NAME: &str = "gallery-notify";

/// What changed. Observers re-read the gallery for the current state; a
/// change may already be stale by the time it is delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryChange {
    /// New index files were parsed and their stacks inserted. Their
    /// thumbnails are not loaded yet.
    StacksAdded { count: usize },
    /// Stacks whose index files disappeared were dropped from the gallery.
    StacksRemoved { count: usize },
    /// A stack's load job finished, fully loaded or halted at a failed decode.
    StackLoaded { index_path: PathBuf, complete: bool },
}

/// Receives gallery change notifications on the notification thread.
pub trait GalleryObserver: Send + Sync {
    fn on_gallery_change(&self, change: &GalleryChange);
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverError {
    #[error("observer already registered")]
    AlreadyRegistered,
    #[error("observer not registered")]
    NotRegistered,
}

/// Registered observers, compared by pointer identity.
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    observers: Mutex<Vec<Arc<dyn GalleryObserver>>>,
}

fn same_observer(a: &Arc<dyn GalleryObserver>, b: &Arc<dyn GalleryObserver>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl ObserverRegistry {
    pub(crate) fn add(&self, observer: Arc<dyn GalleryObserver>) -> Result<(), ObserverError> {
        let mut observers = self.observers.lock();
        if observers.iter().any(|o| same_observer(o, &observer)) {
            return Err(ObserverError::AlreadyRegistered);
        }
        observers.push(observer);
        Ok(())
    }

    pub(crate) fn remove(&self, observer: &Arc<dyn GalleryObserver>) -> Result<(), ObserverError> {
        let mut observers = self.observers.lock();
        let position = observers
            .iter()
            .position(|o| same_observer(o, observer))
            .ok_or(ObserverError::NotRegistered)?;
        observers.remove(position);
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.lock().len()
    }

    fn snapshot(&self) -> Vec<Arc<dyn GalleryObserver>> {
        self.observers.lock().clone()
    }
}

enum Message {
    Change(GalleryChange),
    /// Acknowledged once every message queued before it has been delivered.
    Barrier(mpsc::Sender<()>),
    Shutdown,
}

/// Cloneable handle for queueing notifications from any thread.
#[derive(Clone)]
pub(crate) struct Notifier {
    tx: mpsc::Sender<Message>,
    thread_id: ThreadId,
}

impl Notifier {
    pub(crate) fn notify(&self, change: GalleryChange) {
        if self.tx.send(Message::Change(change)).is_err() {
            tracing::debug!("notification thread stopped, change dropped");
        }
    }

    /// Wait until every notification queued so far has been delivered.
    ///
    /// Returns `true` immediately when called from the notification thread
    /// itself, and `false` if the timeout elapses or the thread has stopped.
    pub(crate) fn flush(&self, timeout: Duration) -> bool {
        if thread::current().id() == self.thread_id {
            return true;
        }
        let (ack_tx, ack_rx) = mpsc::channel();
        if self.tx.send(Message::Barrier(ack_tx)).is_err() {
            return false;
        }
        ack_rx.recv_timeout(timeout).is_ok()
    }
}

/// Owns the notification thread; stops and joins it on drop.
pub(crate) struct NotificationThread {
    tx: mpsc::Sender<Message>,
    handle: Option<JoinHandle<()>>,
}

/// Start the notification thread for `registry`.
pub(crate) fn spawn_notifier(
    registry: Arc<ObserverRegistry>,
) -> std::io::Result<(Notifier, NotificationThread)> {
    let (tx, rx) = mpsc::channel::<Message>();
    let handle = thread::Builder::new()
        .name(NOTIFY_THREAD_NAME.to_string())
        .spawn(move || {
            for message in rx {
                match message {
                    Message::Change(change) => deliver(&registry, &change),
                    Message::Barrier(ack) => {
                        let _ = ack.send(());
                    }
                    Message::Shutdown => break,
                }
            }
            tracing::debug!("notification thread exiting");
        })?;

    let notifier = Notifier {
        tx: tx.clone(),
        thread_id: handle.thread().id(),
    };
    Ok((
        notifier,
        NotificationThread {
            tx,
            handle: Some(handle),
        },
    ))
}

fn deliver(registry: &ObserverRegistry, change: &GalleryChange) {
    let observers = registry.snapshot();
    tracing::trace!(?change, observers = observers.len(), "delivering change");
    for observer in observers {
        observer.on_gallery_change(change);
    }
}

impl Drop for NotificationThread {
    fn drop(&mut self) {
        let _ = self.tx.send(Message::Shutdown);
        if let Some(handle) = self.handle.take() {
            // The last handle can be dropped by an observer callback; never join ourselves.
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                tracing::error!("notification thread panicked");
            }
        }
    }
}
