//! # Burst Gallery
//!
//! Keeps an in-memory gallery of captured photo bursts in sync with a
//! directory on disk. Each burst ("stack") is described by an index file,
//! `img_####.xml`, listing its frames, their thumbnails, and the camera
//! settings each frame was shot with.
//!
//! # Architecture
//!
//! ```text
//! gallery dir ──refresh──► Gallery ──► Stack ──► ImageRecord
//!                            │                      ▲
//!                            ├─► worker pool ───────┘ decode thumbnail + histogram
//!                            │        │
//!                            │        ▼
//!                            └─► gallery-notify thread ──► observers
//! ```
//!
//! 1. [`gallery::Gallery::refresh`] reconciles the stack list with the index
//!    files present, newest stack first.
//! 2. Stacks that are not fully loaded get one background load job each.
//! 3. When stacks appear or disappear, and when a job finishes, observers
//!    are told on a single notification thread and read the current state
//!    back.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`gallery`] | Reconciliation, load scheduling, observer notification |
//! | [`stack`] | One burst: parsed index, load job, deletion |
//! | [`record`] | One frame: paths, capture params, lazily loaded thumbnail + histogram |
//! | [`index`] | Index XML parsing |
//! | [`imaging`] | Thumbnail decoding and luma histograms |
//! | [`naming`] | `img_####.xml` / `thumb_####_##.jpg` file naming |
//! | [`config`] | TOML config loading, merging, and validation |
//! | [`logging`] | `tracing` subscriber setup for the CLI |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Observers Pull, Notifications Only Say "Something Changed"
//!
//! A notification carries what kind of change happened, never the data. An
//! observer reads the stacks it cares about back through the gallery. A
//! late or redundant notification therefore costs a re-read, never a wrong
//! picture.
//!
//! ## One Notification Thread
//!
//! Observers are typically UI views. Every callback runs on the
//! `gallery-notify` thread, one at a time and in the order changes
//! happened, so an observer never needs its own locking against other
//! notifications.
//!
//! ## Derived Data Is Written Once
//!
//! A frame's thumbnail and histogram are set together, at most once, by a
//! worker. Readers see either both or neither. A failed decode stores
//! nothing and the next refresh tries again.
//!
//! ## Stack Load Halts at the First Failure
//!
//! A stack whose thumbnail fails to decode is left partially loaded; frames
//! after the failure are not attempted until the next pass. This keeps a
//! stack that is still being written from burning decode time on files that
//! do not exist yet.

pub mod config;
pub mod gallery;
pub mod imaging;
pub mod index;
pub mod logging;
pub mod naming;
pub mod output;
pub mod record;
pub mod stack;

#[cfg(test)]
pub(crate) mod test_helpers;
