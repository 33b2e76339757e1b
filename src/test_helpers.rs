//! Shared test utilities.
//!
//! Builds gallery directories on disk the way the capture writer lays them
//! out (see [`crate::naming`]), records observer notifications, and
//! captures log output.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let index = write_stack_with_thumbnails(tmp.path(), 3, 2);
//! let stack = Stack::open(&index, tmp.path()).unwrap();
//! assert_eq!(stack.image_count(), 2);
//! ```

use crate::gallery::{GalleryChange, GalleryObserver};
use crate::naming::{image_file_name, stack_file_name, thumbnail_file_name};
use image::{Rgb, RgbImage};
use parking_lot::Mutex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =========================================================================
// Fixture setup
// =========================================================================

/// Index XML for stack `id` with `count` frames, using the standard file names.
///
/// Capture parameters vary per frame so tests can tell frames apart.
pub fn stack_xml(id: u32, count: u32) -> String {
    let mut xml = format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<imagestack imagecount=\"{count}\">\n"
    );
    for seq in 0..count {
        xml.push_str(&format!(
            "<image name=\"{}\" thumbnail=\"{}\" flash=\"{}\" gain=\"{}\" exposure=\"{}\" wb=\"{}\" />\n",
            image_file_name(id, seq),
            thumbnail_file_name(id, seq),
            seq % 2,
            100 * (seq + 1),
            10000 + seq,
            6500,
        ));
    }
    xml.push_str("</imagestack>\n");
    xml
}

/// Write only the index file for stack `id` and return its path.
pub fn write_stack(dir: &Path, id: u32, count: u32) -> PathBuf {
    let path = dir.join(stack_file_name(id));
    std::fs::write(&path, stack_xml(id, count)).unwrap();
    path
}

/// Write the index file plus a real JPEG thumbnail per frame.
pub fn write_stack_with_thumbnails(dir: &Path, id: u32, count: u32) -> PathBuf {
    for seq in 0..count {
        let shade = (seq * 40 % 256) as u8;
        RgbImage::from_pixel(8, 6, Rgb([shade, shade, shade]))
            .save(dir.join(thumbnail_file_name(id, seq)))
            .unwrap();
    }
    write_stack(dir, id, count)
}

/// Create empty full-resolution files for every frame of stack `id`.
pub fn touch_full_resolution(dir: &Path, id: u32, count: u32) {
    for seq in 0..count {
        std::fs::write(dir.join(image_file_name(id, seq)), b"").unwrap();
    }
}

/// File name of `path` as a `String`.
pub fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().to_string()
}

// =========================================================================
// Observers
// =========================================================================

/// Observer that records every change and the name of the thread it arrived on.
#[derive(Default)]
pub struct RecordingObserver {
    seen: Mutex<Vec<(GalleryChange, Option<String>)>>,
}

impl RecordingObserver {
    pub fn changes(&self) -> Vec<GalleryChange> {
        self.seen.lock().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn threads(&self) -> Vec<Option<String>> {
        self.seen.lock().iter().map(|(_, t)| t.clone()).collect()
    }
}

impl GalleryObserver for RecordingObserver {
    fn on_gallery_change(&self, change: &GalleryChange) {
        let thread = std::thread::current().name().map(str::to_string);
        self.seen.lock().push((change.clone(), thread));
    }
}

// =========================================================================
// Logs
// =========================================================================

/// Shared in-memory log sink.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a thread-local subscriber at `level` and return what it logged.
///
/// Only events from the calling thread are captured.
pub fn capture_logs<R>(level: tracing::Level, f: impl FnOnce() -> R) -> (R, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    let logged = String::from_utf8_lossy(&buffer.0.lock()).into_owned();
    (result, logged)
}
