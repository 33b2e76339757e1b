//! One captured frame: where its files live, how it was shot, and the
//! thumbnail and histogram derived from it.
//!
//! Derived data is loaded lazily by a worker thread and stored exactly once.
//! Readers on any thread see either nothing or the complete pair of
//! thumbnail and histogram, never one without the other.

use crate::imaging::histogram::{HISTOGRAM_BINS, Histogram, luma_histogram};
use crate::imaging::{DecodeError, Thumbnail, ThumbnailDecoder};
use crate::index::{CaptureParams, IndexEntry};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Anything that can hand out a luma histogram on request.
///
/// The caller owns the destination buffer. When no histogram is available
/// the buffer is left untouched, so a view keeps drawing whatever it showed
/// last instead of flashing empty.
pub trait HistogramSource {
    fn copy_histogram(&self, out: &mut [f32; HISTOGRAM_BINS]);
}

#[derive(Debug)]
struct Derived {
    thumbnail: Thumbnail,
    histogram: Histogram,
}

/// A captured frame described by one `<image>` entry of a stack index.
#[derive(Debug)]
pub struct ImageRecord {
    image_path: PathBuf,
    thumbnail_path: PathBuf,
    capture: CaptureParams,
    derived: OnceLock<Derived>,
    /// Serializes loads of this record so a decode runs at most once per success.
    load_lock: Mutex<()>,
}

impl ImageRecord {
    /// Build a record from an index entry, resolving names against `gallery_dir`.
    pub fn from_entry(gallery_dir: &Path, entry: &IndexEntry) -> Self {
        Self {
            image_path: gallery_dir.join(&entry.name),
            thumbnail_path: gallery_dir.join(&entry.thumbnail),
            capture: entry.capture,
            derived: OnceLock::new(),
            load_lock: Mutex::new(()),
        }
    }

    /// Full-resolution image path; unique within a gallery.
    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    pub fn thumbnail_path(&self) -> &Path {
        &self.thumbnail_path
    }

    pub fn capture(&self) -> &CaptureParams {
        &self.capture
    }

    pub fn is_loaded(&self) -> bool {
        self.derived.get().is_some()
    }

    /// Decoded thumbnail, once loaded.
    pub fn thumbnail(&self) -> Option<&Thumbnail> {
        self.derived.get().map(|d| &d.thumbnail)
    }

    /// Normalized luma histogram, once loaded.
    pub fn histogram(&self) -> Option<&Histogram> {
        self.derived.get().map(|d| &d.histogram)
    }

    /// Decode the thumbnail and compute its histogram.
    ///
    /// Returns immediately if the record is already loaded. On failure
    /// nothing is stored and a later call tries again.
    pub fn load_thumbnail(&self, decoder: &dyn ThumbnailDecoder) -> Result<(), DecodeError> {
        if self.is_loaded() {
            return Ok(());
        }
        let _guard = self.load_lock.lock();
        if self.is_loaded() {
            return Ok(());
        }

        let thumbnail = decoder.decode(&self.thumbnail_path)?;
        let histogram = luma_histogram(thumbnail.as_raw());
        // Only set under `load_lock` after the re-check above, so the cell is empty.
        let stored = self
            .derived
            .set(Derived {
                thumbnail,
                histogram,
            })
            .is_ok();
        debug_assert!(stored, "derived data set twice for {}", self.thumbnail_path.display());
        Ok(())
    }
}

impl HistogramSource for ImageRecord {
    fn copy_histogram(&self, out: &mut [f32; HISTOGRAM_BINS]) {
        if let Some(histogram) = self.histogram() {
            out.copy_from_slice(histogram);
        }
    }
}
