//! A burst of frames sharing one index file.
//!
//! A [`Stack`] is parsed in full when the gallery discovers its index file and
//! is immutable afterwards except for two things: each record's derived data
//! and the stack's completion flag, both written by the stack's load job.

use crate::imaging::ThumbnailDecoder;
use crate::index::{IndexError, parse_index_file};
use crate::record::ImageRecord;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StackError {
    #[error("Failed to parse stack index {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: IndexError,
    },
}

/// Result of one pass of a stack's load job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Every record has its thumbnail and histogram.
    Complete,
    /// Decoding the record at `index` failed; records after it were not attempted.
    Halted { index: usize, reason: String },
}

/// Files removed by [`Stack::remove_from_file_system`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RemovalSummary {
    pub removed: usize,
    /// Files that were already gone.
    pub missing: usize,
    /// Files that could not be removed, with the error.
    pub failed: Vec<(PathBuf, String)>,
}

/// An ordered group of captured frames described by one index file.
#[derive(Debug)]
pub struct Stack {
    index_path: PathBuf,
    images: Vec<ImageRecord>,
    load_complete: AtomicBool,
}

impl Stack {
    /// Parse the index file at `index_path`; frame paths resolve against `gallery_dir`.
    ///
    /// Nothing is returned unless every entry parses.
    pub fn open(index_path: &Path, gallery_dir: &Path) -> Result<Self, StackError> {
        let entries = parse_index_file(index_path).map_err(|source| StackError::Parse {
            path: index_path.to_path_buf(),
            source,
        })?;
        let images = entries
            .iter()
            .map(|entry| ImageRecord::from_entry(gallery_dir, entry))
            .collect();
        Ok(Self {
            index_path: index_path.to_path_buf(),
            images,
            load_complete: AtomicBool::new(false),
        })
    }

    /// Index file path; the stack's identity.
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Index file name, e.g. `img_0003.xml`.
    pub fn name(&self) -> String {
        self.index_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn image(&self, index: usize) -> Option<&ImageRecord> {
        self.images.get(index)
    }

    pub fn images(&self) -> &[ImageRecord] {
        &self.images
    }

    /// True once a load job has loaded every record.
    pub fn is_load_complete(&self) -> bool {
        self.load_complete.load(Ordering::Acquire)
    }

    /// Load every record's thumbnail in order, stopping at the first failure.
    ///
    /// Already-loaded records are skipped without decoding. The completion
    /// flag is set only when the whole pass succeeds.
    pub fn run_load_job(&self, decoder: &dyn ThumbnailDecoder) -> LoadOutcome {
        for (index, image) in self.images.iter().enumerate() {
            if let Err(e) = image.load_thumbnail(decoder) {
                tracing::warn!(
                    stack = %self.name(),
                    thumbnail = %image.thumbnail_path().display(),
                    error = %e,
                    "thumbnail decode failed, stack stays incomplete"
                );
                return LoadOutcome::Halted {
                    index,
                    reason: e.to_string(),
                };
            }
        }
        self.load_complete.store(true, Ordering::Release);
        LoadOutcome::Complete
    }

    /// Delete every frame's thumbnail and full-resolution file, then the index file.
    ///
    /// Not atomic: a crash part way leaves some of the stack's files behind.
    pub fn remove_from_file_system(&self) -> RemovalSummary {
        let mut summary = RemovalSummary::default();
        let files = self
            .images
            .iter()
            .flat_map(|image| [image.thumbnail_path(), image.image_path()])
            .chain(std::iter::once(self.index_path.as_path()));

        for path in files {
            match std::fs::remove_file(path) {
                Ok(()) => summary.removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => summary.missing += 1,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to delete stack file");
                    summary.failed.push((path.to_path_buf(), e.to_string()));
                }
            }
        }
        summary
    }
}
