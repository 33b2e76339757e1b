//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Every stack is shown by its positional index and index file name, with
//! its frames as indented context: source names, the raw capture parameters,
//! and the peak of the luma histogram once the thumbnail is loaded.
//!
//! ```text
//! Stacks (2)
//! 001 img_0003.xml (2 images, loaded)
//!     001 img_0003_00.jpg
//!         Thumbnail: thumb_0003_00.jpg
//!         Capture: exposure 10000us, gain 100, wb 6500K, flash off
//!         Histogram peak: 87
//!     002 img_0003_01.jpg
//!         ...
//! 002 img_0001.xml (1 image, 0/1 loaded)
//!     001 img_0001_00.jpg
//!         Thumbnail: thumb_0001_00.jpg
//!         Capture: exposure 33333us, gain 400, wb 5200K, flash on
//!         Histogram: not loaded
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>` or `String`)
//! for testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::gallery::{GalleryChange, RefreshReport};
use crate::imaging::histogram::peak_bin;
use crate::index::CaptureParams;
use crate::record::ImageRecord;
use crate::stack::{RemovalSummary, Stack};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// `loaded` when the load job finished, otherwise `N/M loaded`.
fn load_status(stack: &Stack) -> String {
    if stack.is_load_complete() {
        "loaded".to_string()
    } else {
        let loaded = stack.images().iter().filter(|i| i.is_loaded()).count();
        format!("{}/{} loaded", loaded, stack.image_count())
    }
}

fn capture_line(capture: &CaptureParams) -> String {
    format!(
        "Capture: exposure {}us, gain {}, wb {}K, flash {}",
        capture.exposure_us,
        capture.gain,
        capture.white_balance,
        if capture.flash { "on" } else { "off" }
    )
}

// ============================================================================
// Gallery listing
// ============================================================================

/// Format a stack header line.
///
/// ```text
/// 001 img_0003.xml (2 images, loaded)
/// ```
pub fn format_stack_header(position: usize, stack: &Stack) -> String {
    format!(
        "{} {} ({}, {})",
        format_index(position),
        stack.name(),
        plural(stack.image_count(), "image"),
        load_status(stack)
    )
}

fn format_image(position: usize, image: &ImageRecord, depth: usize) -> Vec<String> {
    let base = indent(depth);
    let mut lines = vec![format!(
        "{}{} {}",
        base,
        format_index(position),
        file_name(image.image_path())
    )];
    let detail = indent(depth + 1);
    lines.push(format!(
        "{}Thumbnail: {}",
        detail,
        file_name(image.thumbnail_path())
    ));
    lines.push(format!("{}{}", detail, capture_line(image.capture())));
    match image.histogram().and_then(peak_bin) {
        Some(peak) => lines.push(format!("{}Histogram peak: {}", detail, peak)),
        None => lines.push(format!("{}Histogram: not loaded", detail)),
    }
    lines
}

/// Format the whole gallery, newest stack first.
pub fn format_gallery(stacks: &[Arc<Stack>]) -> Vec<String> {
    let mut lines = vec![format!("Stacks ({})", stacks.len())];
    for (i, stack) in stacks.iter().enumerate() {
        lines.push(format_stack_header(i + 1, stack));
        for (j, image) in stack.images().iter().enumerate() {
            lines.extend(format_image(j + 1, image, 1));
        }
    }
    lines
}

pub fn print_gallery(stacks: &[Arc<Stack>]) {
    for line in format_gallery(stacks) {
        println!("{}", line);
    }
}

// ============================================================================
// Refresh, change and deletion lines
// ============================================================================

/// Summarize one refresh. Skipped index files follow as indented lines.
pub fn format_refresh(report: &RefreshReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Refreshed: {} added, {} removed, {} queued",
        report.added,
        report.removed,
        plural(report.scheduled, "job")
    )];
    for error in &report.skipped {
        lines.push(format!("{}Skipped: {}", indent(1), error));
    }
    lines
}

/// One line per observer notification, as printed by `watch`.
pub fn format_change(change: &GalleryChange) -> String {
    match change {
        GalleryChange::StacksAdded { count } => format!("Added {}", plural(*count, "stack")),
        GalleryChange::StacksRemoved { count } => {
            format!("Removed {}", plural(*count, "stack"))
        }
        GalleryChange::StackLoaded {
            index_path,
            complete: true,
        } => format!("Loaded {}", file_name(index_path)),
        GalleryChange::StackLoaded {
            index_path,
            complete: false,
        } => format!("Incomplete {} (thumbnail decode failed)", file_name(index_path)),
    }
}

/// Report the files removed when deleting stack `name`.
pub fn format_removal(name: &str, summary: &RemovalSummary) -> Vec<String> {
    let mut lines = vec![format!(
        "Deleted {}: {} removed, {} already missing",
        name,
        plural(summary.removed, "file"),
        summary.missing
    )];
    for (path, error) in &summary.failed {
        lines.push(format!("{}Failed: {} ({})", indent(1), path.display(), error));
    }
    lines
}

pub fn print_removal(name: &str, summary: &RemovalSummary) {
    for line in format_removal(name, summary) {
        println!("{}", line);
    }
}

// ============================================================================
// JSON snapshot
// ============================================================================

/// Serializable view of the gallery, printed by `list --json`.
#[derive(Debug, Serialize)]
pub struct GallerySnapshot {
    pub stacks: Vec<StackSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct StackSnapshot {
    pub name: String,
    pub load_complete: bool,
    pub images: Vec<ImageSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct ImageSnapshot {
    pub name: String,
    pub thumbnail: String,
    pub capture: CaptureParams,
    pub loaded: bool,
    pub histogram_peak: Option<usize>,
}

pub fn gallery_snapshot(stacks: &[Arc<Stack>]) -> GallerySnapshot {
    GallerySnapshot {
        stacks: stacks
            .iter()
            .map(|stack| StackSnapshot {
                name: stack.name(),
                load_complete: stack.is_load_complete(),
                images: stack
                    .images()
                    .iter()
                    .map(|image| ImageSnapshot {
                        name: file_name(image.image_path()),
                        thumbnail: file_name(image.thumbnail_path()),
                        capture: *image.capture(),
                        loaded: image.is_loaded(),
                        histogram_peak: image.histogram().and_then(peak_bin),
                    })
                    .collect(),
            })
            .collect(),
    }
}
