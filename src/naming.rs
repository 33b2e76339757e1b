//! File naming convention shared by the gallery and the capture writer.
//!
//! Every burst is written as one index file plus one full-resolution image
//! and one thumbnail per frame, all in the gallery directory:
//!
//! ```text
//! DCIM/fcam/
//! ├── img_0003.xml          # stack index (id 3)
//! ├── img_0003_00.jpg       # frame 0, full resolution
//! ├── img_0003_01.jpg       # frame 1
//! ├── thumb_0003_00.jpg     # frame 0 thumbnail
//! ├── thumb_0003_01.jpg
//! └── img_0001.xml          # an older stack
//! ```
//!
//! Ids are zero-padded to four digits, so lexicographic order of index file
//! names is also capture order. The gallery shows the largest name first.

use std::path::Path;

const STACK_PREFIX: &str = "img_";
const STACK_SUFFIX: &str = ".xml";
const ID_DIGITS: usize = 4;

/// Largest id that still fits the four-digit index file name.
pub const MAX_STACK_ID: u32 = 9999;

/// Index file name for stack `id`: `img_0042.xml`.
pub fn stack_file_name(id: u32) -> String {
    format!("{STACK_PREFIX}{id:04}{STACK_SUFFIX}")
}

/// Full-resolution image name for frame `seq` of stack `id`: `img_0042_00.jpg`.
pub fn image_file_name(id: u32, seq: u32) -> String {
    format!("{STACK_PREFIX}{id:04}_{seq:02}.jpg")
}

/// Thumbnail name for frame `seq` of stack `id`: `thumb_0042_00.jpg`.
pub fn thumbnail_file_name(id: u32, seq: u32) -> String {
    format!("thumb_{id:04}_{seq:02}.jpg")
}

/// Whether `name` is a stack index file: `img_` + four ASCII digits + `.xml`.
///
/// ```
/// # use burst_gallery::naming::is_stack_file_name;
/// assert!(is_stack_file_name("img_0001.xml"));
/// assert!(!is_stack_file_name("img_001.xml"));
/// assert!(!is_stack_file_name("img_0001_00.jpg"));
/// ```
pub fn is_stack_file_name(name: &str) -> bool {
    stack_id(name).is_some()
}

/// Numeric id of a stack index file name, or `None` if `name` is not one.
pub fn stack_id(name: &str) -> Option<u32> {
    let digits = name.strip_prefix(STACK_PREFIX)?.strip_suffix(STACK_SUFFIX)?;
    if digits.len() != ID_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Id for the next burst written into `dir`: one past the largest existing
/// stack id, or 0 when there is none.
///
/// Gaps left by deleted stacks are never reused, so a new burst always sorts
/// above every existing one. `None` once [`MAX_STACK_ID`] is taken.
pub fn next_stack_id(dir: &Path) -> Option<u32> {
    let newest = crate::gallery::list_stack_files(dir)
        .iter()
        .filter_map(|path| path.file_name()?.to_str().and_then(stack_id))
        .max();
    match newest {
        None => Some(0),
        Some(id) => id.checked_add(1).filter(|next| *next <= MAX_STACK_ID),
    }
}
