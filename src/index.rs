//! Stack index file parsing.
//!
//! The capture writer describes each burst with a small XML document:
//!
//! ```xml
//! <?xml version="1.0" encoding="utf-8"?>
//! <imagestack imagecount="2">
//! <image name="img_0003_00.jpg" thumbnail="thumb_0003_00.jpg" flash="0" gain="100" exposure="10000" wb="6500" />
//! <image name="img_0003_01.jpg" thumbnail="thumb_0003_01.jpg" flash="1" gain="400" exposure="33333" wb="5200" />
//! </imagestack>
//! ```
//!
//! Every `<image>` element becomes one [`IndexEntry`], in document order.
//! All six attributes are required; a missing or non-integer attribute fails
//! the whole file so that no partially described stack ever reaches the
//! gallery. The root element and `imagecount` are informational and not
//! checked.

use serde::Serialize;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed index XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("<image> #{entry} is missing attribute `{attribute}`")]
    MissingAttribute {
        entry: usize,
        attribute: &'static str,
    },
    #[error("<image> #{entry} has non-integer `{attribute}`: {value:?}")]
    InvalidNumber {
        entry: usize,
        attribute: &'static str,
        value: String,
    },
}

/// Camera settings a frame was captured with, exactly as recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CaptureParams {
    /// Exposure time in microseconds.
    pub exposure_us: i32,
    /// Sensor gain, ×100 (100 = unity).
    pub gain: i32,
    /// White balance in kelvin.
    pub white_balance: i32,
    pub flash: bool,
}

/// One `<image>` element of an index file. Names are relative to the gallery directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub name: String,
    pub thumbnail: String,
    pub capture: CaptureParams,
}

/// Parse an index file from disk.
pub fn parse_index_file(path: &Path) -> Result<Vec<IndexEntry>, IndexError> {
    let content = std::fs::read_to_string(path)?;
    parse_index_xml(&content)
}

/// Parse index XML into its entries, in document order.
pub fn parse_index_xml(xml: &str) -> Result<Vec<IndexEntry>, IndexError> {
    let doc = roxmltree::Document::parse(xml)?;

    doc.descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "image")
        .enumerate()
        .map(|(entry, node)| parse_image(entry, &node))
        .collect()
}

fn parse_image(entry: usize, node: &roxmltree::Node) -> Result<IndexEntry, IndexError> {
    let attr = |attribute: &'static str| {
        node.attribute(attribute)
            .ok_or(IndexError::MissingAttribute { entry, attribute })
    };
    let int = |attribute: &'static str| -> Result<i32, IndexError> {
        let value = attr(attribute)?;
        value
            .trim()
            .parse()
            .map_err(|_| IndexError::InvalidNumber {
                entry,
                attribute,
                value: value.to_string(),
            })
    };

    Ok(IndexEntry {
        name: attr("name")?.to_string(),
        thumbnail: attr("thumbnail")?.to_string(),
        capture: CaptureParams {
            flash: int("flash")? != 0,
            gain: int("gain")?,
            exposure_us: int("exposure")?,
            white_balance: int("wb")?,
        },
    })
}
