//! Thumbnail decoder trait and the production implementation.
//!
//! The [`ThumbnailDecoder`] trait is the only thing the gallery needs from an
//! image codec: turn a thumbnail file into an 8-bit RGB pixel buffer. The
//! production implementation is [`RustDecoder`], built on the pure-Rust
//! decoders of the `image` crate. Tests substitute a recording mock so they
//! can count decodes and hold a worker inside a decode.

use image::{ImageReader, RgbImage};
use std::path::Path;
use thiserror::Error;

/// Decoded thumbnail pixels, packed RGB with no row padding.
pub type Thumbnail = RgbImage;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {path}: {reason}")]
    Undecodable { path: String, reason: String },
}

/// Decodes thumbnail files into pixel buffers.
///
/// Implementations are shared by every worker thread, so they must be
/// `Send + Sync`.
pub trait ThumbnailDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<Thumbnail, DecodeError>;
}

/// Decoder backed by the `image` crate (JPEG and PNG compiled in).
#[derive(Debug, Default, Clone, Copy)]
pub struct RustDecoder;

impl RustDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl ThumbnailDecoder for RustDecoder {
    fn decode(&self, path: &Path) -> Result<Thumbnail, DecodeError> {
        let decoded = ImageReader::open(path)?
            .with_guessed_format()?
            .decode()
            .map_err(|e| DecodeError::Undecodable {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(decoded.to_rgb8())
    }
}
