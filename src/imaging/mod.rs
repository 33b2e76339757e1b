//! Thumbnail decoding and luma histograms.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (JPEG, PNG) → RGB8 |
//! | **Histogram** | fixed-point subsampling + integer Rec. 709 luma |
//!
//! The module is split into:
//! - **Histogram**: pure functions over packed RGB buffers (unit testable)
//! - **Decoder**: [`ThumbnailDecoder`] trait + [`RustDecoder`]

pub mod decoder;
pub mod histogram;

pub use decoder::{DecodeError, RustDecoder, Thumbnail, ThumbnailDecoder};
pub use histogram::{HISTOGRAM_BINS, HISTOGRAM_SAMPLES, Histogram, luma_histogram};
