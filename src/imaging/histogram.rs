//! Luma histogram of a decoded thumbnail.
//!
//! The histogram is built from a fixed subsample of the pixel buffer rather
//! than from every pixel. Sample positions come from a 20.12 fixed-point
//! linear scan, so the same buffer always yields the same sample set and a
//! bit-identical histogram.
//!
//! Luma uses integer Rec. 709 weights applied directly to the stored sRGB
//! values. The values are not linearized first, so the result is an
//! approximation of relative luminance; that approximation is what every
//! consumer of the histogram has been calibrated against.
//!
//! All functions here are pure and testable without any I/O.

/// Number of buckets in a histogram.
pub const HISTOGRAM_BINS: usize = 256;

/// Number of pixels sampled from each buffer, regardless of its size.
pub const HISTOGRAM_SAMPLES: u64 = 32768;

/// Fractional bits of the sample stride.
const STRIDE_FRACTION_BITS: u32 = 12;

/// Normalized luma histogram: every bucket in `[0, 1]`, the fullest bucket at 1.
pub type Histogram = [f32; HISTOGRAM_BINS];

/// Integer luma of one sRGB pixel: `(13932 R + 46971 G + 4733 B) >> 16`.
///
/// The weights are 0.2126 / 0.7152 / 0.0722 scaled by 2^16.
///
/// ```
/// # use burst_gallery::imaging::histogram::luma;
/// assert_eq!(luma(0, 0, 0), 0);
/// assert_eq!(luma(255, 255, 255), 255);
/// ```
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    let weighted = 13932 * u32::from(r) + 46971 * u32::from(g) + 4733 * u32::from(b);
    (weighted >> 16) as u8
}

/// Pixel indices visited when sampling a buffer of `pixel_count` pixels.
///
/// Yields exactly [`HISTOGRAM_SAMPLES`] indices (with repeats when the buffer
/// is smaller than the sample count). The stride is
/// `(pixel_count << 12) / HISTOGRAM_SAMPLES` and index `i` is
/// `(i * stride) >> 12`. Arithmetic is 64-bit so large buffers cannot
/// overflow the accumulator.
///
/// `pixel_count` must be non-zero for the indices to be valid.
pub fn sample_indices(pixel_count: usize) -> impl Iterator<Item = usize> {
    let stride = ((pixel_count as u64) << STRIDE_FRACTION_BITS) / HISTOGRAM_SAMPLES;
    (0..HISTOGRAM_SAMPLES).map(move |i| ((i * stride) >> STRIDE_FRACTION_BITS) as usize)
}

/// Raw bucket counts of the sampled luma values of a packed RGB buffer.
///
/// `rgb` holds `R, G, B` byte triples; a trailing partial triple is ignored.
/// An empty buffer produces all-zero counts.
pub fn luma_counts(rgb: &[u8]) -> [u32; HISTOGRAM_BINS] {
    let mut counts = [0u32; HISTOGRAM_BINS];
    let pixel_count = rgb.len() / 3;
    if pixel_count == 0 {
        return counts;
    }
    for index in sample_indices(pixel_count) {
        let px = &rgb[index * 3..index * 3 + 3];
        counts[usize::from(luma(px[0], px[1], px[2]))] += 1;
    }
    counts
}

/// Scale counts so the fullest bucket becomes 1.
///
/// Each bucket is multiplied by the reciprocal of the maximum count. When
/// every count is zero the result is all zeros, never NaN.
pub fn normalize(counts: &[u32; HISTOGRAM_BINS]) -> Histogram {
    let max = counts.iter().copied().max().unwrap_or(0);
    let norm = if max > 0 { 1.0 / max as f32 } else { 0.0 };
    let mut histogram = [0.0f32; HISTOGRAM_BINS];
    for (bucket, &count) in histogram.iter_mut().zip(counts) {
        *bucket = count as f32 * norm;
    }
    histogram
}

/// Normalized luma histogram of a packed RGB buffer.
pub fn luma_histogram(rgb: &[u8]) -> Histogram {
    normalize(&luma_counts(rgb))
}

/// Index of the fullest bucket, or `None` for an all-zero histogram.
pub fn peak_bin(histogram: &Histogram) -> Option<usize> {
    histogram
        .iter()
        .enumerate()
        .filter(|(_, v)| **v > 0.0)
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
}
