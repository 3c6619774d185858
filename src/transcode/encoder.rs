//! JPEG transcoder.
//!
//! Decodes an uploaded image in any supported format, normalizes its color
//! representation and re-encodes it as JPEG at the requested quality.
//!
//! # Design Decisions
//!
//! - **Content sniffing**: the decoder picks the format from the bytes, not
//!   from the client-declared extension. A `.png` holding JPEG data decodes.
//!
//! - **Color normalization**: JPEG has no alpha channel and no palette, so
//!   every decoded image that is not plain 8-bit RGB is converted first.
//!   Alpha is discarded, not composited onto a background.
//!
//! - **Quality clamping**: quality is forwarded as an integer and clamped to
//!   1-100 right before encoding. Out-of-range values never fail.
//!
//! - **Optimized entropy coding**: the encoder builds Huffman tables from the
//!   image's own symbol statistics instead of the stock tables.
//!
//! - **Bounded decode**: width, height and allocation limits keep a hostile
//!   file from exhausting memory.

use std::borrow::Cow;
use std::io::Cursor;

use bytes::Bytes;
use image::{DynamicImage, ImageReader, Limits, RgbImage};
use jpeg_encoder::{ColorType, Encoder};
use tracing::debug;

use crate::error::TranscodeError;
use crate::upload::UploadItem;

use super::naming::output_filename;
use super::TranscodedItem;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Minimum quality the encoder accepts.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum quality the encoder accepts.
pub const MAX_JPEG_QUALITY: u8 = 100;

/// Default maximum width or height of a decoded image in pixels.
pub const DEFAULT_MAX_DIMENSION: u32 = 16_384;

/// Default maximum decoder allocation in bytes (512MB).
pub const DEFAULT_MAX_DECODE_ALLOC: u64 = 512 * 1024 * 1024;

// =============================================================================
// Decode Limits
// =============================================================================

/// Resource bounds applied while decoding untrusted images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Maximum width or height in pixels
    pub max_dimension: u32,

    /// Maximum bytes the decoder may allocate
    pub max_alloc: u64,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            max_alloc: DEFAULT_MAX_DECODE_ALLOC,
        }
    }
}

impl DecodeLimits {
    fn to_image_limits(self) -> Limits {
        let mut limits = Limits::default();
        limits.max_image_width = Some(self.max_dimension);
        limits.max_image_height = Some(self.max_dimension);
        limits.max_alloc = Some(self.max_alloc);
        limits
    }
}

// =============================================================================
// JPEG Transcoder
// =============================================================================

/// Converts uploaded images into JPEG.
///
/// The transcoder holds no mutable state and is cheap to clone, so one
/// instance is shared by every worker thread.
///
/// # Example
///
/// ```ignore
/// use pixpress::transcode::JpegTranscoder;
/// use pixpress::upload::UploadItem;
///
/// let transcoder = JpegTranscoder::new();
/// let item = UploadItem::new("holiday.png", png_bytes);
///
/// let output = transcoder.transcode(&item, 50)?;
/// assert_eq!(output.filename, "holiday_compressed.jpg");
/// ```
#[derive(Debug, Clone, Default)]
pub struct JpegTranscoder {
    limits: DecodeLimits,
}

impl JpegTranscoder {
    /// Create a transcoder with default decode limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transcoder with custom decode limits.
    pub fn with_limits(limits: DecodeLimits) -> Self {
        Self { limits }
    }

    /// The decode limits in effect.
    pub fn limits(&self) -> DecodeLimits {
        self.limits
    }

    /// Transcode one uploaded item.
    ///
    /// The returned filename is derived from the item's name; callers that
    /// need batch-wide uniqueness pass it through a
    /// [`NameAllocator`](super::NameAllocator).
    ///
    /// # Errors
    ///
    /// - [`TranscodeError::Decode`] if the bytes are not a supported image or
    ///   exceed the decode limits
    /// - [`TranscodeError::Encode`] if the JPEG encoder fails
    pub fn transcode(
        &self,
        item: &UploadItem,
        quality: i64,
    ) -> Result<TranscodedItem, TranscodeError> {
        let img = self.decode(&item.name, &item.bytes)?;
        let data = encode_jpeg(&item.name, &img, quality)?;

        debug!(
            filename = %item.name,
            input_bytes = item.bytes.len(),
            output_bytes = data.len(),
            "Transcoded image"
        );

        Ok(TranscodedItem {
            filename: output_filename(&item.name),
            data,
        })
    }

    /// Decode raw bytes into an image, sniffing the format from content.
    pub fn decode(&self, filename: &str, source: &[u8]) -> Result<DynamicImage, TranscodeError> {
        let decode_err = |message: String| TranscodeError::Decode {
            filename: filename.to_string(),
            message,
        };

        let mut reader = ImageReader::new(Cursor::new(source))
            .with_guessed_format()
            .map_err(|e| decode_err(e.to_string()))?;

        if reader.format().is_none() {
            return Err(decode_err("unrecognized image format".to_string()));
        }

        reader.limits(self.limits.to_image_limits());
        reader.decode().map_err(|e| decode_err(e.to_string()))
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Convert any color representation to 8-bit RGB, borrowing when the image
/// already is.
pub fn normalize_color(img: &DynamicImage) -> Cow<'_, RgbImage> {
    match img {
        DynamicImage::ImageRgb8(buf) => Cow::Borrowed(buf),
        other => Cow::Owned(other.to_rgb8()),
    }
}

/// Encode an image as JPEG, normalizing its color mode first.
pub fn encode_jpeg(
    filename: &str,
    img: &DynamicImage,
    quality: i64,
) -> Result<Bytes, TranscodeError> {
    let encode_err = |message: String| TranscodeError::Encode {
        filename: filename.to_string(),
        message,
    };

    let rgb = normalize_color(img);
    let width = u16::try_from(rgb.width())
        .map_err(|_| encode_err(format!("width {} exceeds 65535", rgb.width())))?;
    let height = u16::try_from(rgb.height())
        .map_err(|_| encode_err(format!("height {} exceeds 65535", rgb.height())))?;

    let mut output = Vec::new();
    let mut encoder = Encoder::new(&mut output, clamp_quality(quality));
    encoder.set_optimized_huffman_tables(true);

    encoder
        .encode(rgb.as_raw(), width, height, ColorType::Rgb)
        .map_err(|e| encode_err(e.to_string()))?;

    Ok(Bytes::from(output))
}

/// Validate JPEG quality parameter.
///
/// Returns `true` if quality is in the range the encoder accepts (1-100).
#[inline]
pub fn is_valid_quality(quality: i64) -> bool {
    (MIN_JPEG_QUALITY as i64..=MAX_JPEG_QUALITY as i64).contains(&quality)
}

/// Clamp quality to the encoder's range.
///
/// Values below 1 become 1, values above 100 become 100.
#[inline]
pub fn clamp_quality(quality: i64) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY as i64, MAX_JPEG_QUALITY as i64) as u8
}

// =============================================================================
// Tests
// =============================================================================
