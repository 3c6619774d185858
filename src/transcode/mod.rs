//! Image transcoding.
//!
//! Turns one uploaded image into a JPEG archive entry:
//!
//! ```text
//! UploadItem ──► decode (sniffed format, bounded)
//!                  │
//!                  ▼
//!            normalize color (→ 8-bit RGB)
//!                  │
//!                  ▼
//!            encode JPEG @ clamp(quality) ──► TranscodedItem
//! ```
//!
//! # Components
//!
//! - [`JpegTranscoder`]: decode/normalize/encode for one item
//! - [`output_filename`]: `<sanitized stem>_compressed.jpg`
//! - [`NameAllocator`]: makes names unique within a batch

mod encoder;
mod naming;

use bytes::Bytes;

pub use encoder::{
    clamp_quality, encode_jpeg, is_valid_quality, normalize_color, DecodeLimits, JpegTranscoder,
    DEFAULT_JPEG_QUALITY, DEFAULT_MAX_DECODE_ALLOC, DEFAULT_MAX_DIMENSION, MAX_JPEG_QUALITY,
    MIN_JPEG_QUALITY,
};
pub use naming::{output_filename, NameAllocator, OUTPUT_EXTENSION, OUTPUT_SUFFIX};

/// A JPEG ready to go into the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodedItem {
    /// Archive entry name
    pub filename: String,

    /// JPEG-encoded bytes
    pub data: Bytes,
}
