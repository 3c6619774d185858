//! Upload intake: the items a client submits and the checks run on them
//! before any image work starts.
//!
//! - [`UploadItem`]: one named byte buffer from the multipart body
//! - [`validate_batch`]: allow-list check over the whole batch
//! - [`sanitize_filename`]: turns a client-supplied name into a safe storage key

mod sanitize;
mod validate;

use bytes::Bytes;

pub use sanitize::sanitize_filename;
pub use validate::{is_allowed_file, validate_batch, ALLOWED_EXTENSIONS};

/// One uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct UploadItem {
    /// Client-declared file name (untrusted)
    pub name: String,

    /// Raw file contents
    pub bytes: Bytes,
}

impl UploadItem {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}
