//! Archive handles.

use std::fmt;

use uuid::Uuid;

const PREFIX: &str = "compressed_images_";
const SUFFIX: &str = ".zip";

/// Opaque, globally unique reference to one stored archive.
///
/// The handle doubles as the storage key and the download file name:
/// `compressed_images_<uuid>.zip`. Only strings of exactly that shape parse,
/// so a handle can never name anything outside the storage directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchiveHandle(String);

impl ArchiveHandle {
    /// Generate a fresh handle from a random UUID.
    pub fn generate() -> Self {
        Self(format!("{}{}{}", PREFIX, Uuid::new_v4(), SUFFIX))
    }

    /// Parse a handle received from a client.
    pub fn parse(s: &str) -> Option<Self> {
        let id = s.strip_prefix(PREFIX)?.strip_suffix(SUFFIX)?;
        let uuid = Uuid::parse_str(id).ok()?;
        // Normalize so differently-cased inputs map to the same key
        Some(Self(format!("{}{}{}", PREFIX, uuid.hyphenated(), SUFFIX)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Download path served by the HTTP layer.
    pub fn download_url(&self) -> String {
        format!("/download/{}", self.0)
    }
}

impl fmt::Display for ArchiveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArchiveHandle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
