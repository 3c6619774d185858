//! Temporary artifact storage.
//!
//! Finished archives are written to a [`BlobStore`] under an
//! [`ArchiveHandle`] and deleted on a schedule:
//!
//! - shortly after the first download (`download_retention`)
//! - at the latest `max_artifact_age` after creation, downloaded or not
//!
//! A single background task drives both deadlines from one [`ExpiryQueue`];
//! a periodic sweep over the index catches anything it missed.

mod artifact;
mod blob;
mod expiry;
mod handle;

use std::path::PathBuf;
use std::time::Duration;

pub use artifact::{ArtifactRecord, ArtifactState, ArtifactStore};
pub use blob::{BlobStore, FsBlobStore};
pub use expiry::ExpiryQueue;
pub use handle::ArchiveHandle;

/// Default storage directory, relative to the working directory.
pub const DEFAULT_STORAGE_DIR: &str = "temp_uploads";

/// Default delay between first download and deletion.
pub const DEFAULT_DOWNLOAD_RETENTION: Duration = Duration::from_secs(60);

/// Default lifetime of an archive nobody downloads.
pub const DEFAULT_MAX_ARTIFACT_AGE: Duration = Duration::from_secs(3600);

/// Default period of the index sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Artifact store settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding archive files
    pub dir: PathBuf,

    /// Time between the first download and deletion
    pub download_retention: Duration,

    /// Upper bound on any archive's lifetime
    pub max_artifact_age: Duration,

    /// How often the whole index is scanned for expired archives
    pub sweep_interval: Duration,
}

impl StoreConfig {
    /// Settings with default durations for the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            download_retention: DEFAULT_DOWNLOAD_RETENTION,
            max_artifact_age: DEFAULT_MAX_ARTIFACT_AGE,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_download_retention(mut self, retention: Duration) -> Self {
        self.download_retention = retention;
        self
    }

    pub fn with_max_artifact_age(mut self, age: Duration) -> Self {
        self.max_artifact_age = age;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_STORAGE_DIR)
    }
}
