//! Backing storage for archive bytes.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use uuid::Uuid;

use crate::error::StorageError;

// =============================================================================
// BlobStore Trait
// =============================================================================

/// Key/value object storage the artifact store writes archives into.
///
/// Keys are archive handles; implementations may assume they are already
/// filesystem-safe.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key`. Either the whole object becomes visible or
    /// nothing does.
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StorageError>;

    /// Fetch the object, or `None` if it does not exist.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StorageError>;

    /// Remove the object. Missing objects yield [`StorageError::NotFound`].
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Keys of every stored object.
    async fn list(&self) -> Result<Vec<String>, StorageError>;
}

// =============================================================================
// Filesystem Backend
// =============================================================================

/// Stores each object as one file in a directory.
///
/// Writes go to a hidden `.part` file first and are renamed into place, so a
/// failed write never leaves a readable partial archive.
pub struct FsBlobStore {
    directory: PathBuf,
}

impl FsBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            directory: dir.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    #[inline]
    fn format_path(&self, key: &str) -> PathBuf {
        self.directory.join(key)
    }

    async fn write_new(&self, path: &Path, data: &[u8]) -> std::io::Result<()> {
        match tokio::fs::write(path, data).await {
            Err(ref e) if e.kind() == ErrorKind::NotFound => {
                tokio::fs::create_dir_all(&self.directory).await?;
                tokio::fs::write(path, data).await
            }
            other => other,
        }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        let path = self.format_path(key);
        let temp = self
            .directory
            .join(format!(".{}.{}.part", key, Uuid::new_v4().simple()));

        debug!("Storing archive @ {:?}", &path);
        let written = match self.write_new(&temp, &data).await {
            Ok(()) => tokio::fs::rename(&temp, &path).await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StorageError> {
        let path = self.format_path(key);

        debug!("Retrieving archive @ {:?}", &path);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(ref e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(other) => Err(other.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.format_path(key);

        debug!("Purging archive @ {:?}", &path);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(ref e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound {
                handle: key.to_string(),
            }),
            Err(other) => Err(other.into()),
        }
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(ref e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(other) => return Err(other.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                keys.push(name.to_string());
            }
        }
        Ok(keys)
    }
}
