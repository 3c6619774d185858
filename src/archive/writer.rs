//! In-memory ZIP writer.

use std::collections::HashSet;
use std::io::Write;

use bytes::Bytes;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use tracing::debug;

use crate::error::ArchiveError;
use crate::transcode::TranscodedItem;

use super::structures::{
    CentralDirectoryHeader, DosDateTime, EndOfCentralDirectory, EntryHeader, LocalFileHeader,
};

/// Classic (non-ZIP64) entry count limit.
const MAX_ENTRIES: usize = u16::MAX as usize;

/// Builds a deflate-compressed ZIP archive in memory.
///
/// Entries are written in the order they are added, which is also the order
/// of the central directory. Adding a name twice is an error.
///
/// # Example
///
/// ```ignore
/// let mut builder = ArchiveBuilder::new();
/// builder.add(&first)?;
/// builder.add(&second)?;
/// let zip: Bytes = builder.finish()?;
/// ```
pub struct ArchiveBuilder {
    buf: Vec<u8>,
    entries: Vec<EntryHeader>,
    names: HashSet<String>,
    modified: DosDateTime,
    level: Compression,
}

impl ArchiveBuilder {
    /// Create a builder stamping entries with the current time.
    pub fn new() -> Self {
        Self::with_timestamp(DosDateTime::now())
    }

    /// Create a builder with a fixed modification stamp.
    pub fn with_timestamp(modified: DosDateTime) -> Self {
        Self {
            buf: Vec::new(),
            entries: Vec::new(),
            names: HashSet::new(),
            modified,
            level: Compression::default(),
        }
    }

    /// Number of entries added so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append one entry.
    pub fn add(&mut self, item: &TranscodedItem) -> Result<(), ArchiveError> {
        if self.entries.len() >= MAX_ENTRIES {
            return Err(ArchiveError::TooLarge {
                reason: format!("more than {} entries", MAX_ENTRIES),
            });
        }
        if item.filename.len() > u16::MAX as usize {
            return Err(ArchiveError::TooLarge {
                reason: "entry name longer than 65535 bytes".to_string(),
            });
        }
        if !self.names.insert(item.filename.clone()) {
            return Err(ArchiveError::DuplicateEntry {
                name: item.filename.clone(),
            });
        }

        let mut encoder = DeflateEncoder::new(Vec::new(), self.level);
        encoder.write_all(&item.data)?;
        let compressed = encoder.finish()?;

        let entry = EntryHeader {
            name: item.filename.clone(),
            modified: self.modified,
            crc32: crc32fast::hash(&item.data),
            compressed_size: to_u32(compressed.len(), "compressed entry")?,
            uncompressed_size: to_u32(item.data.len(), "entry")?,
            local_header_offset: to_u32(self.buf.len(), "archive offset")?,
        };

        LocalFileHeader::write(&mut self.buf, &entry)?;
        self.buf.extend_from_slice(&compressed);

        debug!(
            name = %entry.name,
            uncompressed = entry.uncompressed_size,
            compressed = entry.compressed_size,
            "Added archive entry"
        );

        self.entries.push(entry);
        Ok(())
    }

    /// Write the central directory and return the finished archive.
    pub fn finish(mut self) -> Result<Bytes, ArchiveError> {
        let cd_offset = to_u32(self.buf.len(), "central directory offset")?;

        for entry in &self.entries {
            CentralDirectoryHeader::write(&mut self.buf, entry)?;
        }

        let cd_size = to_u32(self.buf.len() - cd_offset as usize, "central directory")?;

        EndOfCentralDirectory {
            total_entries: self.entries.len() as u16,
            cd_size,
            cd_offset,
        }
        .write(&mut self.buf)?;

        Ok(Bytes::from(self.buf))
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn to_u32(value: usize, what: &str) -> Result<u32, ArchiveError> {
    u32::try_from(value).map_err(|_| ArchiveError::TooLarge {
        reason: format!("{} exceeds 4 GiB", what),
    })
}

/// Serialize items into one ZIP archive, preserving their order.
pub fn build_archive(items: &[TranscodedItem]) -> Result<Bytes, ArchiveError> {
    let mut builder = ArchiveBuilder::new();
    for item in items {
        builder.add(item)?;
    }
    builder.finish()
}
