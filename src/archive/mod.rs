//! ZIP archive assembly.
//!
//! Transcoded JPEGs are packed into a single deflate-compressed ZIP held in
//! memory. The layout is the classic one:
//!
//! 1. Local file header + compressed data for each entry, in input order
//! 2. Central directory with one record per entry, same order
//! 3. End of central directory record
//!
//! ## Limits
//!
//! - No ZIP64: at most 65535 entries and 4 GiB of data
//! - Deflate only, no encryption, no comments

mod structures;
mod writer;

pub use structures::{
    CentralDirectoryHeader, DosDateTime, EndOfCentralDirectory, EntryHeader, LocalFileHeader,
};
pub use writer::{build_archive, ArchiveBuilder};
