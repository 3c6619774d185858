//! ZIP record layouts used by the writer.
//!
//! All multi-byte fields are little-endian (PKWARE APPNOTE 6.3).

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use chrono::{DateTime, Datelike, Timelike, Utc};

/// Version needed to extract: 2.0 (deflate).
pub const VERSION_NEEDED: u16 = 20;

/// Version made by: upper byte 3 = UNIX, lower byte = spec 2.0.
pub const VERSION_MADE_BY: u16 = (3 << 8) | 20;

/// General purpose flag bit 11: names are UTF-8.
pub const FLAG_UTF8: u16 = 1 << 11;

/// Compression method 8: deflate.
pub const METHOD_DEFLATE: u16 = 8;

/// External attributes: regular file, mode 0644.
pub const EXTERNAL_ATTRS: u32 = 0o100644 << 16;

/// Modification stamp in MS-DOS format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosDateTime {
    pub time: u16,
    pub date: u16,
}

impl DosDateTime {
    /// 1980-01-01 00:00:00, the earliest representable stamp.
    pub const EPOCH: DosDateTime = DosDateTime {
        time: 0,
        date: (1 << 5) | 1,
    };

    /// Build from calendar fields. Years outside 1980-2107 clamp to the range.
    pub fn from_parts(year: u32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Self {
        let year = year.clamp(1980, 2107);
        Self {
            time: ((hour << 11) | (minute << 5) | (second / 2)) as u16,
            date: (((year - 1980) << 9) | (month << 5) | day) as u16,
        }
    }

    /// Convert a UTC timestamp to a DOS stamp. Anything before 1980 maps to
    /// [`DosDateTime::EPOCH`].
    pub fn from_datetime(t: DateTime<Utc>) -> Self {
        if t.year() < 1980 {
            return Self::EPOCH;
        }
        Self::from_parts(
            t.year() as u32,
            t.month(),
            t.day(),
            t.hour(),
            t.minute(),
            t.second(),
        )
    }

    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }
}

/// Per-entry values shared by the local header and the central directory.
#[derive(Debug, Clone)]
pub struct EntryHeader {
    pub name: String,
    pub modified: DosDateTime,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub local_header_offset: u32,
}

/// Local File Header - 30 bytes plus name
pub struct LocalFileHeader;

impl LocalFileHeader {
    pub const SIGNATURE: &'static [u8] = b"PK\x03\x04";
    pub const SIZE: usize = 30;

    pub fn write<W: Write>(out: &mut W, entry: &EntryHeader) -> std::io::Result<()> {
        out.write_all(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(VERSION_NEEDED)?;
        out.write_u16::<LittleEndian>(FLAG_UTF8)?;
        out.write_u16::<LittleEndian>(METHOD_DEFLATE)?;
        out.write_u16::<LittleEndian>(entry.modified.time)?;
        out.write_u16::<LittleEndian>(entry.modified.date)?;
        out.write_u32::<LittleEndian>(entry.crc32)?;
        out.write_u32::<LittleEndian>(entry.compressed_size)?;
        out.write_u32::<LittleEndian>(entry.uncompressed_size)?;
        out.write_u16::<LittleEndian>(entry.name.len() as u16)?;
        out.write_u16::<LittleEndian>(0)?; // extra field length
        out.write_all(entry.name.as_bytes())
    }
}

/// Central Directory File Header - 46 bytes plus name
pub struct CentralDirectoryHeader;

impl CentralDirectoryHeader {
    pub const SIGNATURE: &'static [u8] = b"PK\x01\x02";
    pub const SIZE: usize = 46;

    pub fn write<W: Write>(out: &mut W, entry: &EntryHeader) -> std::io::Result<()> {
        out.write_all(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(VERSION_MADE_BY)?;
        out.write_u16::<LittleEndian>(VERSION_NEEDED)?;
        out.write_u16::<LittleEndian>(FLAG_UTF8)?;
        out.write_u16::<LittleEndian>(METHOD_DEFLATE)?;
        out.write_u16::<LittleEndian>(entry.modified.time)?;
        out.write_u16::<LittleEndian>(entry.modified.date)?;
        out.write_u32::<LittleEndian>(entry.crc32)?;
        out.write_u32::<LittleEndian>(entry.compressed_size)?;
        out.write_u32::<LittleEndian>(entry.uncompressed_size)?;
        out.write_u16::<LittleEndian>(entry.name.len() as u16)?;
        out.write_u16::<LittleEndian>(0)?; // extra field length
        out.write_u16::<LittleEndian>(0)?; // comment length
        out.write_u16::<LittleEndian>(0)?; // disk number start
        out.write_u16::<LittleEndian>(0)?; // internal attributes
        out.write_u32::<LittleEndian>(EXTERNAL_ATTRS)?;
        out.write_u32::<LittleEndian>(entry.local_header_offset)?;
        out.write_all(entry.name.as_bytes())
    }
}

/// End of Central Directory (EOCD) - 22 bytes, no comment
pub struct EndOfCentralDirectory {
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn write<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        out.write_all(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(0)?; // this disk
        out.write_u16::<LittleEndian>(0)?; // disk with central directory
        out.write_u16::<LittleEndian>(self.total_entries)?;
        out.write_u16::<LittleEndian>(self.total_entries)?;
        out.write_u32::<LittleEndian>(self.cd_size)?;
        out.write_u32::<LittleEndian>(self.cd_offset)?;
        out.write_u16::<LittleEndian>(0) // comment length
    }
}
