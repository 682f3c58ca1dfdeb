//! Decoded records.
//!
//! [`Record`] is a closed set of variants, one per registered record kind.
//! Each variant keeps the [`File`] it was decoded from plus either decoded
//! fields or an opaque body.  All variants support the same operations:
//! render a directory row ([`fmt::Display`]), hand back their header
//! ([`Record::file`]) and write their body back out ([`Record::write`]).
//!
//! Decoders live next to their record type and are wired up through
//! [`crate::registry::TypeRegistry`].

pub mod blob;
pub mod master;
pub mod payload;

use std::fmt;
use std::io::{self, Write};

use crate::cursor::ByteCursor;
use crate::error::Result;
use crate::file::File;

pub use blob::BlobRecord;
pub use master::{MasterHeader, MasterRecord};
pub use payload::{PayloadRecord, PayloadSegment, SegmentType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Master(MasterRecord),
    Payload(PayloadRecord),
    Microcode(BlobRecord),
    Spd(BlobRecord),
    Fsp(BlobRecord),
    CmosLayout(BlobRecord),
    Raw(BlobRecord),
    /// Any other registered kind that is carried as raw bytes.
    Opaque(BlobRecord),
}

impl Record {
    pub fn file(&self) -> &File {
        match self {
            Record::Master(r)  => &r.file,
            Record::Payload(r) => &r.file,
            Record::Microcode(r)
            | Record::Spd(r)
            | Record::Fsp(r)
            | Record::CmosLayout(r)
            | Record::Raw(r)
            | Record::Opaque(r) => &r.file,
        }
    }

    pub fn name(&self) -> &str {
        &self.file().name
    }

    /// Region-relative offset of the record signature.
    pub fn offset(&self) -> u64 {
        self.file().record_start
    }

    /// Body bytes as stored.  Shorter than `header.size` only for a record
    /// whose declared size runs past the end of the region.
    pub fn data(&self) -> &[u8] {
        match self {
            Record::Master(r)  => &r.data,
            Record::Payload(r) => &r.data,
            Record::Microcode(r)
            | Record::Spd(r)
            | Record::Fsp(r)
            | Record::CmosLayout(r)
            | Record::Raw(r)
            | Record::Opaque(r) => &r.data,
        }
    }

    /// Write the body unchanged.
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(self.data())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Compression is reported as "none" for every kind; bodies are
        // never decompressed.
        row(f, self.file(), "none")
    }
}

/// Column layout shared by the directory header and every record row.
pub(crate) fn format_row(
    f:           &mut fmt::Formatter<'_>,
    name:        &str,
    offset:      &str,
    file_type:   &str,
    size:        &str,
    compression: &str,
) -> fmt::Result {
    write!(f, "{:<32} {:<10} {:<16} {:<10} {}", name, offset, file_type, size, compression)
}

fn row(f: &mut fmt::Formatter<'_>, file: &File, compression: &str) -> fmt::Result {
    format_row(
        f,
        &file.name,
        &format!("{:#x}", file.record_start),
        &file.header.file_type.to_string(),
        &file.header.size.to_string(),
        compression,
    )
}

/// Consume the body that follows the name field: `header.size` bytes, cut
/// short at the end of the region.
pub(crate) fn read_body(cursor: &mut ByteCursor<'_>, file: &File) -> Result<Vec<u8>> {
    let declared = file.header.size as usize;
    let available = cursor.remaining();
    if declared > available {
        log::warn!(
            "{:?} at {:#x} declares {declared} byte(s), only {available} left in region",
            file.name, file.record_start,
        );
    }
    Ok(cursor.read(declared.min(available))?.to_vec())
}
