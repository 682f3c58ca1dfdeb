//! CBFS record framing: the fixed header, record types and the name field.
//!
//! Layout of one record, offsets relative to the record start:
//!
//! ```text
//! 0x00  "LARCHIVE"        signature
//! 0x08  size         u32  body length
//! 0x0c  type         u32  record type
//! 0x10  attr_offset  u32  extended attribute chain, 0 = none
//! 0x14  offset       u32  start of the body
//! 0x18  name ...          NUL padded, followed by attributes if any
//! ```
//!
//! Every field is big-endian.  Records start on a 64-byte boundary.

use byteorder::{BigEndian, WriteBytesExt};
use std::fmt;
use std::io::{self, Write};

use crate::attr::{self, Compression, FileAttr};
use crate::cursor::ByteCursor;
use crate::error::{CbfsError, Result};

pub const FILE_MAGIC: &[u8; 8] = b"LARCHIVE";
/// Signature plus the four u32 header fields.
pub const FILE_HEADER_SIZE: usize = 24;
/// Boundary every record starts on.
pub const ALIGNMENT: usize = 64;

// ── FileType ─────────────────────────────────────────────────────────────────

/// Record type identifier as stored on disk.
///
/// Any value is representable; only the ones with a registered decoder can be
/// scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileType(pub u32);

impl FileType {
    pub const DELETED:      FileType = FileType(0);
    /// Undocumented but used by every image for the master header.
    pub const MASTER:       FileType = FileType(2);
    pub const STAGE:        FileType = FileType(0x10);
    pub const SELF:         FileType = FileType(0x20);
    pub const FIT:          FileType = FileType(0x21);
    pub const OPTION_ROM:   FileType = FileType(0x30);
    pub const BOOT_SPLASH:  FileType = FileType(0x40);
    pub const RAW:          FileType = FileType(0x50);
    pub const VSA:          FileType = FileType(0x51);
    pub const MBI:          FileType = FileType(0x52);
    pub const MICROCODE:    FileType = FileType(0x53);
    pub const FSP:          FileType = FileType(0x60);
    pub const MRC:          FileType = FileType(0x61);
    pub const MMA:          FileType = FileType(0x62);
    pub const EFI:          FileType = FileType(0x63);
    pub const STRUCT:       FileType = FileType(0x70);
    pub const CMOS_DEFAULT: FileType = FileType(0xaa);
    pub const SPD:          FileType = FileType(0xab);
    pub const MRC_CACHE:    FileType = FileType(0xac);
    pub const CMOS_LAYOUT:  FileType = FileType(0x1aa);
    pub const DELETED2:     FileType = FileType(0xffff_ffff);

    /// Display name, or `None` for a value this build does not know.
    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            FileType::DELETED | FileType::DELETED2 => "(empty)",
            FileType::MASTER       => "cbfs header",
            FileType::STAGE        => "stage",
            FileType::SELF         => "simple elf",
            FileType::FIT          => "fit",
            FileType::OPTION_ROM   => "optionrom",
            FileType::BOOT_SPLASH  => "bootsplash",
            FileType::RAW          => "raw",
            FileType::VSA          => "vsa",
            FileType::MBI          => "mbi",
            FileType::MICROCODE    => "microcode",
            FileType::FSP          => "fsp",
            FileType::MRC          => "mrc",
            FileType::MMA          => "mma",
            FileType::EFI          => "efi",
            FileType::STRUCT       => "struct",
            FileType::CMOS_DEFAULT => "cmos_default",
            FileType::SPD          => "spd",
            FileType::MRC_CACHE    => "mrc_cache",
            FileType::CMOS_LAYOUT  => "cmos_layout",
            _ => return None,
        })
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.pad(name),
            None       => f.pad(&format!("{:#x}", self.0)),
        }
    }
}

impl From<u32> for FileType {
    fn from(v: u32) -> Self {
        FileType(v)
    }
}

// ── FileHeader ───────────────────────────────────────────────────────────────

/// The four integer fields that follow the signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub size:        u32,
    pub file_type:   FileType,
    pub attr_offset: u32,
    pub offset:      u32,
}

impl FileHeader {
    /// Read the header fields; the signature must already be consumed.
    pub fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        Ok(Self {
            size:        cursor.read_u32()?,
            file_type:   FileType(cursor.read_u32()?),
            attr_offset: cursor.read_u32()?,
            offset:      cursor.read_u32()?,
        })
    }

    /// Write signature and header fields.
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(FILE_MAGIC)?;
        writer.write_u32::<BigEndian>(self.size)?;
        writer.write_u32::<BigEndian>(self.file_type.0)?;
        writer.write_u32::<BigEndian>(self.attr_offset)?;
        writer.write_u32::<BigEndian>(self.offset)?;
        Ok(())
    }
}

// ── File ─────────────────────────────────────────────────────────────────────

/// Everything known about a record before its type-specific decoder runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub header:       FileHeader,
    pub name:         String,
    /// Region-relative offset of the signature.
    pub record_start: u64,
    pub attributes:   Vec<FileAttr>,
}

impl File {
    /// Decode the fixed header and the name field of a record whose
    /// signature has just matched at `record_start`.
    ///
    /// On return the cursor sits at `record_start + header.offset`, the first
    /// byte of the body.  Running out of bytes here is a malformed record,
    /// not a truncated region.
    pub fn read(cursor: &mut ByteCursor<'_>, record_start: u64) -> Result<Self> {
        let header = FileHeader::read(cursor).map_err(|e| {
            CbfsError::malformed(record_start, format!("header: {e}"))
        })?;

        let consumed = cursor.position() - record_start;
        let name_len = u64::from(header.offset)
            .checked_sub(consumed)
            .ok_or_else(|| CbfsError::malformed(record_start, format!(
                "sub-header offset {:#x} lies inside the {consumed}-byte fixed header",
                header.offset,
            )))?;
        let name_len = usize::try_from(name_len)
            .map_err(|_| CbfsError::malformed(record_start, "name field too large"))?;

        let field = cursor.read(name_len).map_err(|e| {
            CbfsError::malformed(record_start, format!("name: {e}"))
        })?;

        let (name_bytes, attributes) = if header.attr_offset == 0 {
            (field, Vec::new())
        } else {
            let start = u64::from(header.attr_offset)
                .checked_sub(FILE_HEADER_SIZE as u64)
                .filter(|&s| s <= name_len as u64)
                .ok_or_else(|| CbfsError::malformed(record_start, format!(
                    "attribute offset {:#x} outside name field [{:#x}, {:#x}]",
                    header.attr_offset, FILE_HEADER_SIZE, header.offset,
                )))? as usize;
            (&field[..start], attr::parse_chain(&field[start..], record_start)?)
        };

        Ok(Self {
            header,
            name: decode_name(name_bytes),
            record_start,
            attributes,
        })
    }

    /// Compression recorded in the attribute chain.  Informational only;
    /// bodies are never decompressed.
    pub fn compression(&self) -> Compression {
        self.attributes
            .iter()
            .find_map(|a| match a {
                FileAttr::Compression { algorithm, .. } => Some(*algorithm),
                _ => None,
            })
            .unwrap_or(Compression::None)
    }
}

/// Name bytes up to the first NUL, lossily decoded.
fn decode_name(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(file_type: u32, attr_offset: u32, offset: u32, name_field: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        FileHeader { size: 0, file_type: FileType(file_type), attr_offset, offset }
            .write(&mut buf)
            .unwrap();
        buf.extend_from_slice(name_field);
        buf
    }

    fn read_after_magic(buf: &[u8]) -> Result<File> {
        let mut c = ByteCursor::new(buf);
        c.read(8).unwrap();
        File::read(&mut c, 0)
    }

    #[test]
    fn name_is_trimmed_at_nul() {
        let buf = record(0x50, 0, 32, b"config\0\0");
        let file = read_after_magic(&buf).unwrap();
        assert_eq!(file.name, "config");
        assert_eq!(file.header.file_type, FileType::RAW);
        assert!(file.attributes.is_empty());
    }

    #[test]
    fn empty_name_when_offset_equals_header_size() {
        let buf = record(0x50, 0, 24, b"");
        assert_eq!(read_after_magic(&buf).unwrap().name, "");
    }

    #[test]
    fn offset_inside_header_is_malformed() {
        let buf = record(0x50, 0, 16, b"");
        assert!(matches!(read_after_magic(&buf), Err(CbfsError::MalformedRecord { offset: 0, .. })));
    }

    #[test]
    fn name_past_region_is_malformed() {
        let buf = record(0x50, 0, 64, b"short");
        assert!(matches!(read_after_magic(&buf), Err(CbfsError::MalformedRecord { .. })));
    }

    #[test]
    fn short_header_is_malformed() {
        let buf = b"LARCHIVE\0\0\0\x10\0\0".to_vec();
        assert!(matches!(read_after_magic(&buf), Err(CbfsError::MalformedRecord { .. })));
    }

    #[test]
    fn attribute_offset_before_name_is_malformed() {
        let buf = record(0x50, 8, 32, b"abc\0\0\0\0\0");
        assert!(matches!(read_after_magic(&buf), Err(CbfsError::MalformedRecord { .. })));
    }

    #[test]
    fn attribute_offset_past_name_is_malformed() {
        let buf = record(0x50, 40, 32, b"abc\0\0\0\0\0");
        match read_after_magic(&buf) {
            Err(CbfsError::MalformedRecord { offset: 0, reason }) => {
                assert!(reason.contains("attribute offset 0x28"), "{reason}");
            }
            other => panic!("expected MalformedRecord, got {other:?}"),
        }
    }

    #[test]
    fn compression_attribute_is_recorded() {
        let mut field = b"fallback/ramstage\0\0\0\0\0\0\0".to_vec(); // 24 bytes
        field.extend_from_slice(&0x4243_5a4cu32.to_be_bytes());
        field.extend_from_slice(&16u32.to_be_bytes());
        field.extend_from_slice(&1u32.to_be_bytes());
        field.extend_from_slice(&0x2000u32.to_be_bytes());
        let buf = record(0x10, 48, 64, &field);

        let file = read_after_magic(&buf).unwrap();
        assert_eq!(file.name, "fallback/ramstage");
        assert_eq!(file.compression(), Compression::Lzma);
    }

    #[test]
    fn type_display() {
        assert_eq!(FileType::SELF.to_string(), "simple elf");
        assert_eq!(FileType(0x1234).to_string(), "0x1234");
    }
}
