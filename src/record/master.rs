//! The master header record.
//!
//! Stored as an ordinary record of type 2.  The 32-byte CBFS master header
//! follows the name field whatever the record's `size` says; older images
//! declare a size of zero.  Bootblock code locates it through a pointer
//! at the end of the flash; here it is just the first record of its kind in
//! the directory.

use byteorder::{BigEndian, WriteBytesExt};
use std::io::{self, Write};

use super::{read_body, Record};
use crate::cursor::ByteCursor;
use crate::error::{CbfsError, Result};
use crate::file::{File, FileType};
use crate::registry::TypeRegistry;

pub const KIND: &str = "cbfs master";

pub const HEADER_MAGIC:     u32 = 0x4F52_4243; // "ORBC"
pub const HEADER_V2:        u32 = 0x3131_3132;
pub const MASTER_HEADER_SIZE: usize = 32;

pub const ARCH_X86: u32 = 1;
pub const ARCH_ARM: u32 = 0x10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterHeader {
    pub magic:           u32,
    pub version:         u32,
    pub rom_size:        u32,
    pub boot_block_size: u32,
    pub align:           u32,
    pub offset:          u32,
    pub architecture:    u32,
    pub pad:             u32,
}

impl MasterHeader {
    pub fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        Ok(Self {
            magic:           cursor.read_u32()?,
            version:         cursor.read_u32()?,
            rom_size:        cursor.read_u32()?,
            boot_block_size: cursor.read_u32()?,
            align:           cursor.read_u32()?,
            offset:          cursor.read_u32()?,
            architecture:    cursor.read_u32()?,
            pad:             cursor.read_u32()?,
        })
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        for v in [
            self.magic,
            self.version,
            self.rom_size,
            self.boot_block_size,
            self.align,
            self.offset,
            self.architecture,
            self.pad,
        ] {
            writer.write_u32::<BigEndian>(v)?;
        }
        Ok(())
    }

    pub fn architecture_name(&self) -> &'static str {
        match self.architecture {
            ARCH_X86 => "x86",
            ARCH_ARM => "arm",
            _        => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterRecord {
    pub file:   File,
    pub header: MasterHeader,
    pub data:   Vec<u8>,
}

impl MasterRecord {
    /// Whether the header carries the master magic.  Not enforced while
    /// scanning.
    pub fn is_valid(&self) -> bool {
        self.header.magic == HEADER_MAGIC
    }
}

pub fn register(registry: &mut TypeRegistry) -> Result<()> {
    registry.register(FileType::MASTER, KIND, decode)
}

fn decode(cursor: &mut ByteCursor<'_>, file: File) -> Result<Record> {
    // Read the header from a copy so only the declared body is consumed.
    let header = MasterHeader::read(&mut cursor.clone()).map_err(|_| CbfsError::Truncated {
        offset:    cursor.position(),
        wanted:    MASTER_HEADER_SIZE,
        available: cursor.remaining(),
    })?;
    let data = read_body(cursor, &file)?;
    log::debug!("master header at {:#x}: {:x?}", file.record_start, header);
    Ok(Record::Master(MasterRecord { file, header, data }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::FileHeader;

    fn file(size: u32) -> File {
        File {
            header: FileHeader { size, file_type: FileType::MASTER, attr_offset: 0, offset: 32 },
            name: "cbfs master header".into(),
            record_start: 0x40,
            attributes: Vec::new(),
        }
    }

    #[test]
    fn decodes_header_from_body() {
        let header = MasterHeader {
            magic: HEADER_MAGIC,
            version: HEADER_V2,
            rom_size: 0x40_0000,
            boot_block_size: 0x800,
            align: 64,
            offset: 0x200,
            architecture: ARCH_X86,
            pad: 0xffff_ffff,
        };
        let mut body = Vec::new();
        header.write(&mut body).unwrap();

        let mut cursor = ByteCursor::new(&body);
        let record = match decode(&mut cursor, file(32)).unwrap() {
            Record::Master(m) => m,
            other => panic!("expected master, got {other:?}"),
        };
        assert_eq!(record.header, header);
        assert!(record.is_valid());
        assert_eq!(record.header.architecture_name(), "x86");
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn header_is_read_whatever_the_declared_size() {
        let mut bytes = Vec::new();
        MasterHeader { magic: HEADER_MAGIC, version: HEADER_V2, rom_size: 0x1000, boot_block_size: 0,
                       align: 64, offset: 0, architecture: ARCH_ARM, pad: 0 }
            .write(&mut bytes)
            .unwrap();

        let mut cursor = ByteCursor::new(&bytes);
        let record = match decode(&mut cursor, file(0)).unwrap() {
            Record::Master(m) => m,
            other => panic!("expected master, got {other:?}"),
        };
        assert!(record.is_valid());
        assert_eq!(record.header.architecture_name(), "arm");
        assert!(record.data.is_empty());
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn header_past_region_is_truncated() {
        let bytes = [0u8; 16];
        match decode(&mut ByteCursor::new(&bytes), file(16)) {
            Err(CbfsError::Truncated { offset: 0, wanted, available }) => {
                assert_eq!((wanted, available), (MASTER_HEADER_SIZE, 16));
            }
            other => panic!("expected Truncated, got {other:?}"),
        }
    }

    #[test]
    fn wrong_magic_decodes_but_is_not_valid() {
        let body = [0u8; 32];
        match decode(&mut ByteCursor::new(&body), file(32)).unwrap() {
            Record::Master(m) => assert!(!m.is_valid()),
            other => panic!("expected master, got {other:?}"),
        }
    }
}
