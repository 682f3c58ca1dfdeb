//! SELF payloads.
//!
//! The body of a SELF record is a table of 28-byte segment descriptors
//! followed by the segment data.  The table is terminated by an `ENTRY`
//! segment whose load address is the payload entry point.

use byteorder::{BigEndian, WriteBytesExt};
use std::fmt;
use std::io::{self, Write};

use super::{read_body, Record};
use crate::attr::Compression;
use crate::cursor::ByteCursor;
use crate::error::Result;
use crate::file::{File, FileType};
use crate::registry::TypeRegistry;

pub const KIND: &str = "payload";

pub const SEGMENT_SIZE: usize = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentType(pub u32);

impl SegmentType {
    pub const CODE:   SegmentType = SegmentType(0x434F_4445); // "CODE"
    pub const DATA:   SegmentType = SegmentType(0x4441_5441); // "DATA"
    pub const BSS:    SegmentType = SegmentType(0x4253_5320); // "BSS "
    pub const PARAMS: SegmentType = SegmentType(0x5041_5241); // "PARA"
    pub const ENTRY:  SegmentType = SegmentType(0x454E_5452); // "ENTR"
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            SegmentType::CODE   => "code",
            SegmentType::DATA   => "data",
            SegmentType::BSS    => "bss",
            SegmentType::PARAMS => "params",
            SegmentType::ENTRY  => "entry",
            SegmentType(other)  => return write!(f, "{other:#x}"),
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadSegment {
    pub segment_type: SegmentType,
    pub compression:  Compression,
    pub offset:       u32,
    pub load_address: u64,
    pub size:         u32,
    pub mem_size:     u32,
}

impl PayloadSegment {
    pub fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        Ok(Self {
            segment_type: SegmentType(cursor.read_u32()?),
            compression:  Compression::from(cursor.read_u32()?),
            offset:       cursor.read_u32()?,
            load_address: cursor.read_u64()?,
            size:         cursor.read_u32()?,
            mem_size:     cursor.read_u32()?,
        })
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        let compression = match self.compression {
            Compression::None       => 0,
            Compression::Lzma       => 1,
            Compression::Lz4        => 2,
            Compression::Unknown(n) => n,
        };
        writer.write_u32::<BigEndian>(self.segment_type.0)?;
        writer.write_u32::<BigEndian>(compression)?;
        writer.write_u32::<BigEndian>(self.offset)?;
        writer.write_u64::<BigEndian>(self.load_address)?;
        writer.write_u32::<BigEndian>(self.size)?;
        writer.write_u32::<BigEndian>(self.mem_size)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadRecord {
    pub file:     File,
    pub segments: Vec<PayloadSegment>,
    pub data:     Vec<u8>,
}

impl PayloadRecord {
    /// Load address of the `ENTRY` segment.
    pub fn entry_point(&self) -> Option<u64> {
        self.segments
            .iter()
            .find(|s| s.segment_type == SegmentType::ENTRY)
            .map(|s| s.load_address)
    }
}

pub fn register(registry: &mut TypeRegistry) -> Result<()> {
    registry.register(FileType::SELF, KIND, decode)
}

fn decode(cursor: &mut ByteCursor<'_>, file: File) -> Result<Record> {
    let data = read_body(cursor, &file)?;

    // A table cut short by the end of the body just ends early.
    let mut segments = Vec::new();
    let mut table = ByteCursor::new(&data);
    while table.remaining() >= SEGMENT_SIZE {
        let seg = PayloadSegment::read(&mut table)?;
        segments.push(seg);
        if seg.segment_type == SegmentType::ENTRY {
            break;
        }
    }
    log::debug!("payload {} has {} segment(s)", file.name, segments.len());

    Ok(Record::Payload(PayloadRecord { file, segments, data }))
}
