//! Extended file attributes.
//!
//! A record whose `attr_offset` is non-zero carries a chain of
//! tag/length/value entries between its name and its body.  `size` counts the
//! tag and size words themselves.  The chain ends at an unused tag or when
//! fewer than eight bytes are left.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{CbfsError, Result};

pub const TAG_UNUSED:      u32 = 0;
pub const TAG_UNUSED2:     u32 = 0xffff_ffff;
pub const TAG_COMPRESSION: u32 = 0x4243_5a4c; // "BCZL"
pub const TAG_HASH:        u32 = 0x6873_6148; // "hsaH"
pub const TAG_POSITION:    u32 = 0x4243_5350; // "BCSP"
pub const TAG_ALIGNMENT:   u32 = 0x4243_4c41; // "BCLA"

const ATTR_HEADER_SIZE: usize = 8;

/// Compression algorithm tag.  Recorded, never applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Lzma,
    Lz4,
    Unknown(u32),
}

impl From<u32> for Compression {
    fn from(v: u32) -> Self {
        match v {
            0 => Compression::None,
            1 => Compression::Lzma,
            2 => Compression::Lz4,
            n => Compression::Unknown(n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileAttr {
    Compression { algorithm: Compression, decompressed_size: u32 },
    Hash { hash_type: u32, digest: Vec<u8> },
    Position(u32),
    Alignment(u32),
    Unknown { tag: u32, data: Vec<u8> },
}

/// Parse the chain at the start of `bytes`.  `record_start` locates errors.
pub fn parse_chain(bytes: &[u8], record_start: u64) -> Result<Vec<FileAttr>> {
    let mut attrs = Vec::new();
    let mut at = 0usize;

    while bytes.len() - at >= ATTR_HEADER_SIZE {
        let tag = BigEndian::read_u32(&bytes[at..]);
        if tag == TAG_UNUSED || tag == TAG_UNUSED2 {
            break;
        }
        let size = BigEndian::read_u32(&bytes[at + 4..]) as usize;
        if size < ATTR_HEADER_SIZE || size > bytes.len() - at {
            return Err(CbfsError::malformed(record_start, format!(
                "attribute {tag:#010x} claims {size} bytes, {} left in name field",
                bytes.len() - at,
            )));
        }
        let data = &bytes[at + ATTR_HEADER_SIZE..at + size];
        attrs.push(decode(tag, data, record_start)?);
        at += size;
    }

    Ok(attrs)
}

fn decode(tag: u32, data: &[u8], record_start: u64) -> Result<FileAttr> {
    let need = |n: usize| {
        if data.len() < n {
            Err(CbfsError::malformed(record_start, format!(
                "attribute {tag:#010x} body is {} bytes, needs {n}", data.len(),
            )))
        } else {
            Ok(())
        }
    };

    Ok(match tag {
        TAG_COMPRESSION => {
            need(8)?;
            FileAttr::Compression {
                algorithm:         Compression::from(BigEndian::read_u32(data)),
                decompressed_size: BigEndian::read_u32(&data[4..]),
            }
        }
        TAG_HASH => {
            need(4)?;
            FileAttr::Hash {
                hash_type: BigEndian::read_u32(data),
                digest:    data[4..].to_vec(),
            }
        }
        TAG_POSITION => {
            need(4)?;
            FileAttr::Position(BigEndian::read_u32(data))
        }
        TAG_ALIGNMENT => {
            need(4)?;
            FileAttr::Alignment(BigEndian::read_u32(data))
        }
        _ => FileAttr::Unknown { tag, data: data.to_vec() },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tag: u32, body: &[u8]) -> Vec<u8> {
        let mut v = tag.to_be_bytes().to_vec();
        v.extend_from_slice(&((body.len() + 8) as u32).to_be_bytes());
        v.extend_from_slice(body);
        v
    }

    #[test]
    fn chain_of_known_and_unknown_tags() {
        let mut bytes = entry(TAG_HASH, &[0, 0, 0, 2, 0xaa, 0xbb]);
        bytes.extend(entry(TAG_ALIGNMENT, &0x1000u32.to_be_bytes()));
        bytes.extend(entry(0x1234_5678, b"xy"));
        bytes.extend([0u8; 8]);

        let attrs = parse_chain(&bytes, 0).unwrap();
        assert_eq!(attrs, vec![
            FileAttr::Hash { hash_type: 2, digest: vec![0xaa, 0xbb] },
            FileAttr::Alignment(0x1000),
            FileAttr::Unknown { tag: 0x1234_5678, data: b"xy".to_vec() },
        ]);
    }

    #[test]
    fn unused_tag_ends_chain() {
        let mut bytes = 0xffff_ffffu32.to_be_bytes().to_vec();
        bytes.extend([0u8; 12]);
        assert!(parse_chain(&bytes, 0).unwrap().is_empty());
    }

    #[test]
    fn oversized_attribute_is_malformed() {
        let mut bytes = TAG_POSITION.to_be_bytes().to_vec();
        bytes.extend(64u32.to_be_bytes());
        bytes.extend([0u8; 4]);
        assert!(matches!(
            parse_chain(&bytes, 0x40),
            Err(CbfsError::MalformedRecord { offset: 0x40, .. })
        ));
    }

    #[test]
    fn undersized_compression_body_is_malformed() {
        let bytes = entry(TAG_COMPRESSION, &[0, 0, 0, 1]);
        assert!(parse_chain(&bytes, 0).is_err());
    }

    #[test]
    fn compression_values() {
        assert_eq!(Compression::from(0), Compression::None);
        assert_eq!(Compression::from(2), Compression::Lz4);
        assert_eq!(Compression::from(9), Compression::Unknown(9));
    }
}
