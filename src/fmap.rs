//! Flash map (FMAP) lookup.
//!
//! Just enough of the FMAP format to find the byte range of a named area.
//! The FMAP header and area table are little-endian:
//!
//! ```text
//! header  "__FMAP__" ver_major:u8 ver_minor:u8 base:u64 size:u32 name:[u8;32] nareas:u16
//! area    offset:u32 size:u32 name:[u8;32] flags:u16
//! ```
//!
//! Area offsets are relative to the start of the flash image.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use thiserror::Error;

use crate::error::{CbfsError, Result};

pub const FMAP_SIGNATURE: &[u8; 8] = b"__FMAP__";
pub const FMAP_VER_MAJOR: u8 = 1;
pub const FMAP_NAME_LEN:  usize = 32;
pub const FMAP_HEADER_SIZE: usize = 8 + 1 + 1 + 8 + 4 + FMAP_NAME_LEN + 2;
pub const FMAP_AREA_SIZE:   usize = 4 + 4 + FMAP_NAME_LEN + 2;

/// Area holding the CBFS on coreboot images.
pub const DEFAULT_REGION: &str = "COREBOOT";

#[derive(Error, Debug)]
pub enum FmapError {
    #[error("no FMAP signature in image")]
    NotFound,
    #[error("FMAP at {offset:#x} is truncated")]
    Truncated { offset: usize },
    #[error("unsupported FMAP version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },
    #[error("area {name} [{offset:#x}, +{size:#x}) lies outside the {image_len:#x}-byte image")]
    AreaOutOfBounds { name: String, offset: u32, size: u32, image_len: usize },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FmapArea {
    pub offset: u32,
    pub size:   u32,
    pub name:   String,
    pub flags:  u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fmap {
    pub ver_major: u8,
    pub ver_minor: u8,
    pub base:      u64,
    pub size:      u32,
    pub name:      String,
    pub areas:     Vec<FmapArea>,
}

impl Fmap {
    /// Search `image` for the first signature that starts a valid FMAP.
    pub fn find(image: &[u8]) -> std::result::Result<(usize, Self), FmapError> {
        let mut last_err = FmapError::NotFound;
        for (pos, window) in image.windows(FMAP_SIGNATURE.len()).enumerate() {
            if window != FMAP_SIGNATURE {
                continue;
            }
            match Self::parse(&image[pos..]) {
                Ok(fmap) => {
                    log::debug!("FMAP {} at {pos:#x} with {} area(s)", fmap.name, fmap.areas.len());
                    return Ok((pos, fmap));
                }
                Err(FmapError::Truncated { .. }) => {
                    last_err = FmapError::Truncated { offset: pos };
                }
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }

    /// Parse an FMAP that starts at `bytes[0]`.
    pub fn parse(bytes: &[u8]) -> std::result::Result<Self, FmapError> {
        if bytes.len() < FMAP_HEADER_SIZE {
            return Err(FmapError::Truncated { offset: 0 });
        }
        let mut r = bytes;
        let mut signature = [0u8; 8];
        r.read_exact(&mut signature)?;
        if &signature != FMAP_SIGNATURE {
            return Err(FmapError::NotFound);
        }
        let ver_major = r.read_u8()?;
        let ver_minor = r.read_u8()?;
        if ver_major != FMAP_VER_MAJOR {
            return Err(FmapError::UnsupportedVersion { major: ver_major, minor: ver_minor });
        }
        let base = r.read_u64::<LittleEndian>()?;
        let size = r.read_u32::<LittleEndian>()?;
        let name = read_name(&mut r)?;
        let nareas = r.read_u16::<LittleEndian>()? as usize;

        if r.len() < nareas * FMAP_AREA_SIZE {
            return Err(FmapError::Truncated { offset: 0 });
        }
        let mut areas = Vec::with_capacity(nareas);
        for _ in 0..nareas {
            areas.push(FmapArea {
                offset: r.read_u32::<LittleEndian>()?,
                size:   r.read_u32::<LittleEndian>()?,
                name:   read_name(&mut r)?,
                flags:  r.read_u16::<LittleEndian>()?,
            });
        }

        Ok(Self { ver_major, ver_minor, base, size, name, areas })
    }

    pub fn area(&self, name: &str) -> Option<&FmapArea> {
        self.areas.iter().find(|a| a.name == name)
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(FMAP_SIGNATURE)?;
        writer.write_u8(self.ver_major)?;
        writer.write_u8(self.ver_minor)?;
        writer.write_u64::<LittleEndian>(self.base)?;
        writer.write_u32::<LittleEndian>(self.size)?;
        write_name(&mut writer, &self.name)?;
        writer.write_u16::<LittleEndian>(self.areas.len() as u16)?;
        for a in &self.areas {
            writer.write_u32::<LittleEndian>(a.offset)?;
            writer.write_u32::<LittleEndian>(a.size)?;
            write_name(&mut writer, &a.name)?;
            writer.write_u16::<LittleEndian>(a.flags)?;
        }
        Ok(())
    }
}

fn read_name<R: Read>(mut r: R) -> io::Result<String> {
    let mut raw = [0u8; FMAP_NAME_LEN];
    r.read_exact(&mut raw)?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(FMAP_NAME_LEN);
    Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
}

fn write_name<W: Write>(mut w: W, name: &str) -> io::Result<()> {
    let mut raw = [0u8; FMAP_NAME_LEN];
    let n = name.len().min(FMAP_NAME_LEN - 1);
    raw[..n].copy_from_slice(&name.as_bytes()[..n]);
    w.write_all(&raw)
}

// ── Region ───────────────────────────────────────────────────────────────────

/// Byte range of a named area inside the raw image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub name:   String,
    pub offset: u64,
    pub size:   u64,
}

impl Region {
    /// Whole buffer as an unnamed region, for images that are a bare CBFS.
    pub fn whole(data: &[u8]) -> Self {
        Self { name: String::new(), offset: 0, size: data.len() as u64 }
    }

    /// Bytes of this region within `image`, or `None` if it does not fit.
    pub fn slice<'a>(&self, image: &'a [u8]) -> Option<&'a [u8]> {
        let start = usize::try_from(self.offset).ok()?;
        let end = start.checked_add(usize::try_from(self.size).ok()?)?;
        image.get(start..end)
    }
}

/// Find the area called `name` in the image's FMAP.
pub fn locate_region(image: &[u8], name: &str) -> Result<Region> {
    let (_, fmap) = Fmap::find(image)?;
    let area = fmap
        .area(name)
        .ok_or_else(|| CbfsError::RegionNotFound(name.to_owned()))?;

    let end = u64::from(area.offset) + u64::from(area.size);
    if end > image.len() as u64 {
        return Err(FmapError::AreaOutOfBounds {
            name:      area.name.clone(),
            offset:    area.offset,
            size:      area.size,
            image_len: image.len(),
        }
        .into());
    }
    log::debug!("{name} is [{:#x}, +{:#x})", area.offset, area.size);
    Ok(Region { name: area.name.clone(), offset: area.offset.into(), size: area.size.into() })
}
