//! Directory assembly: one pass over a CBFS region.
//!
//! # Scan
//! The scanner is a small state machine driven by a [`ByteCursor`]:
//!
//! ```text
//! SeekAlign ─► ReadMagic ─┬─► MagicMismatch ─► SeekAlign
//!     │            │      └─► MagicMatch ─► Dispatch ─► SeekAlign
//!     └────────────┴─► Done
//! ```
//!
//! - A window that is not `LARCHIVE` is filler.  The scan moves on to the
//!   next 64-byte boundary; it never fails because of padding.
//! - Running out of bytes while aligning or reading a signature ends the
//!   directory normally.  An empty directory is a valid result.
//! - Everything else (a bad header, an unregistered type, a decoder error)
//!   fails the whole scan.  No partial directory is ever returned.
//! - A body whose declared size runs past the region is cut at the region
//!   end.  A decoder that needs fixed bytes beyond it fails with
//!   [`CbfsError::Truncated`]; other decoder errors become
//!   [`CbfsError::DecodeFailure`].

use std::fmt;
use std::path::Path;

use log::{debug, info, trace};

use crate::cursor::{Alignment, ByteCursor};
use crate::error::{CbfsError, Result};
use crate::file::{File, ALIGNMENT, FILE_MAGIC};
use crate::fmap::{self, Region, DEFAULT_REGION};
use crate::record::{MasterRecord, Record};
use crate::registry::TypeRegistry;

// ── ScanOptions ──────────────────────────────────────────────────────────────

/// Configuration for [`Image::open`] and [`Image::from_flash`].
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// FMAP area that holds the CBFS.
    pub region_name: String,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self { region_name: DEFAULT_REGION.to_owned() }
    }
}

// ── Scan state ───────────────────────────────────────────────────────────────

#[derive(Debug)]
enum ScanState {
    SeekAlign,
    ReadMagic,
    /// Eight bytes at `at` were not a signature.
    MagicMismatch { at: u64 },
    MagicMatch { record_start: u64 },
    Dispatch(File),
    Done,
}

// ── Image ────────────────────────────────────────────────────────────────────

/// A scanned CBFS directory.
#[derive(Debug, Clone)]
pub struct Image {
    region:      Region,
    base_offset: Option<u64>,
    records:     Vec<Record>,
}

impl Image {
    /// Scan `data`, the bytes of `region`, into a directory.
    pub fn scan(data: &[u8], region: Region, registry: &TypeRegistry) -> Result<Self> {
        let mut cursor = ByteCursor::new(data);
        let mut records = Vec::new();
        let mut base_offset = None;
        let mut state = ScanState::SeekAlign;

        loop {
            state = match state {
                ScanState::SeekAlign => match cursor.align_to(ALIGNMENT) {
                    Alignment::Ready          => ScanState::ReadMagic,
                    Alignment::EndOfDirectory => ScanState::Done,
                },

                ScanState::ReadMagic => {
                    let at = cursor.position();
                    match cursor.read(FILE_MAGIC.len()) {
                        Ok(tag) if tag == FILE_MAGIC => ScanState::MagicMatch { record_start: at },
                        Ok(_)  => ScanState::MagicMismatch { at },
                        Err(_) => ScanState::Done,
                    }
                }

                ScanState::MagicMismatch { at } => {
                    trace!("no signature at {at:#x}");
                    ScanState::SeekAlign
                }

                ScanState::MagicMatch { record_start } => {
                    debug!("record at {record_start:#x}");
                    base_offset.get_or_insert(record_start);
                    ScanState::Dispatch(File::read(&mut cursor, record_start)?)
                }

                ScanState::Dispatch(file) => {
                    let record_start = file.record_start;
                    let file_type = file.header.file_type;
                    let kind = registry.lookup(file_type).ok_or(CbfsError::UnknownType {
                        offset:      record_start,
                        record_type: file_type,
                    })?;
                    debug!("{} {:?}: {} byte(s), body at {:#x}",
                        kind.name, file.name, file.header.size, cursor.position());

                    let record = (kind.decode)(&mut cursor, file).map_err(|e| match e {
                        e @ (CbfsError::DecodeFailure { .. } | CbfsError::Truncated { .. }) => e,
                        other => CbfsError::DecodeFailure {
                            offset: record_start,
                            kind:   kind.name,
                            reason: other.to_string(),
                        },
                    })?;
                    records.push(record);
                    ScanState::SeekAlign
                }

                ScanState::Done => break,
            };
        }

        info!("{} record(s) in {} region", records.len(), region_label(&region));
        Ok(Self { region, base_offset, records })
    }

    /// Locate `options.region_name` through the image's FMAP and scan it.
    pub fn from_flash(image: &[u8], options: &ScanOptions, registry: &TypeRegistry) -> Result<Self> {
        let region = fmap::locate_region(image, &options.region_name)?;
        let data = region
            .slice(image)
            .ok_or_else(|| CbfsError::RegionNotFound(options.region_name.clone()))?;
        Self::scan(data, region, registry)
    }

    /// Read a flash image from disk and scan its CBFS region.
    pub fn open<P: AsRef<Path>>(path: P, options: &ScanOptions, registry: &TypeRegistry) -> Result<Self> {
        let image = std::fs::read(path.as_ref())?;
        debug!("read {} byte(s) from {}", image.len(), path.as_ref().display());
        Self::from_flash(&image, options, registry)
    }

    /// Region the directory was built from.
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Offset of the first record, `None` when the directory is empty.
    pub fn base_offset(&self) -> Option<u64> {
        self.base_offset
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First record called `name`.
    pub fn find(&self, name: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.name() == name)
    }

    /// First master header record in on-disk order.
    pub fn master(&self) -> Option<&MasterRecord> {
        self.records.iter().find_map(|r| match r {
            Record::Master(m) => Some(m),
            _ => None,
        })
    }
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::render::write_listing(f, &self.records)
    }
}

fn region_label(region: &Region) -> &str {
    if region.name.is_empty() { "unnamed" } else { &region.name }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{FileHeader, FileType};

    fn registry() -> TypeRegistry {
        TypeRegistry::builtin().unwrap()
    }

    fn put_record(region: &mut [u8], at: usize, file_type: FileType, name: &[u8], body: &[u8]) {
        let offset = 24 + name.len();
        let mut buf = Vec::new();
        FileHeader {
            size:        body.len() as u32,
            file_type,
            attr_offset: 0,
            offset:      offset as u32,
        }
        .write(&mut buf)
        .unwrap();
        buf.extend_from_slice(name);
        buf.extend_from_slice(body);
        region[at..at + buf.len()].copy_from_slice(&buf);
    }

    #[test]
    fn all_padding_is_empty_directory() {
        let data = vec![0xffu8; 64 * 8];
        let image = Image::scan(&data, Region::whole(&data), &registry()).unwrap();
        assert!(image.is_empty());
        assert_eq!(image.base_offset(), None);
    }

    #[test]
    fn records_in_disk_order() {
        let mut data = vec![0xffu8; 64 * 6];
        put_record(&mut data, 64, FileType::RAW, b"a\0\0\0", b"one");
        put_record(&mut data, 192, FileType::SPD, b"b\0\0\0", b"two");

        let image = Image::scan(&data, Region::whole(&data), &registry()).unwrap();
        let names: Vec<_> = image.records().iter().map(|r| r.name()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(image.base_offset(), Some(64));
        assert_eq!(image.records()[1].offset(), 192);
        assert!(matches!(image.records()[1], Record::Spd(_)));
    }

    #[test]
    fn signature_inside_body_is_not_a_record() {
        let mut data = vec![0xffu8; 64 * 4];
        let mut body = vec![0u8; 64];
        body[40..48].copy_from_slice(FILE_MAGIC);
        put_record(&mut data, 0, FileType::RAW, b"blob\0\0\0\0", &body);

        let image = Image::scan(&data, Region::whole(&data), &registry()).unwrap();
        assert_eq!(image.len(), 1);
    }

    #[test]
    fn signature_in_last_short_window_ends_directory() {
        let mut data = vec![0xffu8; 64 + 4];
        data[64..68].copy_from_slice(b"LARC");
        let image = Image::scan(&data, Region::whole(&data), &registry()).unwrap();
        assert!(image.is_empty());
    }

    #[test]
    fn decoder_error_is_wrapped_with_kind() {
        fn reject(_: &mut ByteCursor<'_>, file: File) -> Result<Record> {
            Err(CbfsError::malformed(file.record_start, "checksum mismatch"))
        }
        let mut registry = TypeRegistry::new();
        registry.register(FileType(0x99), "picky", reject).unwrap();

        let mut data = vec![0xffu8; 128];
        put_record(&mut data, 64, FileType(0x99), b"x\0\0\0", b"");
        match Image::scan(&data, Region::whole(&data), &registry) {
            Err(CbfsError::DecodeFailure { offset: 64, kind, reason }) => {
                assert_eq!(kind, "picky");
                assert!(reason.contains("checksum mismatch"), "{reason}");
            }
            other => panic!("expected DecodeFailure, got {other:?}"),
        }
    }

    #[test]
    fn body_past_region_is_cut_short() {
        let mut data = vec![0xffu8; 64];
        let mut buf = Vec::new();
        FileHeader { size: 4096, file_type: FileType::RAW, attr_offset: 0, offset: 28 }
            .write(&mut buf)
            .unwrap();
        buf.extend_from_slice(b"big\0");
        data[..buf.len()].copy_from_slice(&buf);

        let image = Image::scan(&data, Region::whole(&data), &registry()).unwrap();
        assert_eq!(image.len(), 1);
        assert_eq!(image.records()[0].data().len(), 36);
        assert_eq!(image.records()[0].file().header.size, 4096);
    }

    #[test]
    fn master_header_past_region_is_truncated() {
        let mut data = vec![0xffu8; 48];
        put_record(&mut data, 0, FileType::MASTER, b"boot", b"");

        let err = Image::scan(&data, Region::whole(&data), &registry()).unwrap_err();
        assert!(matches!(err, CbfsError::Truncated { offset: 28, wanted: 32, available: 20 }), "{err}");
    }
}
