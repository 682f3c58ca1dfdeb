//! Record kinds carried as opaque bytes: microcode, SPD, FSP, CMOS layout,
//! raw files, and the remaining standard types.

use super::{read_body, Record};
use crate::cursor::ByteCursor;
use crate::error::Result;
use crate::file::{File, FileType};
use crate::registry::TypeRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRecord {
    pub file: File,
    pub data: Vec<u8>,
}

impl BlobRecord {
    fn read(cursor: &mut ByteCursor<'_>, file: File) -> Result<Self> {
        let data = read_body(cursor, &file)?;
        Ok(Self { file, data })
    }
}

/// Types without a dedicated variant, listed so real images scan end to end.
const OPAQUE_KINDS: &[(FileType, &str)] = &[
    (FileType::STAGE,        "stage"),
    (FileType::FIT,          "fit"),
    (FileType::OPTION_ROM,   "optionrom"),
    (FileType::BOOT_SPLASH,  "bootsplash"),
    (FileType::MBI,          "mbi"),
    (FileType::MRC,          "mrc"),
    (FileType::MMA,          "mma"),
    (FileType::EFI,          "efi"),
    (FileType::STRUCT,       "struct"),
    (FileType::CMOS_DEFAULT, "cmos_default"),
    (FileType::MRC_CACHE,    "mrc_cache"),
    (FileType::DELETED2,     "empty"),
];

pub fn register(registry: &mut TypeRegistry) -> Result<()> {
    registry.register(FileType::MICROCODE, "microcode", new_microcode)?;
    registry.register(FileType::SPD, "spd", new_spd)?;
    registry.register(FileType::FSP, "fsp", new_fsp)?;
    registry.register(FileType::CMOS_LAYOUT, "cmos_layout", new_cmos_layout)?;
    registry.register(FileType::RAW, "raw", new_raw)?;
    for &(file_type, name) in OPAQUE_KINDS {
        registry.register(file_type, name, new_opaque)?;
    }
    Ok(())
}

fn new_microcode(cursor: &mut ByteCursor<'_>, file: File) -> Result<Record> {
    Ok(Record::Microcode(BlobRecord::read(cursor, file)?))
}

fn new_spd(cursor: &mut ByteCursor<'_>, file: File) -> Result<Record> {
    Ok(Record::Spd(BlobRecord::read(cursor, file)?))
}

fn new_fsp(cursor: &mut ByteCursor<'_>, file: File) -> Result<Record> {
    Ok(Record::Fsp(BlobRecord::read(cursor, file)?))
}

fn new_cmos_layout(cursor: &mut ByteCursor<'_>, file: File) -> Result<Record> {
    Ok(Record::CmosLayout(BlobRecord::read(cursor, file)?))
}

fn new_raw(cursor: &mut ByteCursor<'_>, file: File) -> Result<Record> {
    Ok(Record::Raw(BlobRecord::read(cursor, file)?))
}

fn new_opaque(cursor: &mut ByteCursor<'_>, file: File) -> Result<Record> {
    Ok(Record::Opaque(BlobRecord::read(cursor, file)?))
}
