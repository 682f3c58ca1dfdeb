//! Directory listings.
//!
//! The text table is for people: one header line, then one line per record
//! in on-disk order.  [`DirectoryEntry`] is the same information in a form
//! `serde` can emit.
//!
//! The compression column always reads `none`.  Compression attributes are
//! decoded and kept on each [`File`], but the listing does not report them.

use serde::Serialize;
use std::fmt;

use crate::attr::FileAttr;
use crate::file::File;
use crate::image::Image;
use crate::record::{format_row, Record};

pub(crate) fn write_listing(f: &mut fmt::Formatter<'_>, records: &[Record]) -> fmt::Result {
    format_row(f, "Name", "Offset", "Type", "Size", "Comp")?;
    writeln!(f)?;
    for record in records {
        writeln!(f, "{record}")?;
    }
    Ok(())
}

/// The text listing of `image`.
pub fn listing(image: &Image) -> String {
    image.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub name:        String,
    pub offset:      u64,
    #[serde(rename = "type")]
    pub type_name:   String,
    pub type_id:     u32,
    pub size:        u32,
    pub compression: &'static str,
    /// Hex digest from a hash attribute, if the record has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash:        Option<String>,
}

impl From<&File> for DirectoryEntry {
    fn from(file: &File) -> Self {
        let hash = file.attributes.iter().find_map(|a| match a {
            FileAttr::Hash { digest, .. } => Some(hex::encode(digest)),
            _ => None,
        });
        Self {
            name:        file.name.clone(),
            offset:      file.record_start,
            type_name:   file.header.file_type.to_string(),
            type_id:     file.header.file_type.0,
            size:        file.header.size,
            compression: "none",
            hash,
        }
    }
}

pub fn entries(image: &Image) -> Vec<DirectoryEntry> {
    image.records().iter().map(|r| DirectoryEntry::from(r.file())).collect()
}

pub fn to_json(image: &Image) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&entries(image))
}
