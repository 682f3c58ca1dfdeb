//! Error type shared by every stage of a CBFS scan.
//!
//! Every variant raised while walking a region is fatal to that scan: the
//! caller gets either a complete directory or one of these, never both.
//! Running out of bytes at an alignment point is *not* represented here; that
//! is the normal end of a directory and is handled inside the scanner.

use std::io;
use thiserror::Error;

use crate::file::FileType;
use crate::fmap::FmapError;

pub type Result<T> = std::result::Result<T, CbfsError>;

#[derive(Error, Debug)]
pub enum CbfsError {
    /// Fewer bytes are left in the region than a fixed-size field requires.
    /// Raised by [`ByteCursor`](crate::cursor::ByteCursor) reads and by
    /// decoders such as the master header.
    #[error("truncated at {offset:#x}: wanted {wanted} bytes, {available} available")]
    Truncated { offset: u64, wanted: usize, available: usize },

    /// The fixed header or name field of a record is inconsistent.
    #[error("malformed record at {offset:#x}: {reason}")]
    MalformedRecord { offset: u64, reason: String },

    /// A well-formed record whose type has no registered decoder.
    #[error("unknown record type {record_type} at {offset:#x}")]
    UnknownType { offset: u64, record_type: FileType },

    /// Two decoders claimed the same record type.
    #[error("record type {record_type} is owned by {owner}, can't add {rejected}")]
    DuplicateType { record_type: FileType, owner: &'static str, rejected: &'static str },

    /// A type-specific decoder rejected the record body.
    #[error("{kind} record at {offset:#x} failed to decode: {reason}")]
    DecodeFailure { offset: u64, kind: &'static str, reason: String },

    #[error("no {0} region in flash map")]
    RegionNotFound(String),

    #[error("flash map: {0}")]
    Fmap(#[from] FmapError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl CbfsError {
    /// Region-relative byte offset the error was raised at, if it has one.
    pub fn offset(&self) -> Option<u64> {
        match self {
            CbfsError::Truncated { offset, .. }
            | CbfsError::MalformedRecord { offset, .. }
            | CbfsError::UnknownType { offset, .. }
            | CbfsError::DecodeFailure { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    pub(crate) fn malformed(offset: u64, reason: impl Into<String>) -> Self {
        CbfsError::MalformedRecord { offset, reason: reason.into() }
    }
}
