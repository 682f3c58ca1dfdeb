//! Record type registry: maps an on-disk record type to its decoder.
//!
//! # Lifecycle
//! The registry is built once by the program entry point, before any scan,
//! through [`TypeRegistry::builtin`] (or [`TypeRegistry::new`] plus explicit
//! [`TypeRegistry::register`] calls).  After that it is only read: scans take
//! it by shared reference, so one registry serves any number of scans on any
//! number of threads.
//!
//! # Rules
//! - One decoder per type.  A second registration for a type that is already
//!   taken fails with [`CbfsError::DuplicateType`]; that is a configuration
//!   bug and should abort startup.
//! - There is no unregistration.
//! - A scan that meets a type with no entry fails with
//!   [`CbfsError::UnknownType`].

use std::collections::HashMap;
use std::fmt;

use crate::cursor::ByteCursor;
use crate::error::{CbfsError, Result};
use crate::file::{File, FileType};
use crate::record::{self, Record};

/// Decoder constructor.  Receives the cursor positioned at the first body
/// byte and the record's header and name.
pub type DecodeFn = fn(&mut ByteCursor<'_>, File) -> Result<Record>;

/// One registry entry: type identifier, display name, constructor.
#[derive(Clone, Copy)]
pub struct RecordKind {
    pub file_type: FileType,
    pub name:      &'static str,
    pub decode:    DecodeFn,
}

impl fmt::Debug for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordKind")
            .field("file_type", &self.file_type)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    kinds: HashMap<FileType, RecordKind>,
}

impl TypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every record kind compiled into this crate.
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new();
        record::master::register(&mut registry)?;
        record::payload::register(&mut registry)?;
        record::blob::register(&mut registry)?;
        log::debug!("registry ready with {} record kind(s)", registry.len());
        Ok(registry)
    }

    pub fn register(&mut self, file_type: FileType, name: &'static str, decode: DecodeFn) -> Result<()> {
        if let Some(owner) = self.kinds.get(&file_type) {
            return Err(CbfsError::DuplicateType {
                record_type: file_type,
                owner:       owner.name,
                rejected:    name,
            });
        }
        self.kinds.insert(file_type, RecordKind { file_type, name, decode });
        log::debug!("registered {name} for type {:#x}", file_type.0);
        Ok(())
    }

    pub fn lookup(&self, file_type: FileType) -> Option<&RecordKind> {
        self.kinds.get(&file_type)
    }

    pub fn contains(&self, file_type: FileType) -> bool {
        self.kinds.contains_key(&file_type)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Entries ordered by type value.
    pub fn kinds(&self) -> Vec<&RecordKind> {
        let mut kinds: Vec<_> = self.kinds.values().collect();
        kinds.sort_by_key(|k| k.file_type);
        kinds
    }
}
