pub mod attr;
pub mod cursor;
pub mod error;
pub mod file;
pub mod fmap;
pub mod image;
pub mod record;
pub mod registry;
pub mod render;

pub use error::{CbfsError, Result};
pub use file::{File, FileHeader, FileType, ALIGNMENT, FILE_MAGIC};
pub use fmap::{locate_region, Region};
pub use image::{Image, ScanOptions};
pub use record::Record;
pub use registry::TypeRegistry;
