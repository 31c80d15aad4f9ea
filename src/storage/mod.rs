//! Storage layer - the backing file set and the recovery sysfile.
//!
//! - [`FileSet`] / [`DataFile`] - one data file per file id, page-granular I/O
//! - [`Sysfile`] - the fixed-size durable record of the recovery start LSN

mod file_set;
mod sysfile;

pub use file_set::{DataFile, FileSet};
pub use sysfile::{Sysfile, SYSFILE_NAME};
