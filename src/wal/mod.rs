//! Write-ahead-log interface.
//!
//! The pool consumes a narrow contract: append records with monotonically
//! increasing LSNs, force durability up to an LSN, observe the durable
//! watermark, and replay from a start point. Log physical format and
//! group-commit belong to the implementation behind the [`Wal`] trait;
//! [`FileWal`] is the bundled single-file implementation.

mod file_wal;
pub mod record;

pub use file_wal::FileWal;
pub use record::Record;

use std::sync::Arc;

use crate::common::{Lsn, Result};

/// Name of the WAL file inside a pool directory.
pub const WAL_FILE_NAME: &str = "wal";

/// The append-only log the buffer pool writes through.
///
/// Implementations are internally synchronized; the pool treats `append`,
/// `flush_through`, and `durable_lsn` as atomic.
pub trait Wal: Send + Sync {
    /// Append a record, returning its LSN.
    fn append(&self, record: &[u8]) -> Result<Lsn>;

    /// Ensure the durable LSN is at least `lsn` on return.
    fn flush_through(&self, lsn: Lsn) -> Result<()>;

    /// Highest LSN known to be on stable storage.
    fn durable_lsn(&self) -> Lsn;

    /// Invoke `apply` on each record from `from` (inclusive) to the end of
    /// the log, in LSN order.
    fn replay(&self, from: Lsn, apply: &mut dyn FnMut(Lsn, &[u8]) -> Result<()>) -> Result<()>;
}

/// Shared handle to a WAL implementation.
pub type WalHandle = Arc<dyn Wal>;
