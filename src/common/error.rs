//! Error types for walpool.

use thiserror::Error;

use crate::common::PageId;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write
/// `Result<T>`, the same pattern as `std::io::Result`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in walpool.
///
/// One error type for the whole crate keeps error handling consistent
/// across the buffer, WAL, storage, and recovery layers.
#[derive(Debug, Error)]
pub enum Error {
    /// A backing-file or WAL operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `pin(read)`/`pin(write)` on a page beyond the file's length.
    #[error("page {0} not found")]
    PageNotFound(PageId),

    /// No evictable frame exists for a new pin: every frame is pinned.
    #[error("buffer pool exhausted: no evictable frame")]
    PoolExhausted,

    /// Illegal disposition, double unpin, dirty on a read-only pin, and
    /// similar caller bugs.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The sysfile or a checkpoint record failed its integrity checks.
    #[error("corrupt metadata: {0}")]
    CorruptMetadata(String),

    /// WAL replay detected a malformed record.
    #[error("corrupt log: {0}")]
    CorruptLog(String),
}

impl Error {
    /// Build an invalid-argument error. These indicate caller bugs; they
    /// are surfaced rather than panicking so tests can observe them.
    pub(crate) fn invalid(msg: &'static str) -> Error {
        Error::InvalidArgument(msg)
    }
}
