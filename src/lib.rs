//! walpool - a WAL-integrated shared buffer pool and page manager.
//!
//! # Architecture
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                         walpool                            │
//! ├────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │            Buffer manager (buffer/)                  │  │
//! │  │   BufferPool + PageRef + LruList + PageTable         │  │
//! │  │   checkpoint coordinator + statistics                │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! │            ↓                          ↓                    │
//! │  ┌───────────────────┐    ┌────────────────────────────┐   │
//! │  │   WAL (wal/)      │    │     Storage (storage/)     │   │
//! │  │ Wal trait +       │    │ FileSet (NNN.dat) +        │   │
//! │  │ FileWal + records │    │ Sysfile (recovery start)   │   │
//! │  └───────────────────┘    └────────────────────────────┘   │
//! │            ↓                                               │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │            Recovery driver (recovery/)               │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - shared primitives (ids, LSNs, errors, config)
//! - [`sync`] - the test-and-set region lock and locking modes
//! - [`buffer`] - the buffer pool itself
//! - [`wal`] - the write-ahead-log contract and file implementation
//! - [`storage`] - backing data files and the sysfile
//! - [`recovery`] - WAL replay on start-up
//!
//! # Quick start
//! ```no_run
//! use walpool::{BufferPool, Disposition, PinMode, PoolOptions, RecoveryMode, Wal as _};
//! use walpool::common::{FileId, PageId};
//! use walpool::wal::Record;
//!
//! # fn main() -> walpool::Result<()> {
//! let pool = BufferPool::open(
//!     "data",
//!     PoolOptions {
//!         frames: 128,
//!         recovery_mode: RecoveryMode::Format,
//!         ..Default::default()
//!     },
//! )?;
//!
//! // Create a page, log the image, and write it.
//! let id = PageId::new(FileId(1), 0);
//! let mut page = pool.pin(id, PinMode::Create)?;
//! let image = vec![0xAB; pool.page_size()];
//! let lsn = pool.wal().append(&Record::encode_page_update(id, &image))?;
//! page.mark_last_write_lsn(lsn);
//! page.with_data_mut(|data| data.copy_from_slice(&image))?;
//! page.unpin(Disposition::Dirty)?;
//!
//! pool.checkpoint()?;
//! pool.close()?;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod common;
pub mod recovery;
pub mod storage;
pub mod sync;
pub mod wal;

// Re-export the items most callers touch.
pub use buffer::{BufferPool, Disposition, PageRef, PinMode, PoolOptions, RecoveryMode, StatsSnapshot};
pub use common::{Error, FileId, FrameId, Lsn, PageId, Result};
pub use recovery::RedoFn;
pub use sync::LockingMode;
pub use wal::{FileWal, Wal, WalHandle};
