//! Buffer management.
//!
//! The buffer pool is the in-memory cache layer between callers and the
//! backing file set. It manages a fixed arena of frames, each holding one
//! page, and cooperates with the WAL so that no dirty page reaches disk
//! before its log records do.
//!
//! # Components
//! - [`BufferPool`] - pin/unpin, eviction, flush, checkpoint
//! - [`PageRef`] - a pinned-page handle
//! - [`Frame`] / [`FrameState`] - a slot in the pool plus its header
//! - [`LruList`] - the eviction ordering
//! - [`PageTable`] - page id to frame resolution
//! - [`StatsSnapshot`] - pool statistics

mod checkpoint;
mod frame;
mod lru;
mod page_table;
mod pinned;
mod pool;
mod stats;

pub use frame::{Frame, FrameState};
pub use lru::LruList;
pub use page_table::{Install, PageTable};
pub use pinned::PageRef;
pub use pool::{BufferPool, Disposition, PinMode, PoolOptions, RecoveryMode};
pub use stats::{PoolCounters, StatsSnapshot};
