//! Buffer pool statistics tracking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters tracked by the buffer pool.
///
/// All fields are atomic so threads can bump them without a lock; the
/// values are eventually consistent, which is all statistics need.
#[derive(Debug, Default)]
pub struct PoolCounters {
    /// Pages read in from a backing file.
    pub pagein_count: AtomicU64,
    /// Pages written back to a backing file.
    pub pageout_count: AtomicU64,
    /// Frames reclaimed by the evictor.
    pub evictions: AtomicU64,
    /// Pins satisfied from a resident frame.
    pub cache_hits: AtomicU64,
    /// Pins that had to read from disk.
    pub cache_misses: AtomicU64,
    /// Wall-clock duration of the most recent checkpoint.
    pub checkpoint_duration_ms: AtomicU64,
}

impl PoolCounters {
    /// Create a new counter block, all zeros.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of pool statistics.
///
/// Gauges (`resident`, `dirty`, `pinned`, `free`) are sampled under the
/// region lock at snapshot time; the counters are running totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Frames currently holding a page.
    pub resident: usize,
    /// Resident frames whose bytes differ from disk.
    pub dirty: usize,
    /// Resident frames with at least one active pin.
    pub pinned: usize,
    /// Frames on the free list.
    pub free: usize,
    /// Pages read in from backing files.
    pub pagein_count: u64,
    /// Pages written back to backing files.
    pub pageout_count: u64,
    /// Frames reclaimed by the evictor.
    pub evictions: u64,
    /// Pins satisfied without disk I/O.
    pub cache_hits: u64,
    /// Pins that required a disk read.
    pub cache_misses: u64,
    /// Duration of the most recent checkpoint, in milliseconds.
    pub checkpoint_duration_ms: u64,
}

impl StatsSnapshot {
    /// Cache hit rate in [0.0, 1.0].
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats {{ resident: {}, dirty: {}, pinned: {}, free: {}, in: {}, out: {}, evictions: {}, hit_rate: {:.2}% }}",
            self.resident,
            self.dirty,
            self.pinned,
            self.free,
            self.pagein_count,
            self.pageout_count,
            self.evictions,
            self.hit_rate() * 100.0
        )
    }
}
