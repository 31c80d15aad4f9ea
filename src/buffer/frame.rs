//! Frame - a slot in the buffer pool.
//!
//! A [`Frame`] holds one page worth of bytes plus the header the buffer
//! manager needs: the resident page id, pin count, dirty and
//! checkpoint-related bits, and the last-write LSN. Everything sits behind
//! one per-frame mutex; a condition variable lets threads wait out an
//! in-flight read instead of issuing a parallel one.

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::common::{Lsn, PageId};

/// Per-frame header and page bytes, guarded by the frame mutex.
#[derive(Debug)]
pub struct FrameState {
    /// Resident page, or None if the frame is empty (on the free list).
    pub page_id: Option<PageId>,
    /// Number of active pins. Non-zero means not eligible for eviction.
    pub pin_count: u32,
    /// Frame bytes differ from the on-disk page.
    pub dirty: bool,
    /// Named in the current checkpoint's dirty snapshot.
    pub sync_scheduled: bool,
    /// A write was deferred pending WAL flush; the next flush must
    /// re-observe `last_write_lsn`.
    pub log_flush_required: bool,
    /// Eviction-preferred: reinserted at the LRU head on unpin and dropped
    /// without write-back when the WAL permits.
    pub discard: bool,
    /// A disk read or write for this frame is in flight.
    pub io_in_progress: bool,
    /// Highest LSN whose effects are present in the frame bytes. The WAL
    /// must be durable to at least this point before write-back.
    pub last_write_lsn: Lsn,
    /// The page bytes (length = pool page size).
    pub data: Box<[u8]>,
}

impl FrameState {
    fn new(page_size: usize) -> Self {
        Self {
            page_id: None,
            pin_count: 0,
            dirty: false,
            sync_scheduled: false,
            log_flush_required: false,
            discard: false,
            io_in_progress: false,
            last_write_lsn: Lsn::ZERO,
            data: vec![0u8; page_size].into_boxed_slice(),
        }
    }

    /// True if a page is loaded.
    #[inline]
    pub fn is_resident(&self) -> bool {
        self.page_id.is_some()
    }

    /// True if the evictor may take this frame right now.
    #[inline]
    pub fn is_evictable(&self) -> bool {
        self.is_resident() && self.pin_count == 0 && !self.io_in_progress
    }

    /// Return the frame to the empty state, zeroing the bytes.
    pub fn reset(&mut self) {
        self.page_id = None;
        self.pin_count = 0;
        self.dirty = false;
        self.sync_scheduled = false;
        self.log_flush_required = false;
        self.discard = false;
        self.io_in_progress = false;
        self.last_write_lsn = Lsn::ZERO;
        self.data.fill(0);
    }
}

/// A frame in the buffer pool arena.
pub struct Frame {
    state: Mutex<FrameState>,
    io_done: Condvar,
}

impl Frame {
    /// Create a new empty frame holding `page_size` bytes.
    pub fn new(page_size: usize) -> Self {
        Self {
            state: Mutex::new(FrameState::new(page_size)),
            io_done: Condvar::new(),
        }
    }

    /// Acquire the frame mutex.
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, FrameState> {
        self.state.lock()
    }

    /// Block until no I/O is in flight for this frame.
    ///
    /// The guard is released while waiting and reacquired before return.
    pub fn wait_io(&self, guard: &mut MutexGuard<'_, FrameState>) {
        while guard.io_in_progress {
            self.io_done.wait(guard);
        }
    }

    /// Wake threads waiting in [`Frame::wait_io`].
    #[inline]
    pub fn notify_io_done(&self) {
        self.io_done.notify_all();
    }
}
