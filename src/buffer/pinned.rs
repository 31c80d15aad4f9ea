//! Pinned-page handles.
//!
//! A [`PageRef`] is the caller's reservation of a frame: while it exists
//! the frame cannot be evicted. Callers release it explicitly with
//! [`PageRef::unpin`] to choose a disposition; dropping the handle instead
//! releases the pin without touching the dirty flag.

use crate::buffer::pool::{BufferPool, Disposition, PinMode};
use crate::common::{Error, FrameId, Lsn, PageId, Result};

/// A pinned page in the buffer pool.
///
/// For writes that must obey the WAL rule, call
/// [`PageRef::mark_last_write_lsn`] with the record's LSN *before* mutating
/// the bytes; a concurrent checkpoint flush then either sees the old bytes
/// or the new bytes with the covering LSN, never new bytes with a stale
/// one.
pub struct PageRef<'a> {
    pool: &'a BufferPool,
    frame_id: FrameId,
    page_id: PageId,
    mode: PinMode,
    released: bool,
}

impl<'a> PageRef<'a> {
    pub(crate) fn new(
        pool: &'a BufferPool,
        frame_id: FrameId,
        page_id: PageId,
        mode: PinMode,
    ) -> Self {
        Self {
            pool,
            frame_id,
            page_id,
            mode,
            released: false,
        }
    }

    /// The pinned page's identifier.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// The mode this page was pinned in.
    #[inline]
    pub fn mode(&self) -> PinMode {
        self.mode
    }

    #[inline]
    pub(crate) fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Read the page bytes under the frame lock.
    pub fn with_data<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let st = self.pool.frame(self.frame_id).lock();
        f(&st.data)
    }

    /// Mutate the page bytes under the frame lock.
    ///
    /// The frame is marked dirty up front, so a checkpoint running
    /// concurrently cannot miss the mutation. Fails with invalid-argument
    /// on a read-mode pin.
    pub fn with_data_mut<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> Result<R> {
        if self.mode == PinMode::Read {
            return Err(Error::invalid("mutable access through a read-only pin"));
        }
        let mut st = self.pool.frame(self.frame_id).lock();
        st.dirty = true;
        Ok(f(&mut st.data))
    }

    /// Record the LSN up to which this frame's mutations must be durable
    /// on the log before the frame may be written back.
    ///
    /// The recorded value only moves forward.
    pub fn mark_last_write_lsn(&self, lsn: Lsn) {
        let mut st = self.pool.frame(self.frame_id).lock();
        if lsn > st.last_write_lsn {
            st.last_write_lsn = lsn;
        }
    }

    /// Release the pin with an explicit disposition.
    ///
    /// On an invalid disposition (dirty on a read-only pin) the pin is
    /// still released - as if dropped - and the error is returned.
    pub fn unpin(mut self, disposition: Disposition) -> Result<()> {
        self.released = true;
        self.pool
            .unpin_frame(self.frame_id, self.mode, disposition)
    }
}

impl Drop for PageRef<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.pool.release_pin(self.frame_id);
        }
    }
}
