//! Recovery - rebuilds pool state from the WAL after a crash.
//!
//! On open, the recorded recovery start LSN is read from the sysfile and
//! the WAL is replayed forward from there. Page-update records are applied
//! through the pin-for-redo path (write the page if it exists, create it
//! otherwise); checkpoint markers are noted but carry no redo. Replay ends
//! with a full flush and a fresh checkpoint, so the next start-up replays
//! only what this one could not make durable.
//!
//! The redo function is supplied by the surrounding system: given the
//! frame's old bytes and a record payload it must produce the new bytes
//! deterministically. The default treats the payload as a full page image.

use tracing::{debug, info};

use crate::buffer::{BufferPool, Disposition};
use crate::common::{Lsn, Result};
use crate::wal::{Record, Wal as _};

/// Redo callback: `(frame_bytes, record_payload)`.
pub type RedoFn = dyn Fn(&mut [u8], &[u8]) + Send + Sync;

/// Default redo: the payload is a full page image. A short payload
/// rewrites the page prefix and zeroes the rest.
pub fn full_page_redo(frame: &mut [u8], payload: &[u8]) {
    let n = payload.len().min(frame.len());
    frame[..n].copy_from_slice(&payload[..n]);
    frame[n..].fill(0);
}

/// Replay the WAL from `start`, then flush and checkpoint.
pub(crate) fn run(pool: &BufferPool, start: Lsn, redo: &RedoFn) -> Result<()> {
    let mut applied = 0u64;
    let mut markers = 0u64;
    let mut last_seen = Lsn::ZERO;

    pool.wal().replay(start, &mut |lsn, bytes| {
        last_seen = lsn;
        match Record::decode(bytes)? {
            Record::PageUpdate { id, payload } => {
                let mut page = pool.pin_for_redo(id)?;
                page.with_data_mut(|frame| redo(frame, &payload))?;
                page.mark_last_write_lsn(lsn);
                page.unpin(Disposition::Dirty)?;
                applied += 1;
            }
            Record::CheckpointBegin { .. } | Record::CheckpointEnd => {
                // No redo; the LSN is tracked through `last_seen`.
                markers += 1;
            }
        }
        Ok(())
    })?;

    debug!(%start, %last_seen, applied, markers, "WAL replay finished");

    pool.force_flush_all()?;
    pool.checkpoint()?;

    info!(applied, "recovery complete");
    Ok(())
}
