//! Checkpoint coordination.
//!
//! A checkpoint produces a recoverable point so replay need not start
//! arbitrarily far back in the log:
//!
//! 1. Under the region lock, snapshot the resident dirty set and the
//!    lowest last-write LSN across it; mark each frame sync-scheduled.
//! 2. Append a checkpoint-begin record carrying that minimum.
//! 3. Flush each snapshotted frame, clearing its sync-scheduled bit.
//!    I/O errors leave the recovery start where it was; the caller
//!    schedules another pass.
//! 4. Drain frames dirtied since the snapshot, then - with the region
//!    quiesced - sync the data files and append + flush a checkpoint-end
//!    record. Publish its LSN as the new recovery start via the sysfile.
//!
//! Step 4's drain closes the window where a page dirtied between the
//! snapshot and the end record would have its log records below the
//! published start while its bytes were never written. Writers racing a
//! flush are covered by the sync-scheduled / log-flush-required handshake
//! in the unpin path.

use std::sync::atomic::Ordering;
use std::time::Instant;

use tracing::{debug, warn};

use crate::buffer::pool::BufferPool;
use crate::common::{Error, FrameId, Lsn, Result};
use crate::storage::Sysfile;
use crate::wal::{Record, Wal as _};

/// Run one checkpoint pass. Serialized against other passes.
pub(crate) fn run(pool: &BufferPool) -> Result<()> {
    let _serial = pool.checkpoint_serial.lock();
    let started = Instant::now();

    // Step 1: snapshot the dirty set.
    let mut snapshot: Vec<FrameId> = Vec::new();
    let mut min_dirty = Lsn::ZERO;
    {
        let region = pool.region.lock();
        for (_pid, fid) in region.page_table.iter() {
            let mut st = pool.frame(fid).lock();
            if st.dirty {
                st.sync_scheduled = true;
                if min_dirty == Lsn::ZERO || st.last_write_lsn < min_dirty {
                    min_dirty = st.last_write_lsn;
                }
                snapshot.push(fid);
            }
        }
    }

    // Nothing dirty and nothing durable since the last end record: the
    // previous checkpoint still describes the pool exactly, so a second
    // pass publishes the same recovery start.
    let last_end = Lsn(pool.last_checkpoint_end.load(Ordering::Acquire));
    if snapshot.is_empty() && last_end != Lsn::ZERO && pool.wal.durable_lsn() == last_end {
        debug!(%last_end, "checkpoint skipped: no work since the last one");
        return Ok(());
    }

    // Step 2: checkpoint-begin.
    let begin = Record::CheckpointBegin {
        min_dirty_lsn: min_dirty,
    };
    let begin_lsn = pool.wal.append(&begin.encode())?;
    debug!(%begin_lsn, pages = snapshot.len(), "checkpoint begin");

    // Step 3: flush the snapshot.
    let mut first_err: Option<Error> = None;
    for &fid in &snapshot {
        let res = pool.flush_frame(fid);
        pool.frame(fid).lock().sync_scheduled = false;
        if let Err(e) = res {
            warn!(frame = fid.0, error = %e, "checkpoint flush failed, will retry next pass");
            first_err.get_or_insert(e);
        }
    }
    if let Some(e) = first_err {
        // Recovery start stays put; the caller retries.
        return Err(e);
    }

    // Step 4: drain stragglers, then seal. The dirty re-scan and the end
    // record append happen under the region lock, so no new dirty frame
    // can slip between them.
    let end_lsn = loop {
        let stragglers: Vec<FrameId> = {
            let region = pool.region.lock();
            let dirty: Vec<FrameId> = region
                .page_table
                .iter()
                .map(|(_, fid)| fid)
                .filter(|&fid| pool.frame(fid).lock().dirty)
                .collect();
            if dirty.is_empty() {
                // Data must be durable before the end record claims it is.
                region.files.sync_all()?;
                let lsn = pool.wal.append(&Record::CheckpointEnd.encode())?;
                pool.wal.flush_through(lsn)?;
                break lsn;
            }
            dirty
        };
        for fid in stragglers {
            pool.flush_frame(fid)?;
        }
    };

    // Publish the new recovery start.
    Sysfile {
        recovery_start_lsn: end_lsn,
        page_size: pool.page_size as u32,
    }
    .store(&pool.dir)?;
    pool.last_checkpoint_end.store(end_lsn.0, Ordering::Release);

    let elapsed = started.elapsed().as_millis() as u64;
    pool.counters
        .checkpoint_duration_ms
        .store(elapsed, Ordering::Relaxed);
    debug!(%end_lsn, elapsed_ms = elapsed, "checkpoint complete");
    Ok(())
}
