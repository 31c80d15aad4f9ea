//! Shared test support.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use walpool::{FileWal, Lsn, Result, Wal};

/// A WAL wrapper whose `flush_through` can be made to fail on demand,
/// for exercising the WAL-ordering rule.
pub struct ToggleWal {
    inner: FileWal,
    reject_flush: AtomicBool,
}

impl ToggleWal {
    pub fn open(path: &Path) -> Self {
        Self {
            inner: FileWal::open(path).expect("open test WAL"),
            reject_flush: AtomicBool::new(false),
        }
    }

    pub fn set_reject_flush(&self, reject: bool) {
        self.reject_flush.store(reject, Ordering::SeqCst);
    }
}

impl Wal for ToggleWal {
    fn append(&self, record: &[u8]) -> Result<Lsn> {
        self.inner.append(record)
    }

    fn flush_through(&self, lsn: Lsn) -> Result<()> {
        if self.reject_flush.load(Ordering::SeqCst) && lsn > self.inner.durable_lsn() {
            return Err(walpool::Error::Io(std::io::Error::other(
                "injected WAL flush failure",
            )));
        }
        self.inner.flush_through(lsn)
    }

    fn durable_lsn(&self) -> Lsn {
        self.inner.durable_lsn()
    }

    fn replay(&self, from: Lsn, apply: &mut dyn FnMut(Lsn, &[u8]) -> Result<()>) -> Result<()> {
        self.inner.replay(from, apply)
    }
}
