//! Backing file set - one data file per file id.
//!
//! File N lives at `<dir>/NNN.dat` and holds pages laid out sequentially:
//! page P at byte offset `P * page_size`. Files open lazily on first
//! touch. The registry itself is guarded by the pool's region lock; the
//! per-file handles are `Arc`ed out so reads and writes happen with the
//! region lock released.
//!
//! Individual page writes do not fsync; [`FileSet::sync_all`] is called at
//! checkpoint and close, which is where durability is actually needed.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::common::{Error, FileId, PageId, PageNo, Result};

/// Watermark slot holds `page_no + 1`; zero means nothing written yet.
const WATERMARK_NONE: u64 = 0;

/// An open backing file.
#[derive(Debug)]
pub struct DataFile {
    id: FileId,
    file: Mutex<File>,
    /// Logical page count: pages 0..page_count exist, though pages created
    /// in the pool and never flushed may not yet have bytes on disk.
    page_count: AtomicU32,
    page_size: usize,
    /// Highest page number written back, for crash diagnostics.
    watermark: AtomicU64,
}

impl DataFile {
    fn open(dir: &Path, id: FileId, page_size: usize) -> Result<Self> {
        let path = data_file_path(dir, id);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let len = file.metadata()?.len();
        let page_count = (len / page_size as u64) as u32;

        Ok(Self {
            id,
            file: Mutex::new(file),
            page_count: AtomicU32::new(page_count),
            page_size,
            watermark: AtomicU64::new(WATERMARK_NONE),
        })
    }

    /// The file this handle names.
    #[inline]
    pub fn id(&self) -> FileId {
        self.id
    }

    /// Logical number of pages in the file.
    #[inline]
    pub fn page_count(&self) -> PageNo {
        self.page_count.load(Ordering::Acquire)
    }

    /// Extend the logical page count to cover `page_no`.
    pub fn ensure_allocated(&self, page_no: PageNo) {
        self.page_count.fetch_max(page_no + 1, Ordering::AcqRel);
    }

    /// Read page `page_no` into `buf` (`buf.len()` = page size).
    ///
    /// A page beyond the logical count, or one allocated but never written
    /// back, is [`Error::PageNotFound`].
    pub fn read_page(&self, page_no: PageNo, buf: &mut [u8]) -> Result<()> {
        debug_assert_eq!(buf.len(), self.page_size);
        if page_no >= self.page_count() {
            return Err(Error::PageNotFound(PageId::new(self.id, page_no)));
        }

        let offset = page_no as u64 * self.page_size as u64;
        let mut file = self.file.lock();
        if offset + self.page_size as u64 > file.metadata()?.len() {
            // Allocated in the pool, never flushed: no bytes to read.
            return Err(Error::PageNotFound(PageId::new(self.id, page_no)));
        }
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }

    /// Write page `page_no` from `buf`, extending the file as needed.
    pub fn write_page(&self, page_no: PageNo, buf: &[u8]) -> Result<()> {
        debug_assert_eq!(buf.len(), self.page_size);
        let offset = page_no as u64 * self.page_size as u64;
        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(offset))?;
            file.write_all(buf)?;
        }
        self.ensure_allocated(page_no);

        let prev = self.watermark.fetch_max(page_no as u64 + 1, Ordering::Relaxed);
        if prev < page_no as u64 + 1 {
            trace!(file = self.id.0, page = page_no, "write watermark advanced");
        }
        Ok(())
    }

    /// fsync the file.
    pub fn sync(&self) -> Result<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }

    /// Highest page number written back so far, if any.
    pub fn write_watermark(&self) -> Option<PageNo> {
        match self.watermark.load(Ordering::Relaxed) {
            WATERMARK_NONE => None,
            w => Some((w - 1) as PageNo),
        }
    }
}

/// Registry of open backing files for one pool directory.
#[derive(Debug)]
pub struct FileSet {
    dir: PathBuf,
    page_size: usize,
    files: HashMap<FileId, Arc<DataFile>>,
}

impl FileSet {
    /// Create a registry over `dir`.
    pub fn new(dir: &Path, page_size: usize) -> Self {
        Self {
            dir: dir.to_path_buf(),
            page_size,
            files: HashMap::new(),
        }
    }

    /// Get (lazily opening) the handle for `id`.
    pub fn handle(&mut self, id: FileId) -> Result<Arc<DataFile>> {
        if let Some(f) = self.files.get(&id) {
            return Ok(Arc::clone(f));
        }
        let f = Arc::new(DataFile::open(&self.dir, id, self.page_size)?);
        self.files.insert(id, Arc::clone(&f));
        Ok(f)
    }

    /// fsync every open data file.
    pub fn sync_all(&self) -> Result<()> {
        for f in self.files.values() {
            f.sync()?;
        }
        Ok(())
    }
}

fn data_file_path(dir: &Path, id: FileId) -> PathBuf {
    dir.join(format!("{:03}.dat", id.0))
}
