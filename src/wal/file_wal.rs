//! Single-file WAL implementation.
//!
//! Layout: a fixed header, then length-prefixed records back to back.
//!
//! ```text
//! header (16 bytes): magic 8 | version-major u16 | version-minor u16 | reserved u32
//! record frame (16 bytes + payload): lsn u64 | len u32 | crc32 u32 | payload
//! ```
//!
//! LSNs are assigned sequentially starting at 1. Appends go to the OS
//! buffer; durability is established by `flush_through`, which fsyncs and
//! advances the durable watermark to the last appended LSN.
//!
//! During replay a partial record at the very end of the file is treated
//! as a torn tail and ends the log; a checksum or sequencing violation on
//! a fully-present record is corrupt-log.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::common::{Error, Lsn, Result};
use crate::wal::Wal;

const WAL_MAGIC: &[u8; 8] = b"WPOOLWAL";
const WAL_VERSION_MAJOR: u16 = 1;
const WAL_VERSION_MINOR: u16 = 0;
const WAL_HEADER_LEN: usize = 16;
const FRAME_HEADER_LEN: usize = 16;

/// Upper bound on a single record payload; anything larger is corruption.
const MAX_RECORD_LEN: u32 = 1 << 26;

struct WalInner {
    file: File,
    /// LSN the next append will receive.
    next_lsn: u64,
    /// LSN of the most recent append (0 if none).
    last_appended: u64,
}

/// File-backed [`Wal`].
pub struct FileWal {
    path: PathBuf,
    inner: Mutex<WalInner>,
    /// Highest LSN known durable (0 if none).
    durable: AtomicU64,
}

impl FileWal {
    /// Open or create the WAL at `path`.
    ///
    /// An existing log is scanned to find the next LSN; records already on
    /// disk are considered durable.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let len = file.metadata()?.len();
        let last = if len == 0 {
            let mut header = [0u8; WAL_HEADER_LEN];
            header[0..8].copy_from_slice(WAL_MAGIC);
            header[8..10].copy_from_slice(&WAL_VERSION_MAJOR.to_le_bytes());
            header[10..12].copy_from_slice(&WAL_VERSION_MINOR.to_le_bytes());
            file.write_all(&header)?;
            file.sync_all()?;
            0
        } else {
            validate_header(&mut file)?;
            let (last, valid_end) = scan_last_lsn(&mut file)?;
            // Drop any torn tail so new appends follow the last valid
            // record and stay reachable by replay.
            if valid_end < len {
                file.set_len(valid_end)?;
                file.sync_all()?;
            }
            last
        };

        debug!(path = %path.display(), last_lsn = last, "WAL opened");

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(WalInner {
                file,
                next_lsn: last + 1,
                last_appended: last,
            }),
            durable: AtomicU64::new(last),
        })
    }
}

impl Wal for FileWal {
    fn append(&self, record: &[u8]) -> Result<Lsn> {
        if record.len() as u64 > MAX_RECORD_LEN as u64 {
            return Err(Error::invalid("WAL record too large"));
        }

        let mut inner = self.inner.lock();
        let lsn = inner.next_lsn;

        let mut header = [0u8; FRAME_HEADER_LEN];
        header[0..8].copy_from_slice(&lsn.to_le_bytes());
        header[8..12].copy_from_slice(&(record.len() as u32).to_le_bytes());
        header[12..16].copy_from_slice(&crc32fast::hash(record).to_le_bytes());

        inner.file.seek(SeekFrom::End(0))?;
        inner.file.write_all(&header)?;
        inner.file.write_all(record)?;

        inner.last_appended = lsn;
        inner.next_lsn = lsn + 1;
        Ok(Lsn(lsn))
    }

    fn flush_through(&self, lsn: Lsn) -> Result<()> {
        if self.durable.load(Ordering::Acquire) >= lsn.0 {
            return Ok(());
        }

        let inner = self.inner.lock();
        if lsn.0 > inner.last_appended {
            return Err(Error::invalid("flush_through past the end of the log"));
        }
        inner.file.sync_data()?;
        // Everything appended before the sync is now stable.
        self.durable.fetch_max(inner.last_appended, Ordering::AcqRel);
        Ok(())
    }

    fn durable_lsn(&self) -> Lsn {
        Lsn(self.durable.load(Ordering::Acquire))
    }

    fn replay(&self, from: Lsn, apply: &mut dyn FnMut(Lsn, &[u8]) -> Result<()>) -> Result<()> {
        // Replay reads through an independent handle so it does not disturb
        // the append cursor.
        let mut file = File::open(&self.path)?;
        validate_header(&mut file)?;

        let mut expected = 1u64;
        loop {
            let frame = match read_frame(&mut file)? {
                Some(f) => f,
                None => break,
            };
            if frame.lsn != expected {
                return Err(Error::CorruptLog(format!(
                    "record out of sequence: expected lsn {expected}, found {}",
                    frame.lsn
                )));
            }
            expected += 1;

            if frame.lsn >= from.0 {
                apply(Lsn(frame.lsn), &frame.payload)?;
            }
        }
        Ok(())
    }
}

struct ReplayFrame {
    lsn: u64,
    payload: Vec<u8>,
}

/// Read one record frame; `None` on clean EOF or a torn tail.
fn read_frame(file: &mut File) -> Result<Option<ReplayFrame>> {
    let mut header = [0u8; FRAME_HEADER_LEN];
    if !read_exact_or_eof(file, &mut header)? {
        return Ok(None);
    }

    let lsn = u64::from_le_bytes(header[0..8].try_into().unwrap());
    let len = u32::from_le_bytes(header[8..12].try_into().unwrap());
    let stored_crc = u32::from_le_bytes(header[12..16].try_into().unwrap());

    if len > MAX_RECORD_LEN {
        return Err(Error::CorruptLog(format!(
            "record length {len} exceeds maximum"
        )));
    }

    let mut payload = vec![0u8; len as usize];
    if !read_exact_or_eof(file, &mut payload)? {
        // Torn tail: the frame header made it to disk but the payload did
        // not. The log ends here.
        return Ok(None);
    }

    if crc32fast::hash(&payload) != stored_crc {
        return Err(Error::CorruptLog(format!(
            "checksum mismatch on record at lsn {lsn}"
        )));
    }

    Ok(Some(ReplayFrame { lsn, payload }))
}

/// Read exactly `buf.len()` bytes; false on EOF before any or all bytes.
fn read_exact_or_eof(file: &mut File, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            return Ok(false);
        }
        filled += n;
    }
    Ok(true)
}

fn validate_header(file: &mut File) -> Result<()> {
    file.seek(SeekFrom::Start(0))?;
    let mut header = [0u8; WAL_HEADER_LEN];
    if !read_exact_or_eof(file, &mut header)? {
        return Err(Error::CorruptLog("WAL shorter than its header".into()));
    }
    if &header[0..8] != WAL_MAGIC {
        return Err(Error::CorruptLog("bad WAL magic".into()));
    }
    let major = u16::from_le_bytes(header[8..10].try_into().unwrap());
    if major != WAL_VERSION_MAJOR {
        return Err(Error::CorruptLog(format!(
            "unsupported WAL version {major}"
        )));
    }
    Ok(())
}

/// Walk the log to find the last valid LSN and the byte offset where the
/// valid prefix ends, stopping at a torn tail.
fn scan_last_lsn(file: &mut File) -> Result<(u64, u64)> {
    file.seek(SeekFrom::Start(WAL_HEADER_LEN as u64))?;
    let mut last = 0u64;
    let mut expected = 1u64;
    let mut valid_end = WAL_HEADER_LEN as u64;
    while let Some(frame) = read_frame(file)? {
        if frame.lsn != expected {
            return Err(Error::CorruptLog(format!(
                "record out of sequence: expected lsn {expected}, found {}",
                frame.lsn
            )));
        }
        last = frame.lsn;
        expected += 1;
        valid_end += (FRAME_HEADER_LEN + frame.payload.len()) as u64;
    }
    Ok((last, valid_end))
}
