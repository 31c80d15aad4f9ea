//! Sysfile - the durable record of the recovery start LSN.
//!
//! A single fixed-size little-endian record:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       8     magic
//! 8       4     version
//! 12      8     recovery-start-LSN
//! 20      4     page-size
//! 24      4     CRC32 of bytes 0..24
//! ```
//!
//! Updates go through write-temp-then-rename so a partial write can never
//! corrupt the durable recovery start.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use crate::common::{Error, Lsn, Result};

const SYSFILE_MAGIC: &[u8; 8] = b"WALPOOL\0";
const SYSFILE_VERSION: u32 = 1;
const SYSFILE_LEN: usize = 28;

/// Name of the sysfile inside a pool directory.
pub const SYSFILE_NAME: &str = "sysfile";

/// Parsed sysfile contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sysfile {
    /// LSN from which recovery replay begins on restart.
    pub recovery_start_lsn: Lsn,
    /// Page size the pool directory was formatted with.
    pub page_size: u32,
}

impl Sysfile {
    fn encode(&self) -> [u8; SYSFILE_LEN] {
        let mut buf = [0u8; SYSFILE_LEN];
        buf[0..8].copy_from_slice(SYSFILE_MAGIC);
        buf[8..12].copy_from_slice(&SYSFILE_VERSION.to_le_bytes());
        buf[12..20].copy_from_slice(&self.recovery_start_lsn.0.to_le_bytes());
        buf[20..24].copy_from_slice(&self.page_size.to_le_bytes());
        let crc = crc32fast::hash(&buf[..24]);
        buf[24..28].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() != SYSFILE_LEN {
            return Err(Error::CorruptMetadata(format!(
                "sysfile is {} bytes, expected {}",
                buf.len(),
                SYSFILE_LEN
            )));
        }
        if &buf[0..8] != SYSFILE_MAGIC {
            return Err(Error::CorruptMetadata("bad sysfile magic".into()));
        }
        let version = u32::from_le_bytes(buf[8..12].try_into().unwrap());
        if version != SYSFILE_VERSION {
            return Err(Error::CorruptMetadata(format!(
                "unsupported sysfile version {version}"
            )));
        }
        let stored_crc = u32::from_le_bytes(buf[24..28].try_into().unwrap());
        let computed = crc32fast::hash(&buf[..24]);
        if stored_crc != computed {
            return Err(Error::CorruptMetadata("sysfile checksum mismatch".into()));
        }

        Ok(Self {
            recovery_start_lsn: Lsn(u64::from_le_bytes(buf[12..20].try_into().unwrap())),
            page_size: u32::from_le_bytes(buf[20..24].try_into().unwrap()),
        })
    }

    /// True if `dir` has been formatted (a sysfile is present).
    pub fn exists(dir: &Path) -> bool {
        dir.join(SYSFILE_NAME).exists()
    }

    /// Read and validate the sysfile in `dir`.
    ///
    /// A missing or malformed sysfile is [`Error::CorruptMetadata`].
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(SYSFILE_NAME);
        let mut file = File::open(&path).map_err(|e| {
            Error::CorruptMetadata(format!("cannot open {}: {e}", path.display()))
        })?;
        let mut buf = Vec::with_capacity(SYSFILE_LEN);
        file.read_to_end(&mut buf)?;
        Self::decode(&buf)
    }

    /// Atomically rewrite the sysfile in `dir`.
    pub fn store(&self, dir: &Path) -> Result<()> {
        let tmp = dir.join(format!("{SYSFILE_NAME}.tmp"));
        let path = dir.join(SYSFILE_NAME);

        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp)?;
            file.write_all(&self.encode())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;

        // Make the rename itself durable.
        #[cfg(unix)]
        File::open(dir)?.sync_all()?;

        Ok(())
    }
}
