//! Record envelope shared by the pool, its callers, and recovery.
//!
//! The WAL itself carries opaque byte strings; this module defines the one
//! envelope the core understands. Page-update payloads stay opaque - the
//! recovery driver hands them to a caller-supplied redo function.
//!
//! Layout (little-endian):
//!
//! ```text
//! kind 1 = page update:      [1][file u32][page u32][payload...]
//! kind 2 = checkpoint begin: [2][min_dirty_lsn u64]
//! kind 3 = checkpoint end:   [3]
//! ```

use crate::common::{Error, FileId, Lsn, PageId, Result};

const KIND_PAGE_UPDATE: u8 = 1;
const KIND_CHECKPOINT_BEGIN: u8 = 2;
const KIND_CHECKPOINT_END: u8 = 3;

/// A decoded WAL record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// A redo record for one page. The payload is opaque to the core; the
    /// default redo function treats it as a full page image.
    PageUpdate {
        /// The page the record applies to.
        id: PageId,
        /// Redo payload.
        payload: Vec<u8>,
    },
    /// Start of a checkpoint; carries the lowest last-write LSN across the
    /// dirty snapshot.
    CheckpointBegin {
        /// Lowest last-write LSN of any frame in the snapshot.
        min_dirty_lsn: Lsn,
    },
    /// End of a successful checkpoint.
    CheckpointEnd,
}

impl Record {
    /// Encode a page update without building a `Record` first.
    pub fn encode_page_update(id: PageId, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(9 + payload.len());
        buf.push(KIND_PAGE_UPDATE);
        buf.extend_from_slice(&id.file.0.to_le_bytes());
        buf.extend_from_slice(&id.page.to_le_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    /// Encode this record.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Record::PageUpdate { id, payload } => Self::encode_page_update(*id, payload),
            Record::CheckpointBegin { min_dirty_lsn } => {
                let mut buf = Vec::with_capacity(9);
                buf.push(KIND_CHECKPOINT_BEGIN);
                buf.extend_from_slice(&min_dirty_lsn.0.to_le_bytes());
                buf
            }
            Record::CheckpointEnd => vec![KIND_CHECKPOINT_END],
        }
    }

    /// Decode a record, failing with corrupt-log on malformed input.
    pub fn decode(bytes: &[u8]) -> Result<Record> {
        let (&kind, rest) = bytes
            .split_first()
            .ok_or_else(|| Error::CorruptLog("empty WAL record".into()))?;

        match kind {
            KIND_PAGE_UPDATE => {
                if rest.len() < 8 {
                    return Err(Error::CorruptLog("truncated page-update record".into()));
                }
                let file = u32::from_le_bytes(rest[0..4].try_into().unwrap());
                let page = u32::from_le_bytes(rest[4..8].try_into().unwrap());
                Ok(Record::PageUpdate {
                    id: PageId::new(FileId(file), page),
                    payload: rest[8..].to_vec(),
                })
            }
            KIND_CHECKPOINT_BEGIN => {
                if rest.len() != 8 {
                    return Err(Error::CorruptLog("malformed checkpoint-begin record".into()));
                }
                Ok(Record::CheckpointBegin {
                    min_dirty_lsn: Lsn(u64::from_le_bytes(rest.try_into().unwrap())),
                })
            }
            KIND_CHECKPOINT_END => {
                if !rest.is_empty() {
                    return Err(Error::CorruptLog("malformed checkpoint-end record".into()));
                }
                Ok(Record::CheckpointEnd)
            }
            other => Err(Error::CorruptLog(format!("unknown record kind {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_update_round_trip() {
        let rec = Record::PageUpdate {
            id: PageId::new(FileId(3), 17),
            payload: vec![1, 2, 3, 4],
        };
        assert_eq!(Record::decode(&rec.encode()).unwrap(), rec);
    }

    #[test]
    fn test_checkpoint_records_round_trip() {
        let begin = Record::CheckpointBegin {
            min_dirty_lsn: Lsn(42),
        };
        assert_eq!(Record::decode(&begin.encode()).unwrap(), begin);
        assert_eq!(
            Record::decode(&Record::CheckpointEnd.encode()).unwrap(),
            Record::CheckpointEnd
        );
    }

    #[test]
    fn test_empty_payload_page_update() {
        let rec = Record::PageUpdate {
            id: PageId::new(FileId(1), 0),
            payload: vec![],
        };
        assert_eq!(Record::decode(&rec.encode()).unwrap(), rec);
    }

    #[test]
    fn test_malformed_records_are_corrupt_log() {
        assert!(matches!(Record::decode(&[]), Err(Error::CorruptLog(_))));
        assert!(matches!(Record::decode(&[99]), Err(Error::CorruptLog(_))));
        assert!(matches!(
            Record::decode(&[KIND_PAGE_UPDATE, 1, 2]),
            Err(Error::CorruptLog(_))
        ));
        assert!(matches!(
            Record::decode(&[KIND_CHECKPOINT_BEGIN, 1]),
            Err(Error::CorruptLog(_))
        ));
        assert!(matches!(
            Record::decode(&[KIND_CHECKPOINT_END, 0]),
            Err(Error::CorruptLog(_))
        ));
    }
}
