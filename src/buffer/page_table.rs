//! Page table - resolves a page identifier to a resident frame.
//!
//! Keys are unique: at most one resident copy of any page exists at any
//! moment. The table is guarded by the pool's region lock; install and
//! remove take the same lock in the same order as the eviction path.

use std::collections::HashMap;

use crate::common::{FrameId, PageId};

/// Outcome of [`PageTable::install`].
#[derive(Debug, PartialEq, Eq)]
pub enum Install {
    /// The mapping was created.
    Installed,
    /// Another frame already holds this page; the caller releases its own
    /// frame and uses the winner.
    Duplicate(FrameId),
}

/// Mapping from page identifier to frame index.
#[derive(Debug, Default)]
pub struct PageTable {
    map: HashMap<PageId, FrameId>,
}

impl PageTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the frame holding `id`, if resident.
    #[inline]
    pub fn lookup(&self, id: PageId) -> Option<FrameId> {
        self.map.get(&id).copied()
    }

    /// Install `id -> frame`; reports the incumbent on a duplicate.
    pub fn install(&mut self, id: PageId, frame: FrameId) -> Install {
        match self.map.get(&id) {
            Some(&winner) => Install::Duplicate(winner),
            None => {
                self.map.insert(id, frame);
                Install::Installed
            }
        }
    }

    /// Remove the mapping for `id`. Returns the frame it pointed at.
    pub fn remove(&mut self, id: PageId) -> Option<FrameId> {
        self.map.remove(&id)
    }

    /// Number of resident pages.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True if no page is resident.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate all resident (page, frame) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (PageId, FrameId)> + '_ {
        self.map.iter().map(|(&pid, &fid)| (pid, fid))
    }
}
