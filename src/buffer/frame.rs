//! Frame: one buffer pool slot holding a page's bytes plus its metadata.

use crate::storage::{zeroed_page, PageData, PageId, INVALID_PAGE_ID};

/// A slot in the buffer pool.
///
/// Tracks the resident page (if any), how many callers have the page pinned,
/// and whether its bytes diverge from the on-disk image.
pub struct Frame {
    /// Page currently held, or `INVALID_PAGE_ID` when the frame is free.
    pub(crate) page_id: PageId,
    /// Number of outstanding pins; the frame cannot be evicted above zero.
    pub(crate) pin_count: u32,
    /// Set on unpin-with-writes; cleared only by a successful flush.
    pub(crate) is_dirty: bool,
    /// The page bytes. Boxed so the allocation stays put for the lifetime of
    /// the pool regardless of how the frame array itself is stored.
    pub(crate) data: PageData,
}

impl Frame {
    pub(crate) fn new() -> Self {
        Self {
            page_id: INVALID_PAGE_ID,
            pin_count: 0,
            is_dirty: false,
            data: zeroed_page(),
        }
    }

    /// Clears metadata and zeroes the page bytes, returning the frame to its
    /// freshly-constructed state.
    pub(crate) fn reset(&mut self) {
        self.page_id = INVALID_PAGE_ID;
        self.pin_count = 0;
        self.is_dirty = false;
        self.data.fill(0);
    }

    /// Copies the frame's bytes into an owned buffer for the I/O queue.
    pub(crate) fn snapshot(&self) -> PageData {
        let mut copy = zeroed_page();
        copy.copy_from_slice(&self.data[..]);
        copy
    }

    pub(crate) fn holds_page(&self) -> bool {
        self.page_id != INVALID_PAGE_ID
    }
}
