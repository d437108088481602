//! # Buffer Pool Manager
//!
//! Fixed-size page cache mediating between in-memory frames and the backing
//! block device. Callers address pages by logical [`PageId`]; the pool keeps
//! a frame table mapping resident pages to frames, a free list of unused
//! frames, and an [`LruKReplacer`] choosing victims among unpinned frames.
//!
//! ## Miss Path
//!
//! ```text
//! fetch_page(P)
//!   ├─ resident?          pin, record access, return
//!   ├─ free frame?        take it from the free list
//!   ├─ else evict         victim is guaranteed unpinned; write-back if dirty
//!   ├─ read P             synchronous wait on the scheduler completion
//!   └─ publish            frame table entry + pin only after the read landed
//! ```
//!
//! ## Pin/Unpin Protocol
//!
//! `new_page` and `fetch_page` return the page pinned (`pin_count = 1`, or
//! incremented on a hit) and marked non-evictable. Every pin must be paired
//! with an `unpin_page` call; when the count drops to zero the frame becomes
//! eligible for eviction again. The pool never clears the dirty flag on
//! unpin; only a successful flush does.
//!
//! ## Invariants
//!
//! - Every frame index is in exactly one of: free list, frame table.
//! - A frame with `pin_count > 0` is never selected for eviction (pinned
//!   frames are always marked non-evictable in the replacer).
//! - A dirty victim is written back exactly once before its frame is reused.
//! - Page ids are allocated monotonically; `INVALID_PAGE_ID` marks an empty
//!   frame.
//!
//! ## Locking
//!
//! One mutex serializes all bookkeeping (frame table, free list, frame
//! metadata, replacer interaction) and is held across the synchronous I/O
//! waits, so at most one I/O is in flight on behalf of the pool. Page *bytes*
//! are not protected by this mutex: [`PageHandle`] hands out raw slices and
//! callers coordinate concurrent access to the same page themselves, the way
//! the higher-level page guards do.
//!
//! ## Usage
//!
//! ```ignore
//! let disk = Arc::new(FileDiskManager::open("./kiln.db")?);
//! let pool = BufferPoolManager::new(64, DEFAULT_REPLACER_K, disk);
//!
//! let mut page = pool.new_page()?.expect("pool exhausted");
//! page.data_mut()[..5].copy_from_slice(b"hello");
//! let id = page.page_id();
//! pool.unpin_page(id, true);
//! pool.flush_page(id)?;
//! ```

use std::sync::Arc;

use eyre::{Result, WrapErr};
use hashbrown::HashMap;
use parking_lot::Mutex;

use super::frame::Frame;
use super::lru_k_replacer::LruKReplacer;
use crate::storage::{
    zeroed_page, DiskManager, DiskRequest, DiskScheduler, FrameId, PageId, PAGE_SIZE,
};

struct PoolInner {
    frames: Vec<Frame>,
    /// page id -> frame index, for resident pages only.
    page_table: HashMap<PageId, FrameId>,
    free_list: Vec<FrameId>,
    replacer: LruKReplacer,
    next_page_id: PageId,
}

/// Fixed-size page cache with LRU-K replacement.
pub struct BufferPoolManager {
    pool_size: usize,
    disk_scheduler: DiskScheduler,
    disk_manager: Arc<dyn DiskManager>,
    inner: Mutex<PoolInner>,
}

impl BufferPoolManager {
    /// Creates a pool of `pool_size` frames over `disk_manager`, with an
    /// LRU-K replacer of history depth `replacer_k`. Every frame starts on
    /// the free list.
    pub fn new(pool_size: usize, replacer_k: usize, disk_manager: Arc<dyn DiskManager>) -> Self {
        assert!(pool_size >= 1, "buffer pool needs at least one frame");
        Self {
            pool_size,
            disk_scheduler: DiskScheduler::new(Arc::clone(&disk_manager)),
            disk_manager,
            inner: Mutex::new(PoolInner {
                frames: (0..pool_size).map(|_| Frame::new()).collect(),
                page_table: HashMap::with_capacity(pool_size),
                free_list: (0..pool_size).collect(),
                replacer: LruKReplacer::new(pool_size, replacer_k),
                next_page_id: 0,
            }),
        }
    }

    /// Allocates a fresh page in a frame and returns it pinned.
    ///
    /// Returns `Ok(None)` when every frame is pinned.
    pub fn new_page(&self) -> Result<Option<PageHandle<'_>>> {
        let mut inner = self.inner.lock();
        let Some(frame_id) = self.acquire_frame(&mut inner)? else {
            return Ok(None);
        };

        let page_id = inner.next_page_id;
        inner.next_page_id += 1;

        let frame = &mut inner.frames[frame_id];
        frame.reset();
        frame.page_id = page_id;
        frame.pin_count = 1;

        inner.page_table.insert(page_id, frame_id);
        inner.replacer.record_access(frame_id);
        inner.replacer.set_evictable(frame_id, false);

        Ok(Some(PageHandle {
            pool: self,
            page_id,
            frame_id,
        }))
    }

    /// Returns the page pinned, reading it from disk on a miss.
    ///
    /// Returns `Ok(None)` when the page is not resident and every frame is
    /// pinned; `Err` surfaces an I/O failure reported by the scheduler.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Option<PageHandle<'_>>> {
        let mut inner = self.inner.lock();

        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            inner.replacer.record_access(frame_id);
            inner.replacer.set_evictable(frame_id, false);
            inner.frames[frame_id].pin_count += 1;
            return Ok(Some(PageHandle {
                pool: self,
                page_id,
                frame_id,
            }));
        }

        let Some(frame_id) = self.acquire_frame(&mut inner)? else {
            return Ok(None);
        };

        // Read before publishing: nothing can observe the frame until the
        // page bytes are in place. A failed read leaves no trace beyond the
        // frame going back to the free list.
        let completion = self.disk_scheduler.create_completion();
        self.disk_scheduler.schedule(DiskRequest {
            is_write: false,
            data: zeroed_page(),
            page_id,
            completion: completion.clone(),
        });
        let data = match completion.wait() {
            Ok(data) => data,
            Err(err) => {
                inner.free_list.push(frame_id);
                return Err(err).wrap_err_with(|| format!("failed to fetch page {page_id}"));
            }
        };

        let frame = &mut inner.frames[frame_id];
        frame.reset();
        frame.page_id = page_id;
        frame.pin_count = 1;
        frame.data.copy_from_slice(&data[..]);

        inner.page_table.insert(page_id, frame_id);
        inner.replacer.record_access(frame_id);
        inner.replacer.set_evictable(frame_id, false);

        Ok(Some(PageHandle {
            pool: self,
            page_id,
            frame_id,
        }))
    }

    /// Drops one pin on `page_id`, optionally marking the page dirty.
    ///
    /// Returns `false` when the page is not resident or not pinned. When the
    /// last pin is released the frame becomes evictable.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let mut inner = self.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return false;
        };
        if inner.frames[frame_id].pin_count == 0 {
            return false;
        }

        let frame = &mut inner.frames[frame_id];
        frame.pin_count -= 1;
        if is_dirty {
            frame.is_dirty = true;
        }
        if frame.pin_count == 0 {
            inner.replacer.set_evictable(frame_id, true);
        }
        true
    }

    /// Writes `page_id` out and clears its dirty flag, regardless of pin
    /// state or dirtiness. Returns `Ok(false)` when the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Ok(false);
        };
        self.write_frame(&mut inner.frames[frame_id])?;
        Ok(true)
    }

    /// Flushes every resident page.
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let resident: Vec<FrameId> = inner.page_table.values().copied().collect();
        for frame_id in resident {
            self.write_frame(&mut inner.frames[frame_id])?;
        }
        Ok(())
    }

    /// Evicts `page_id` from the pool and deallocates it on disk.
    ///
    /// Returns `Ok(true)` when the page is gone afterwards (including the
    /// vacuous case where it was never resident) and `Ok(false)` when it is
    /// pinned and cannot be deleted.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Ok(true);
        };
        if inner.frames[frame_id].pin_count > 0 {
            return Ok(false);
        }

        if inner.frames[frame_id].is_dirty {
            self.write_frame(&mut inner.frames[frame_id])?;
        }

        inner.page_table.remove(&page_id);
        inner.replacer.remove(frame_id);
        inner.frames[frame_id].reset();
        inner.free_list.push(frame_id);
        self.disk_manager.deallocate_page(page_id);
        Ok(true)
    }

    /// Number of frames in the pool.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Current pin count of a resident page.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let inner = self.inner.lock();
        let frame_id = *inner.page_table.get(&page_id)?;
        Some(inner.frames[frame_id].pin_count)
    }

    /// Dirty flag of a resident page.
    pub fn is_dirty(&self, page_id: PageId) -> Option<bool> {
        let inner = self.inner.lock();
        let frame_id = *inner.page_table.get(&page_id)?;
        Some(inner.frames[frame_id].is_dirty)
    }

    /// Number of frames currently on the free list.
    pub fn free_list_len(&self) -> usize {
        self.inner.lock().free_list.len()
    }

    /// Number of resident pages.
    pub fn resident_page_count(&self) -> usize {
        self.inner.lock().page_table.len()
    }

    /// Obtains a usable frame: the free list first, then an eviction victim
    /// with its dirty contents written back. `Ok(None)` means every frame is
    /// pinned.
    fn acquire_frame(&self, inner: &mut PoolInner) -> Result<Option<FrameId>> {
        if let Some(frame_id) = inner.free_list.pop() {
            return Ok(Some(frame_id));
        }

        let Some(frame_id) = inner.replacer.evict() else {
            return Ok(None);
        };
        let victim_page = inner.frames[frame_id].page_id;
        debug_assert_eq!(
            inner.frames[frame_id].pin_count, 0,
            "replacer selected pinned frame {frame_id}"
        );

        if inner.frames[frame_id].is_dirty {
            if let Err(err) = self.write_frame(&mut inner.frames[frame_id]) {
                // The evict() above already dropped the victim from the
                // replacer. Re-register it so the frame stays reachable:
                // still resident, still dirty, evictable for a retry.
                inner.replacer.record_access(frame_id);
                return Err(err);
            }
        }
        inner.page_table.remove(&victim_page);
        Ok(Some(frame_id))
    }

    /// Writes the frame's page out through the scheduler and clears the
    /// dirty flag once the write has landed.
    fn write_frame(&self, frame: &mut Frame) -> Result<()> {
        debug_assert!(frame.holds_page(), "flush of a free frame");
        let page_id = frame.page_id;

        let completion = self.disk_scheduler.create_completion();
        self.disk_scheduler.schedule(DiskRequest {
            is_write: true,
            data: frame.snapshot(),
            page_id,
            completion: completion.clone(),
        });
        completion
            .wait()
            .wrap_err_with(|| format!("failed to write back page {page_id}"))?;

        frame.is_dirty = false;
        Ok(())
    }
}

/// A pinned page returned by [`BufferPoolManager::new_page`] /
/// [`BufferPoolManager::fetch_page`].
///
/// The handle does *not* unpin on drop: releasing the pin is an explicit
/// [`BufferPoolManager::unpin_page`] call, which is where the caller also
/// reports whether it wrote to the page. RAII guards layering pin management
/// on top of this live outside the pool.
pub struct PageHandle<'a> {
    pool: &'a BufferPoolManager,
    page_id: PageId,
    frame_id: FrameId,
}

impl PageHandle<'_> {
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// The page bytes.
    pub fn data(&self) -> &[u8] {
        let inner = self.pool.inner.lock();
        let ptr = inner.frames[self.frame_id].data.as_ptr();
        // SAFETY: the bytes live in a boxed allocation that never moves, and
        // the frame cannot be evicted or repurposed while this handle keeps
        // it pinned, so the pointer stays valid for the handle's lifetime.
        // Coordination with concurrent writers of the same page is the
        // caller's responsibility.
        unsafe { std::slice::from_raw_parts(ptr, PAGE_SIZE) }
    }

    /// The page bytes, writable. Remember to unpin with `is_dirty = true`.
    pub fn data_mut(&mut self) -> &mut [u8] {
        let inner = self.pool.inner.lock();
        let ptr = inner.frames[self.frame_id].data.as_ptr() as *mut u8;
        // SAFETY: as in `data`; exclusivity among users of this handle comes
        // from `&mut self`, and cross-handle coordination is the caller's
        // responsibility, matching the pool's locking contract.
        unsafe { std::slice::from_raw_parts_mut(ptr, PAGE_SIZE) }
    }
}
