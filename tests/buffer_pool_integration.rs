//! # Buffer Pool Integration Tests
//!
//! End-to-end scenarios over the public API, with exact I/O accounting
//! through `MemoryDiskManager` and durability checks through
//! `FileDiskManager`.
//!
//! ## Test Coverage
//!
//! 1. Eviction
//!    - Miss on a full pool selects a victim and writes it back once
//!    - Clean victims are reused without a write
//!    - Data survives eviction round trips
//! 2. Flushing
//!    - flush_page / flush_all_pages persist bytes and clear dirty flags
//! 3. Deletion
//!    - delete_page frees capacity and deallocates on disk
//! 4. I/O failure
//!    - A failed victim write-back surfaces the error without leaking the
//!      frame or losing the dirty page
//! 5. File-backed pools
//!    - Pages written through the pool are readable after reopen

use std::sync::Arc;

use kilndb::{
    BufferPoolManager, DiskManager, FileDiskManager, MemoryDiskManager, PageId,
    DEFAULT_BUFFER_POOL_SIZE, DEFAULT_REPLACER_K,
};
use tempfile::tempdir;

fn memory_pool(pool_size: usize) -> (BufferPoolManager, Arc<MemoryDiskManager>) {
    let dm = Arc::new(MemoryDiskManager::new());
    (
        BufferPoolManager::new(pool_size, 2, Arc::clone(&dm) as Arc<dyn DiskManager>),
        dm,
    )
}

/// Allocates a page, fills it with `seed`, and unpins it dirty.
fn seed_page(pool: &BufferPoolManager, seed: u8) -> PageId {
    let mut page = pool.new_page().unwrap().expect("pool exhausted");
    let id = page.page_id();
    page.data_mut().fill(seed);
    assert!(pool.unpin_page(id, true));
    id
}

#[test]
fn default_pool_configuration_is_usable() {
    let dm = Arc::new(MemoryDiskManager::new());
    let pool = BufferPoolManager::new(
        DEFAULT_BUFFER_POOL_SIZE,
        DEFAULT_REPLACER_K,
        dm as Arc<dyn DiskManager>,
    );

    for i in 0..DEFAULT_BUFFER_POOL_SIZE as u8 {
        seed_page(&pool, i);
    }
    assert_eq!(pool.resident_page_count(), DEFAULT_BUFFER_POOL_SIZE);
    assert_eq!(pool.free_list_len(), 0);
}

// ============================================================================
// Eviction
// ============================================================================

#[test]
fn miss_on_full_pool_evicts_flushes_once_and_reads_once() {
    let (pool, dm) = memory_pool(2);

    let p1 = seed_page(&pool, 0x11);
    let p2 = seed_page(&pool, 0x22);
    assert_eq!(dm.write_count(), 0);

    // Both frames hold dirty, evictable pages. Fetching a third page must
    // evict one victim, write it back exactly once, and read exactly once.
    let p3 = p2 + 1;
    let fetched = pool.fetch_page(p3).unwrap().expect("a victim must free up");
    assert_eq!(fetched.page_id(), p3);
    assert_eq!(pool.pin_count(p3), Some(1));
    assert_eq!(dm.write_count(), 1);
    assert_eq!(dm.read_count(), 1);

    // The victim was p1 (oldest access); its bytes reached the disk.
    assert_eq!(pool.pin_count(p1), None);
    let mut buf = [0u8; kilndb::PAGE_SIZE];
    dm.read_page(p1, &mut buf).unwrap();
    assert!(buf.iter().all(|&b| b == 0x11));
}

#[test]
fn clean_victims_are_reused_without_write_back() {
    let (pool, dm) = memory_pool(2);

    for _ in 0..2 {
        let page = pool.new_page().unwrap().unwrap();
        let id = page.page_id();
        assert!(pool.unpin_page(id, false));
    }

    // Eviction of a clean frame must not produce any write traffic.
    let page = pool.new_page().unwrap().unwrap();
    assert_eq!(dm.write_count(), 0);
    assert!(pool.unpin_page(page.page_id(), false));
}

#[test]
fn data_survives_eviction_round_trips() {
    let (pool, _dm) = memory_pool(3);

    // Three times as many pages as frames; every page gets evicted at least
    // once before it is read back.
    let ids: Vec<PageId> = (0..9).map(|i| seed_page(&pool, 0x40 + i)).collect();

    for (i, &id) in ids.iter().enumerate() {
        let fetched = pool.fetch_page(id).unwrap().unwrap();
        assert!(
            fetched.data().iter().all(|&b| b == 0x40 + i as u8),
            "page {id} lost its contents across eviction"
        );
        assert!(pool.unpin_page(id, false));
    }
}

#[test]
fn pinned_pages_are_never_victims() {
    let (pool, _dm) = memory_pool(2);

    let p1 = seed_page(&pool, 1);
    let pinned = pool.new_page().unwrap().unwrap();

    // One evictable frame (p1's), one pinned. Repeated misses may only ever
    // recycle the evictable frame.
    for offset in 0..4u32 {
        let page = pool.fetch_page(100 + offset).unwrap().unwrap();
        assert_ne!(page.page_id(), pinned.page_id());
        assert!(pool.unpin_page(page.page_id(), false));
    }
    assert_eq!(pool.pin_count(pinned.page_id()), Some(1));
    assert_eq!(pool.pin_count(p1), None);
}

// ============================================================================
// Flushing
// ============================================================================

#[test]
fn flush_all_pages_persists_every_resident_frame() {
    let (pool, dm) = memory_pool(4);

    let ids: Vec<PageId> = (0..4).map(|i| seed_page(&pool, i + 1)).collect();
    assert_eq!(dm.write_count(), 0);

    pool.flush_all_pages().unwrap();
    assert_eq!(dm.write_count(), 4);
    for &id in &ids {
        assert_eq!(pool.is_dirty(id), Some(false));
    }

    for (i, &id) in ids.iter().enumerate() {
        let mut buf = [0u8; kilndb::PAGE_SIZE];
        dm.read_page(id, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == i as u8 + 1));
    }
}

#[test]
fn flush_page_ignores_pin_state() {
    let (pool, dm) = memory_pool(2);

    let mut page = pool.new_page().unwrap().unwrap();
    let id = page.page_id();
    page.data_mut().fill(0x5A);
    // Still pinned; flush must proceed anyway.
    assert!(pool.flush_page(id).unwrap());
    assert_eq!(dm.write_count(), 1);
    assert_eq!(pool.pin_count(id), Some(1));
}

// ============================================================================
// Deletion
// ============================================================================

#[test]
fn delete_page_returns_the_frame_to_the_free_list() {
    let (pool, _dm) = memory_pool(2);

    let p1 = seed_page(&pool, 1);
    let _p2 = pool.new_page().unwrap().unwrap();
    assert_eq!(pool.free_list_len(), 0);

    assert!(pool.delete_page(p1).unwrap());
    assert_eq!(pool.free_list_len(), 1);

    let page = pool.new_page().unwrap().unwrap();
    assert_ne!(page.page_id(), p1);
    assert_eq!(pool.resident_page_count(), 2);
}

#[test]
fn delete_page_removes_the_disk_image() {
    let (pool, dm) = memory_pool(2);

    let p1 = seed_page(&pool, 9);
    pool.flush_page(p1).unwrap();
    assert_eq!(dm.page_count(), 1);

    assert!(pool.delete_page(p1).unwrap());
    assert_eq!(dm.page_count(), 0);
    assert_eq!(pool.resident_page_count(), 0);
}

// ============================================================================
// I/O failure
// ============================================================================

/// Disk manager whose writes fail for one chosen page.
struct FailingWrites {
    inner: MemoryDiskManager,
    fail_page: PageId,
}

impl FailingWrites {
    fn new(fail_page: PageId) -> Self {
        Self {
            inner: MemoryDiskManager::new(),
            fail_page,
        }
    }
}

impl DiskManager for FailingWrites {
    fn read_page(&self, page_id: PageId, buf: &mut [u8; kilndb::PAGE_SIZE]) -> eyre::Result<()> {
        self.inner.read_page(page_id, buf)
    }

    fn write_page(&self, page_id: PageId, data: &[u8; kilndb::PAGE_SIZE]) -> eyre::Result<()> {
        if page_id == self.fail_page {
            eyre::bail!("injected write failure for page {page_id}");
        }
        self.inner.write_page(page_id, data)
    }

    fn deallocate_page(&self, page_id: PageId) {
        self.inner.deallocate_page(page_id);
    }
}

#[test]
fn failed_victim_write_back_does_not_leak_the_frame() {
    let dm = Arc::new(FailingWrites::new(0));
    let pool = BufferPoolManager::new(2, 2, dm as Arc<dyn DiskManager>);

    let p1 = seed_page(&pool, 0x11); // page 0: its write-back will fail
    let p2 = seed_page(&pool, 0x22);

    // p1 has the oldest access, so it is the victim; the write-back fails
    // and the miss must surface the error.
    assert!(pool.fetch_page(42).is_err());

    // The frame is not leaked: still resident, still dirty, still unpinned,
    // and conservation holds.
    assert_eq!(pool.free_list_len() + pool.resident_page_count(), 2);
    assert_eq!(pool.pin_count(p1), Some(0));
    assert_eq!(pool.is_dirty(p1), Some(true));

    // The pool stays usable: the other frame can still turn over.
    let page = pool.fetch_page(42).unwrap().expect("a victim must free up");
    assert_eq!(page.page_id(), 42);
    assert_eq!(pool.pin_count(p2), None);
    assert!(pool.unpin_page(42, false));
    assert_eq!(pool.free_list_len() + pool.resident_page_count(), 2);
}

#[test]
fn write_back_failure_keeps_the_page_resident_and_dirty() {
    let dm = Arc::new(FailingWrites::new(7));
    let pool = BufferPoolManager::new(1, 2, dm as Arc<dyn DiskManager>);

    // A single frame, holding a dirty page whose writes always fail: every
    // miss surfaces the error and the page stays resident.
    let mut page = pool.new_page().unwrap().unwrap();
    page.data_mut().fill(0x33);
    let stuck = page.page_id();
    assert_ne!(stuck, 7);
    assert!(pool.unpin_page(stuck, true));

    let mut failing = pool.fetch_page(7).unwrap().unwrap();
    failing.data_mut().fill(0x44);
    assert!(pool.unpin_page(7, true));
    assert!(pool.fetch_page(100).is_err());
    assert_eq!(pool.is_dirty(7), Some(true));

    // A direct flush fails too; the dirty flag must survive for the retry.
    assert!(pool.flush_page(7).is_err());
    assert_eq!(pool.is_dirty(7), Some(true));
}

// ============================================================================
// File-backed pools
// ============================================================================

#[test]
fn file_backed_pool_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("kiln.db");

    let ids: Vec<PageId>;
    {
        let disk = Arc::new(FileDiskManager::open(&path).unwrap());
        let pool = BufferPoolManager::new(4, DEFAULT_REPLACER_K, disk as Arc<dyn DiskManager>);
        ids = (0..8).map(|i| seed_page(&pool, 0x80 + i)).collect();
        pool.flush_all_pages().unwrap();
    }

    let disk = Arc::new(FileDiskManager::open(&path).unwrap());
    let pool = BufferPoolManager::new(4, DEFAULT_REPLACER_K, disk as Arc<dyn DiskManager>);
    for (i, &id) in ids.iter().enumerate() {
        let page = pool.fetch_page(id).unwrap().unwrap();
        assert!(
            page.data().iter().all(|&b| b == 0x80 + i as u8),
            "page {id} not durable across reopen"
        );
        assert!(pool.unpin_page(id, false));
    }
}
