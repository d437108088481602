//! # Disk Manager
//!
//! Block-addressed page I/O against a backing store. Two implementations are
//! provided:
//!
//! - [`FileDiskManager`]: a single database file where page `i` lives at byte
//!   offset `i * PAGE_SIZE`. Reads past the current end of file zero-fill the
//!   buffer, so freshly allocated pages read as zeroes before their first
//!   write.
//! - [`MemoryDiskManager`]: a hash map of pages with atomic I/O counters,
//!   letting tests assert the exact read/write traffic a scenario produces.
//!
//! The interface is copy-based (`&mut [u8; PAGE_SIZE]` in, `&[u8; PAGE_SIZE]`
//! out): backends never hand out references into their own storage, which
//! keeps them trivially shareable behind `Arc<dyn DiskManager>`.
//!
//! ## Thread Safety
//!
//! Implementations take `&self` and must be `Send + Sync`; the scheduler's
//! worker thread and the buffer pool share one instance.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use eyre::{Result, WrapErr};
use hashbrown::HashMap;
use parking_lot::Mutex;

use super::{PageData, PageId, PAGE_SIZE};

/// Block-addressed read/write interface consumed by the disk scheduler.
pub trait DiskManager: Send + Sync {
    /// Reads page `page_id` into `buf`.
    fn read_page(&self, page_id: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<()>;

    /// Writes `data` as the new contents of page `page_id`.
    fn write_page(&self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> Result<()>;

    /// Returns `page_id` to the underlying allocator.
    fn deallocate_page(&self, page_id: PageId);

    /// Flushes buffered writes to stable storage.
    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

/// Disk manager backed by a single database file.
#[derive(Debug)]
pub struct FileDiskManager {
    file: Mutex<File>,
    path: PathBuf,
}

impl FileDiskManager {
    /// Opens (or creates) the database file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .wrap_err_with(|| format!("failed to open database file '{}'", path.display()))?;

        Ok(Self {
            file: Mutex::new(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn page_offset(page_id: PageId) -> u64 {
        page_id as u64 * PAGE_SIZE as u64
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&self, page_id: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(Self::page_offset(page_id)))
            .wrap_err_with(|| format!("failed to seek to page {page_id}"))?;

        let mut filled = 0;
        while filled < PAGE_SIZE {
            let n = file
                .read(&mut buf[filled..])
                .wrap_err_with(|| format!("failed to read page {page_id}"))?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        // A page beyond the current end of file reads as zeroes.
        buf[filled..].fill(0);
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> Result<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(Self::page_offset(page_id)))
            .wrap_err_with(|| format!("failed to seek to page {page_id}"))?;
        file.write_all(data)
            .wrap_err_with(|| format!("failed to write page {page_id}"))?;
        Ok(())
    }

    fn deallocate_page(&self, _page_id: PageId) {
        // The file never shrinks; the page slot is simply reusable.
    }

    fn sync(&self) -> Result<()> {
        self.file
            .lock()
            .sync_all()
            .wrap_err_with(|| format!("failed to sync '{}'", self.path.display()))
    }
}

/// In-memory disk manager for tests and ephemeral databases.
///
/// Tracks how many page reads and writes it has served so tests can assert
/// exact I/O traffic (e.g. "evicting one dirty victim issues one write").
#[derive(Debug, Default)]
pub struct MemoryDiskManager {
    pages: Mutex<HashMap<PageId, PageData>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryDiskManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of page reads served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Acquire)
    }

    /// Number of page writes served so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Acquire)
    }

    /// Number of pages currently stored.
    pub fn page_count(&self) -> usize {
        self.pages.lock().len()
    }
}

impl DiskManager for MemoryDiskManager {
    fn read_page(&self, page_id: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
        self.reads.fetch_add(1, Ordering::AcqRel);
        match self.pages.lock().get(&page_id) {
            Some(data) => buf.copy_from_slice(&data[..]),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> Result<()> {
        self.writes.fetch_add(1, Ordering::AcqRel);
        self.pages
            .lock()
            .entry(page_id)
            .or_insert_with(super::zeroed_page)
            .copy_from_slice(data);
        Ok(())
    }

    fn deallocate_page(&self, page_id: PageId) {
        self.pages.lock().remove(&page_id);
    }
}
