//! # KilnDB - Teaching Storage Engine
//!
//! KilnDB is the storage core of a teaching database engine. It implements
//! the two subsystems everything above it is built on:
//!
//! - **Persistent trie**: a copy-on-write, structurally shared, byte-keyed
//!   trie with heterogeneous per-key values. Mutations return new versions;
//!   old versions stay valid and share all untouched substructure.
//! - **Buffer pool**: a fixed-size page cache with pin counting, dirty
//!   write-back, an LRU-K replacement policy, and a background I/O scheduler
//!   in front of a block device.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use kilndb::{BufferPoolManager, FileDiskManager, Trie, DEFAULT_REPLACER_K};
//!
//! // Page cache over a database file
//! let disk = Arc::new(FileDiskManager::open("./kiln.db")?);
//! let pool = BufferPoolManager::new(64, DEFAULT_REPLACER_K, disk);
//!
//! let mut page = pool.new_page()?.expect("pool exhausted");
//! page.data_mut()[..5].copy_from_slice(b"hello");
//! pool.unpin_page(page.page_id(), true);
//!
//! // Versioned metadata in the persistent trie
//! let v1 = Trie::new().put(b"tables/users", 1u32);
//! let v2 = v1.put(b"tables/orders", 2u32);
//! assert_eq!(v1.get::<u32>(b"tables/orders"), None);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   Callers (B-tree, catalog, ...)    │
//! ├──────────────────┬──────────────────┤
//! │  Persistent Trie │   Buffer Pool    │
//! │  (in-memory,     │  frames + LRU-K  │
//! │   versioned)     │    replacer      │
//! ├──────────────────┴──────────────────┤
//! │   Disk Scheduler (request queue)    │
//! ├─────────────────────────────────────┤
//! │  Disk Manager (file / in-memory)    │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`trie`]: persistent trie with type-erased value slots
//! - [`buffer`]: frames, LRU-K replacer, buffer pool manager
//! - [`storage`]: page vocabulary, disk manager, disk scheduler
//! - [`config`]: centralized tuning constants

pub mod buffer;
pub mod config;
pub mod storage;
pub mod trie;

pub use buffer::{BufferPoolManager, LruKReplacer, PageHandle};
pub use config::{DEFAULT_BUFFER_POOL_SIZE, DEFAULT_REPLACER_K};
pub use storage::{
    Completion, DiskManager, DiskRequest, DiskScheduler, FileDiskManager, FrameId,
    MemoryDiskManager, PageData, PageId, INVALID_PAGE_ID, PAGE_SIZE,
};
pub use trie::Trie;
