//! # Buffer Module
//!
//! The page cache: a fixed array of frames fronted by a frame table, a free
//! list, and an LRU-K replacement policy.
//!
//! ## Module Organization
//!
//! - `frame`: one pool slot, page bytes plus `{page_id, pin_count, dirty}`
//! - `lru_k_replacer`: victim selection over the evictable frames
//! - `buffer_pool_manager`: the pin/fetch/flush/delete protocol tying frames,
//!   replacer, and disk scheduler together

mod buffer_pool_manager;
mod frame;
mod lru_k_replacer;

pub use buffer_pool_manager::{BufferPoolManager, PageHandle};
pub use lru_k_replacer::LruKReplacer;
