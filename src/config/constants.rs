//! # KilnDB Configuration Constants
//!
//! All tuning knobs of the storage core in one place. When changing a value,
//! check the notes on the constants it interacts with.
//!
//! ```text
//! DEFAULT_BUFFER_POOL_SIZE (16)
//!       │
//!       └─> replacer capacity (always equal: one replacer slot per frame,
//!           so every resident frame can be tracked)
//!
//! DEFAULT_REPLACER_K (2)
//!       │
//!       └─> access-history depth per frame; frames with fewer than K
//!           recorded accesses are preferred eviction victims
//! ```

use crate::storage::PAGE_SIZE;

/// Default number of frames in the buffer pool.
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 16;

/// Default history depth for the LRU-K replacer.
///
/// K = 2 distinguishes "touched once, probably a scan" from "touched again,
/// probably hot", which is the behavior the replacer's under-sampling rule
/// is built around.
pub const DEFAULT_REPLACER_K: usize = 2;

// PAGE_SIZE interacts with the disk layout (page i lives at byte offset
// i * PAGE_SIZE), so it must stay a power of two for cheap offset math.
const _: () = assert!(PAGE_SIZE.is_power_of_two());
const _: () = assert!(DEFAULT_REPLACER_K >= 1);
const _: () = assert!(DEFAULT_BUFFER_POOL_SIZE >= 1);
