//! # LRU-K Replacer
//!
//! Victim selection for the buffer pool. Each tracked frame carries a bounded
//! history of its last K access timestamps; the eviction victim is the
//! evictable frame with the largest *k-distance*: the age of its K-th most
//! recent access, taken as +∞ for frames with fewer than K recorded accesses.
//!
//! ## Why LRU-K Instead of LRU?
//!
//! Plain LRU lets a single sequential scan flush the entire pool: every
//! scanned page becomes most-recently-used exactly once. LRU-K instead asks
//! "when was this frame touched for the K-th-last time?". Scan pages never
//! accumulate K accesses, so they keep an infinite k-distance and are
//! reclaimed before any page with a real re-reference history.
//!
//! ## Victim Ordering
//!
//! The queue is a single ordered set whose key is the tuple
//! `(history_full, oldest_retained_timestamp, frame_id)`:
//!
//! - under-sampled frames (fewer than K accesses) sort before saturated ones,
//! - within a group, the older the retained timestamp the earlier the frame,
//! - the frame id keeps keys unique.
//!
//! The set minimum is therefore the frame with the largest k-distance, with
//! LRU as the tie-break among the under-sampled. Rebuilding the key from a
//! node is O(1), so queue maintenance on access is two `BTreeSet` operations.
//!
//! ## Contract
//!
//! Misuse (touching an unknown frame via `set_evictable`/`remove`, removing
//! a non-evictable frame, tracking more frames than `capacity`) indicates a
//! broken invariant in the caller and panics rather than being papered over.
//!
//! ## Thread Safety
//!
//! All state sits behind one `parking_lot::Mutex`; public methods take
//! `&self` and are atomic with respect to each other. The replacer never
//! calls back into the buffer pool, so it is safe to use while holding the
//! pool's own lock.

use std::collections::{BTreeSet, VecDeque};

use hashbrown::HashMap;
use parking_lot::Mutex;

use crate::storage::FrameId;

/// Per-frame bookkeeping: bounded access history plus the evictable flag.
struct LruKNode {
    /// Most recent access at the front; at most `k` entries, so the back is
    /// the K-th most recent (or the earliest, while under-sampled).
    history: VecDeque<u64>,
    is_evictable: bool,
}

/// Ordering key for the evict queue. Derived `Ord` gives exactly the victim
/// order: `false < true` puts under-sampled frames first, then the oldest
/// retained timestamp, then the frame id for uniqueness.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct EvictKey {
    history_full: bool,
    oldest_access: u64,
    frame_id: FrameId,
}

impl EvictKey {
    fn for_node(frame_id: FrameId, node: &LruKNode, k: usize) -> Self {
        Self {
            history_full: node.history.len() >= k,
            oldest_access: *node
                .history
                .back()
                .expect("tracked frame always has at least one access"),
            frame_id,
        }
    }
}

struct ReplacerCore {
    node_store: HashMap<FrameId, LruKNode>,
    /// Exactly the evictable nodes, ordered so the minimum is the victim.
    evict_queue: BTreeSet<EvictKey>,
    evictable_size: usize,
    current_timestamp: u64,
    capacity: usize,
    k: usize,
}

/// LRU-K replacement policy over the pool's frames.
pub struct LruKReplacer {
    core: Mutex<ReplacerCore>,
}

impl LruKReplacer {
    /// Creates a replacer able to track up to `num_frames` frames with a
    /// history depth of `k`.
    pub fn new(num_frames: usize, k: usize) -> Self {
        assert!(k >= 1, "history depth k must be at least 1");
        Self {
            core: Mutex::new(ReplacerCore {
                node_store: HashMap::with_capacity(num_frames),
                evict_queue: BTreeSet::new(),
                evictable_size: 0,
                current_timestamp: 0,
                capacity: num_frames,
                k,
            }),
        }
    }

    /// Records an access to `frame_id` at the next logical timestamp.
    ///
    /// A frame not yet tracked is inserted as evictable with a fresh history.
    ///
    /// # Panics
    ///
    /// If the frame is new and the replacer already tracks `capacity` frames.
    pub fn record_access(&self, frame_id: FrameId) {
        let mut core = self.core.lock();
        core.current_timestamp += 1;
        let ts = core.current_timestamp;
        let k = core.k;

        if let Some(node) = core.node_store.get_mut(&frame_id) {
            let was_evictable = node.is_evictable;
            let old_key = EvictKey::for_node(frame_id, node, k);

            node.history.push_front(ts);
            if node.history.len() > k {
                node.history.pop_back();
            }
            let new_key = EvictKey::for_node(frame_id, node, k);

            // The ordering key changed, so queue membership must be redone.
            if was_evictable {
                core.evict_queue.remove(&old_key);
                core.evict_queue.insert(new_key);
            }
            return;
        }

        assert!(
            core.node_store.len() < core.capacity,
            "replacer at capacity ({}): cannot track frame {frame_id}",
            core.capacity
        );

        let mut history = VecDeque::with_capacity(k + 1);
        history.push_front(ts);
        let node = LruKNode {
            history,
            is_evictable: true,
        };
        let key = EvictKey::for_node(frame_id, &node, k);
        core.node_store.insert(frame_id, node);
        core.evict_queue.insert(key);
        core.evictable_size += 1;
    }

    /// Marks `frame_id` (un)evictable. A no-op when the flag already matches.
    ///
    /// # Panics
    ///
    /// If the frame is not tracked.
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        let mut core = self.core.lock();
        let k = core.k;
        let Some(node) = core.node_store.get_mut(&frame_id) else {
            panic!("set_evictable on frame {frame_id} not tracked by the replacer");
        };
        if node.is_evictable == evictable {
            return;
        }
        node.is_evictable = evictable;
        let key = EvictKey::for_node(frame_id, node, k);

        if evictable {
            core.evict_queue.insert(key);
            core.evictable_size += 1;
        } else {
            core.evict_queue.remove(&key);
            core.evictable_size -= 1;
        }
    }

    /// Selects and removes the eviction victim: the evictable frame with the
    /// largest k-distance. Returns `None` when nothing is evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let mut core = self.core.lock();
        let key = core.evict_queue.pop_first()?;
        core.node_store.remove(&key.frame_id);
        core.evictable_size -= 1;
        Some(key.frame_id)
    }

    /// Forcibly stops tracking `frame_id`, dropping its access history.
    ///
    /// # Panics
    ///
    /// If the frame is not tracked or not evictable.
    pub fn remove(&self, frame_id: FrameId) {
        let mut core = self.core.lock();
        let k = core.k;
        let Some(node) = core.node_store.get(&frame_id) else {
            panic!("remove of frame {frame_id} not tracked by the replacer");
        };
        assert!(
            node.is_evictable,
            "remove of non-evictable frame {frame_id}"
        );
        let key = EvictKey::for_node(frame_id, node, k);
        core.evict_queue.remove(&key);
        core.node_store.remove(&frame_id);
        core.evictable_size -= 1;
    }

    /// Number of frames currently marked evictable.
    pub fn size(&self) -> usize {
        self.core.lock().evictable_size
    }
}
