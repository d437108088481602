//! # Persistent Trie
//!
//! A copy-on-write, structurally shared trie keyed by bytes, carrying
//! heterogeneous per-key values. Every mutation returns a *new* trie; the old
//! version stays fully usable and unchanged.
//!
//! ## Structural Sharing
//!
//! Nodes are immutable and held through `Arc`. A mutation shallow-clones only
//! the nodes on the root-to-target path and re-links them bottom-up; all
//! off-path subtrees are shared by reference between versions:
//!
//! ```text
//! t  = {"a": 1, "b": 2}         t' = t.put("c", 3)
//!
//!        root ─┬─ a ──▶ [1]            root' ─┬─ a ──▶ [1]   (shared with t)
//!              └─ b ──▶ [2]                   ├─ b ──▶ [2]   (shared with t)
//!                                             └─ c ──▶ [3]   (new)
//! ```
//!
//! A version lives as long as the longest-lived trie referencing it; dropping
//! a version releases exactly the nodes no other version shares.
//!
//! ## Heterogeneous Values
//!
//! The value slot is type-erased (`Arc<dyn Any + Send + Sync>`). Each slot's
//! concrete type is fixed when it is stored; [`Trie::get`] recovers it by
//! downcast and a mismatched type reads as `None`, never as an error.
//!
//! ## Key Preprocessing
//!
//! Keys are byte strings. One trailing NUL byte is stripped before use, and
//! the empty key (after stripping) addresses the root node itself.
//!
//! ## Concurrency
//!
//! A published trie version is immutable and safe to read from any number of
//! threads. Swapping a shared "current" root is the caller's concern,
//! typically a mutex or compare-and-swap around an externally held `Trie`.

mod node;

use std::any::Any;
use std::sync::Arc;

use smallvec::SmallVec;

use node::{TrieNode, TrieValue};

/// Expected key depth; longer paths spill to the heap.
const PATH_INLINE_LEN: usize = 16;

type NodePath<'a> = SmallVec<[&'a TrieNode; PATH_INLINE_LEN]>;

/// An immutable trie snapshot. Cloning is cheap (one `Arc` bump) and yields
/// an equally valid handle on the same version.
#[derive(Default, Clone)]
pub struct Trie {
    root: Option<Arc<TrieNode>>,
}

impl Trie {
    /// The empty trie.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when this version holds no nodes at all.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Looks up `key` and borrows its value as `T`.
    ///
    /// Returns `None` when the path does not exist, the terminal node carries
    /// no value, or the stored value is not a `T`.
    pub fn get<T: Any>(&self, key: &[u8]) -> Option<&T> {
        let key = strip_trailing_nul(key);
        let mut node = self.root.as_deref()?;
        for &byte in key {
            node = node.children.get(&byte)?.as_ref();
        }
        node.value.as_deref()?.downcast_ref::<T>()
    }

    /// Returns a new trie in which `key` maps to `value`.
    ///
    /// Intermediate nodes are created as needed; if the terminal node already
    /// exists its children carry over into the new value node.
    pub fn put<T: Any + Send + Sync>(&self, key: &[u8], value: T) -> Trie {
        let key = strip_trailing_nul(key);
        let path = self.find_path(key);
        let payload: TrieValue = Arc::new(value);

        let mut node = if path.len() == key.len() + 1 {
            let mut terminal = path[key.len()].clone();
            terminal.value = Some(payload);
            terminal
        } else {
            TrieNode {
                children: Default::default(),
                value: Some(payload),
            }
        };

        for depth in (0..key.len()).rev() {
            let mut parent = match path.get(depth) {
                Some(existing) => (*existing).clone(),
                None => TrieNode::default(),
            };
            parent.children.insert(key[depth], Arc::new(node));
            node = parent;
        }

        Trie {
            root: Some(Arc::new(node)),
        }
    }

    /// Returns a new trie with the value at `key` removed.
    ///
    /// A key that is absent or does not terminate at a value node leaves the
    /// trie unchanged (the result shares this version's root). Otherwise the
    /// terminal is demoted to a plain node if it has children, or dropped
    /// along with every ancestor left both valueless and childless.
    pub fn remove(&self, key: &[u8]) -> Trie {
        let key = strip_trailing_nul(key);
        let path = self.find_path(key);
        if path.len() != key.len() + 1 || !path[key.len()].is_value() {
            return self.clone();
        }

        // Number of path nodes that survive into the new version. A childless
        // terminal is dropped, and so is every ancestor above it whose only
        // child was the one just pruned, until a value node or a node with
        // siblings stops the walk.
        let mut keep = path.len();
        if path[keep - 1].children.is_empty() {
            keep -= 1;
            while keep > 0 && !path[keep - 1].is_value() && path[keep - 1].children.len() == 1 {
                keep -= 1;
            }
        }
        if keep == 0 {
            return Trie::default();
        }

        let mut node = if keep == key.len() + 1 {
            TrieNode::with_children(path[keep - 1].children.clone())
        } else {
            let mut tail = path[keep - 1].clone();
            tail.children.remove(&key[keep - 1]);
            tail
        };

        for depth in (0..keep - 1).rev() {
            let mut parent = path[depth].clone();
            parent.children.insert(key[depth], Arc::new(node));
            node = parent;
        }

        Trie {
            root: Some(Arc::new(node)),
        }
    }

    /// Walks `key` from the root, collecting nodes until the path ends or a
    /// byte has no child. The result holds `key.len() + 1` nodes exactly when
    /// the full path exists.
    fn find_path<'a>(&'a self, key: &[u8]) -> NodePath<'a> {
        let mut path = NodePath::new();
        let Some(mut node) = self.root.as_deref() else {
            return path;
        };
        path.push(node);
        for &byte in key {
            match node.children.get(&byte) {
                Some(child) => {
                    node = child.as_ref();
                    path.push(node);
                }
                None => break,
            }
        }
        path
    }
}

fn strip_trailing_nul(key: &[u8]) -> &[u8] {
    key.strip_suffix(&[0]).unwrap_or(key)
}
