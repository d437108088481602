//! Node shapes for the persistent trie.

use std::any::Any;
use std::sync::Arc;

use hashbrown::HashMap;

/// Type-erased value payload. The concrete type is fixed when the value is
/// stored and recovered (or rejected) by downcast at retrieval time.
pub(crate) type TrieValue = Arc<dyn Any + Send + Sync>;

/// A single trie node: children keyed by byte, plus an optional value slot.
///
/// Nodes are immutable once published. Mutation happens by shallow-cloning
/// the nodes on the root-to-target path; everything off the path stays shared
/// between the old and new trie versions through the `Arc` children.
#[derive(Default, Clone)]
pub(crate) struct TrieNode {
    pub(crate) children: HashMap<u8, Arc<TrieNode>>,
    pub(crate) value: Option<TrieValue>,
}

impl TrieNode {
    /// A plain node carrying `children` and no value.
    pub(crate) fn with_children(children: HashMap<u8, Arc<TrieNode>>) -> Self {
        Self {
            children,
            value: None,
        }
    }

    /// True when this node terminates a key.
    pub(crate) fn is_value(&self) -> bool {
        self.value.is_some()
    }
}
