//! Pooled B-tree node storage shared by [`crate::map`] and [`crate::set`].

use alloc::vec::Vec;
use cranelift_entity::{PrimaryMap, entity_impl};

/// Maximum number of keys held directly in one node before it splits. Kept small per the "small
/// internal nodes" design note; production fanout would be tuned much larger, but any fixed
/// fanout preserves the required map/set operations.
pub(crate) const CAPACITY: usize = 8;

/// A handle into a [`NodePool`]. Entities are never freed individually; `NodePool::clear` is the
/// only way to reclaim storage, matching the rest of the compiler's entity-lifetime discipline.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) struct Node(u32);
entity_impl!(Node);

/// A single B-tree node. `children` is empty for a leaf; otherwise `children.len() ==
/// keys.len() + 1`. Keys and their associated values are kept in every node (a classic in-memory
/// B-tree), not only at the leaves.
pub(crate) struct NodeData<K, V> {
    pub(crate) keys: Vec<K>,
    pub(crate) vals: Vec<V>,
    pub(crate) children: Vec<Node>,
}

impl<K, V> NodeData<K, V> {
    pub(crate) fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Shared backing storage for every tree built from one [`crate::MapForest`]/[`crate::SetForest`].
pub(crate) struct NodePool<K, V> {
    nodes: PrimaryMap<Node, NodeData<K, V>>,
}

impl<K, V> NodePool<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            nodes: PrimaryMap::new(),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
    }

    pub(crate) fn alloc(&mut self, keys: Vec<K>, vals: Vec<V>, children: Vec<Node>) -> Node {
        self.nodes.push(NodeData {
            keys,
            vals,
            children,
        })
    }

    pub(crate) fn get(&self, n: Node) -> &NodeData<K, V> {
        &self.nodes[n]
    }

    pub(crate) fn get_mut(&mut self, n: Node) -> &mut NodeData<K, V> {
        &mut self.nodes[n]
    }
}

impl<K, V> Default for NodePool<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
