//! Forest of ordered maps.

use crate::Comparator;
use crate::node::{CAPACITY, Node, NodeData, NodePool};
use alloc::vec::Vec;
use core::cmp::Ordering;

/// Memory pool backing every [`Map`] built from it.
pub struct MapForest<K, V> {
    nodes: NodePool<K, V>,
}

impl<K, V> MapForest<K, V> {
    /// Create a new, empty forest.
    pub fn new() -> Self {
        Self {
            nodes: NodePool::new(),
        }
    }

    /// Clear every map allocated from this forest. All `Map` handles into this forest become
    /// logically empty; this is an O(1) bulk reset, not a per-entry free.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}

impl<K, V> Default for MapForest<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// An ordered map from `K` to `V`, allocated out of a shared [`MapForest`].
///
/// `Map` itself is just a root pointer; cloning it aliases the same nodes (only meaningful if the
/// whole forest is cloned together).
#[derive(Clone, Copy)]
pub struct Map<K, V> {
    root: Option<Node>,
    _marker: core::marker::PhantomData<(K, V)>,
}

impl<K: Copy, V: Copy> Map<K, V> {
    /// Create an empty map.
    pub fn new() -> Self {
        Self {
            root: None,
            _marker: core::marker::PhantomData,
        }
    }

    /// Is this map empty?
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Look up `key`, returning its value if present.
    pub fn get<C: Comparator<K>>(&self, key: K, forest: &MapForest<K, V>, cmp: &C) -> Option<V> {
        let mut cur = self.root?;
        loop {
            let nd = forest.nodes.get(cur);
            match locate(nd, key, cmp) {
                Ok(idx) => return Some(nd.vals[idx]),
                Err(idx) => {
                    if nd.is_leaf() {
                        return None;
                    }
                    cur = nd.children[idx];
                }
            }
        }
    }

    /// Does the map contain `key`?
    pub fn contains<C: Comparator<K>>(&self, key: K, forest: &MapForest<K, V>, cmp: &C) -> bool {
        self.get(key, forest, cmp).is_some()
    }

    /// Insert `key -> value`, returning the previous value if any.
    pub fn insert<C: Comparator<K>>(
        &mut self,
        key: K,
        value: V,
        forest: &mut MapForest<K, V>,
        cmp: &C,
    ) -> Option<V> {
        match self.root {
            None => {
                self.root = Some(forest.nodes.alloc(
                    alloc::vec![key],
                    alloc::vec![value],
                    Vec::new(),
                ));
                None
            }
            Some(root) => {
                let (old, split) = insert_node(&mut forest.nodes, root, key, value, cmp);
                if let Some((skey, sval, sright)) = split {
                    let new_root = forest.nodes.alloc(
                        alloc::vec![skey],
                        alloc::vec![sval],
                        alloc::vec![root, sright],
                    );
                    self.root = Some(new_root);
                }
                old
            }
        }
    }

    /// Remove `key`, returning its value if it was present.
    pub fn remove<C: Comparator<K>>(
        &mut self,
        key: K,
        forest: &mut MapForest<K, V>,
        cmp: &C,
    ) -> Option<V> {
        let root = self.root?;
        let removed = remove_node(&mut forest.nodes, root, key, cmp);
        let nd = forest.nodes.get(root);
        if nd.keys.is_empty() && nd.is_leaf() {
            self.root = None;
        }
        removed
    }

    /// Iterate over all `(key, value)` pairs in ascending key order.
    pub fn iter<'a>(&self, forest: &'a MapForest<K, V>) -> MapIter<'a, K, V> {
        let mut stack = Vec::new();
        if let Some(root) = self.root {
            push_left_spine(&forest.nodes, root, &mut stack);
        }
        MapIter {
            forest,
            stack,
        }
    }

    /// Iterate over `(key, value)` pairs whose key lies in `[lo, hi)`.
    pub fn range<'a, C: Comparator<K>>(
        &self,
        lo: K,
        hi: K,
        forest: &'a MapForest<K, V>,
        cmp: &'a C,
    ) -> impl Iterator<Item = (K, V)> + 'a {
        self.iter(forest)
            .skip_while(move |&(k, _)| cmp.cmp(k, lo) == Ordering::Less)
            .take_while(move |&(k, _)| cmp.cmp(k, hi) == Ordering::Less)
    }
}

impl<K: Copy, V: Copy> Default for Map<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// A stable cursor over a [`Map`], positioned at a key.
pub struct MapCursor<'a, K, V> {
    map: &'a Map<K, V>,
    forest: &'a MapForest<K, V>,
}

impl<'a, K: Copy, V: Copy> MapCursor<'a, K, V> {
    /// Create a cursor over `map`.
    pub fn new(map: &'a Map<K, V>, forest: &'a MapForest<K, V>) -> Self {
        Self { map, forest }
    }

    /// Get the value at `key`, if present.
    pub fn get<C: Comparator<K>>(&self, key: K, cmp: &C) -> Option<V> {
        self.map.get(key, self.forest, cmp)
    }
}

/// An iterator over the entries of a [`Map`], in ascending key order.
pub struct MapIter<'a, K, V> {
    forest: &'a MapForest<K, V>,
    stack: Vec<(Node, usize)>,
}

impl<'a, K: Copy, V: Copy> Iterator for MapIter<'a, K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        let (node, idx) = self.stack.pop()?;
        let nd = self.forest.nodes.get(node);
        let item = (nd.keys[idx], nd.vals[idx]);
        if !nd.is_leaf() {
            push_left_spine(&self.forest.nodes, nd.children[idx + 1], &mut self.stack);
        }
        if idx + 1 < nd.keys.len() {
            self.stack.push((node, idx + 1));
        }
        Some(item)
    }
}

fn push_left_spine<K, V>(pool: &NodePool<K, V>, mut node: Node, stack: &mut Vec<(Node, usize)>) {
    loop {
        let nd = pool.get(node);
        if nd.keys.is_empty() {
            if nd.is_leaf() {
                return;
            }
            node = nd.children[0];
            continue;
        }
        stack.push((node, 0));
        if nd.is_leaf() {
            return;
        }
        node = nd.children[0];
    }
}

/// Binary search `nd.keys` for `key`. `Ok(i)` means `keys[i] == key`; `Err(i)` means `key` would
/// sort at position `i`, i.e. `children[i]` (for an inner node) is where it would live.
fn locate<K: Copy, V, C: Comparator<K>>(
    nd: &NodeData<K, V>,
    key: K,
    cmp: &C,
) -> Result<usize, usize> {
    let mut lo = 0usize;
    let mut hi = nd.keys.len();
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        match cmp.cmp(nd.keys[mid], key) {
            Ordering::Less => lo = mid + 1,
            Ordering::Greater => hi = mid,
            Ordering::Equal => return Ok(mid),
        }
    }
    Err(lo)
}

fn insert_node<K: Copy, V: Copy, C: Comparator<K>>(
    pool: &mut NodePool<K, V>,
    node: Node,
    key: K,
    val: V,
    cmp: &C,
) -> (Option<V>, Option<(K, V, Node)>) {
    let (idx, found, is_leaf) = {
        let nd = pool.get(node);
        match locate(nd, key, cmp) {
            Ok(i) => (i, true, nd.is_leaf()),
            Err(i) => (i, false, nd.is_leaf()),
        }
    };

    if found {
        let old = core::mem::replace(&mut pool.get_mut(node).vals[idx], val);
        return (Some(old), None);
    }

    if is_leaf {
        let nd = pool.get_mut(node);
        nd.keys.insert(idx, key);
        nd.vals.insert(idx, val);
    } else {
        let child = pool.get(node).children[idx];
        let (old, split) = insert_node(pool, child, key, val, cmp);
        if old.is_some() {
            return (old, None);
        }
        if let Some((skey, sval, sright)) = split {
            let nd = pool.get_mut(node);
            nd.keys.insert(idx, skey);
            nd.vals.insert(idx, sval);
            nd.children.insert(idx + 1, sright);
        } else {
            return (None, None);
        }
    }

    let overflow = pool.get(node).keys.len() > CAPACITY;
    if overflow {
        (None, Some(split_node(pool, node)))
    } else {
        (None, None)
    }
}

fn split_node<K: Copy, V: Copy>(pool: &mut NodePool<K, V>, node: Node) -> (K, V, Node) {
    let (rkeys, rvals, skey, sval, rchildren) = {
        let nd = pool.get_mut(node);
        let mid = nd.keys.len() / 2;
        let rkeys = nd.keys.split_off(mid + 1);
        let rvals = nd.vals.split_off(mid + 1);
        let skey = nd.keys.pop().unwrap();
        let sval = nd.vals.pop().unwrap();
        let rchildren = if nd.children.is_empty() {
            Vec::new()
        } else {
            nd.children.split_off(mid + 1)
        };
        (rkeys, rvals, skey, sval, rchildren)
    };
    let right = pool.alloc(rkeys, rvals, rchildren);
    (skey, sval, right)
}

fn remove_node<K: Copy, V: Copy, C: Comparator<K>>(
    pool: &mut NodePool<K, V>,
    node: Node,
    key: K,
    cmp: &C,
) -> Option<V> {
    let (idx, found, is_leaf) = {
        let nd = pool.get(node);
        match locate(nd, key, cmp) {
            Ok(i) => (i, true, nd.is_leaf()),
            Err(i) => (i, false, nd.is_leaf()),
        }
    };

    if found {
        if is_leaf {
            let nd = pool.get_mut(node);
            nd.keys.remove(idx);
            Some(nd.vals.remove(idx))
        } else {
            let left_child = pool.get(node).children[idx];
            let (pkey, pval) = remove_max(pool, left_child);
            let nd = pool.get_mut(node);
            let old = core::mem::replace(&mut nd.vals[idx], pval);
            nd.keys[idx] = pkey;
            Some(old)
        }
    } else if is_leaf {
        None
    } else {
        let child = pool.get(node).children[idx];
        remove_node(pool, child, key, cmp)
    }
}

/// Remove and return the maximum `(key, value)` pair in the subtree rooted at `node`.
fn remove_max<K: Copy, V: Copy>(pool: &mut NodePool<K, V>, node: Node) -> (K, V) {
    let (is_leaf, last_child) = {
        let nd = pool.get(node);
        (nd.is_leaf(), nd.children.last().copied())
    };
    if is_leaf {
        let nd = pool.get_mut(node);
        let k = nd.keys.pop().unwrap();
        let v = nd.vals.pop().unwrap();
        (k, v)
    } else {
        remove_max(pool, last_child.unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NaturalOrder;

    #[test]
    fn insert_get_ordered_iteration() {
        let mut forest = MapForest::<i32, &'static str>::new();
        let mut map = Map::new();
        let cmp = NaturalOrder;
        let entries = [(5, "e"), (3, "c"), (8, "h"), (1, "a"), (4, "d"), (7, "g"), (2, "b"), (6, "f")];
        for &(k, v) in &entries {
            map.insert(k, v, &mut forest, &cmp);
        }
        for &(k, v) in &entries {
            assert_eq!(map.get(k, &forest, &cmp), Some(v));
        }
        let collected: Vec<_> = map.iter(&forest).map(|(k, _)| k).collect();
        assert_eq!(collected, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn many_inserts_force_splits() {
        let mut forest = MapForest::<i32, i32>::new();
        let mut map = Map::new();
        let cmp = NaturalOrder;
        for k in 0..200 {
            map.insert(k, k * 2, &mut forest, &cmp);
        }
        let collected: Vec<_> = map.iter(&forest).map(|(k, v)| (k, v)).collect();
        let expected: Vec<_> = (0..200).map(|k| (k, k * 2)).collect();
        assert_eq!(collected, expected);
    }

    #[test]
    fn remove_preserves_order() {
        let mut forest = MapForest::<i32, i32>::new();
        let mut map = Map::new();
        let cmp = NaturalOrder;
        for k in 0..50 {
            map.insert(k, k, &mut forest, &cmp);
        }
        for k in (0..50).step_by(2) {
            assert_eq!(map.remove(k, &mut forest, &cmp), Some(k));
        }
        let collected: Vec<_> = map.iter(&forest).map(|(k, _)| k).collect();
        let expected: Vec<_> = (0..50).filter(|k| k % 2 == 1).collect();
        assert_eq!(collected, expected);
    }

    #[test]
    fn range_query() {
        let mut forest = MapForest::<i32, i32>::new();
        let mut map = Map::new();
        let cmp = NaturalOrder;
        for k in 0..20 {
            map.insert(k, k, &mut forest, &cmp);
        }
        let collected: Vec<_> = map.range(5, 10, &forest, &cmp).map(|(k, _)| k).collect();
        assert_eq!(collected, [5, 6, 7, 8, 9]);
    }

    #[test]
    fn clear_forest_empties_all_maps() {
        let mut forest = MapForest::<i32, i32>::new();
        let mut map = Map::new();
        let cmp = NaturalOrder;
        map.insert(1, 1, &mut forest, &cmp);
        forest.clear();
        map = Map::new();
        assert!(map.is_empty());
        assert_eq!(map.get(1, &forest, &cmp), None);
    }
}
