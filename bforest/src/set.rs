//! Forest of ordered sets, implemented as a [`Map`] with a unit value.

use crate::map::{Map, MapForest};
use crate::Comparator;

/// Memory pool backing every [`Set`] built from it.
pub struct SetForest<K> {
    inner: MapForest<K, ()>,
}

impl<K> SetForest<K> {
    /// Create a new, empty forest.
    pub fn new() -> Self {
        Self {
            inner: MapForest::new(),
        }
    }

    /// Clear every set allocated from this forest.
    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

impl<K> Default for SetForest<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// An ordered set of `K`, allocated out of a shared [`SetForest`].
#[derive(Clone, Copy)]
pub struct Set<K> {
    inner: Map<K, ()>,
}

impl<K: Copy> Set<K> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self { inner: Map::new() }
    }

    /// Is this set empty?
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Does the set contain `key`?
    pub fn contains<C: Comparator<K>>(&self, key: K, forest: &SetForest<K>, cmp: &C) -> bool {
        self.inner.contains(key, &forest.inner, cmp)
    }

    /// Insert `key`. Returns `true` if it was newly inserted.
    pub fn insert<C: Comparator<K>>(&mut self, key: K, forest: &mut SetForest<K>, cmp: &C) -> bool {
        self.inner.insert(key, (), &mut forest.inner, cmp).is_none()
    }

    /// Remove `key`. Returns `true` if it was present.
    pub fn remove<C: Comparator<K>>(&mut self, key: K, forest: &mut SetForest<K>, cmp: &C) -> bool {
        self.inner.remove(key, &mut forest.inner, cmp).is_some()
    }

    /// Iterate over all members in ascending order.
    pub fn iter<'a>(&self, forest: &'a SetForest<K>) -> SetIter<'a, K> {
        SetIter {
            inner: self.inner.iter(&forest.inner),
        }
    }
}

impl<K: Copy> Default for Set<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// A stable cursor over a [`Set`].
pub struct SetCursor<'a, K> {
    set: &'a Set<K>,
    forest: &'a SetForest<K>,
}

impl<'a, K: Copy> SetCursor<'a, K> {
    /// Create a cursor over `set`.
    pub fn new(set: &'a Set<K>, forest: &'a SetForest<K>) -> Self {
        Self { set, forest }
    }

    /// Does the underlying set contain `key`?
    pub fn contains<C: Comparator<K>>(&self, key: K, cmp: &C) -> bool {
        self.set.contains(key, self.forest, cmp)
    }
}

/// An iterator over the members of a [`Set`], in ascending order.
pub struct SetIter<'a, K> {
    inner: crate::map::MapIter<'a, K, ()>,
}

impl<'a, K: Copy> Iterator for SetIter<'a, K> {
    type Item = K;

    fn next(&mut self) -> Option<K> {
        self.inner.next().map(|(k, ())| k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NaturalOrder;

    #[test]
    fn insert_contains_remove() {
        let mut forest = SetForest::<i32>::new();
        let mut set = Set::new();
        let cmp = NaturalOrder;
        assert!(set.insert(3, &mut forest, &cmp));
        assert!(!set.insert(3, &mut forest, &cmp));
        assert!(set.contains(3, &forest, &cmp));
        assert!(set.remove(3, &mut forest, &cmp));
        assert!(!set.contains(3, &forest, &cmp));
    }

    #[test]
    fn iteration_is_ordered() {
        let mut forest = SetForest::<i32>::new();
        let mut set = Set::new();
        let cmp = NaturalOrder;
        for k in [5, 1, 4, 2, 3] {
            set.insert(k, &mut forest, &cmp);
        }
        let collected: Vec<_> = set.iter(&forest).collect();
        assert_eq!(collected, [1, 2, 3, 4, 5]);
    }
}
