//! A forest of B-trees, all allocating nodes out of one shared pool.
//!
//! This crate provides ordered map and set data structures for small, copyable keys, used
//! throughout the compiler wherever an entity-keyed container needs range queries or in-order
//! iteration that a hash map cannot provide (for example, per-function side tables that are
//! queried by key range).
//!
//! **These are not general-purpose replacements for the standard library's `BTreeMap`/`BTreeSet`.**
//! The tradeoffs are different:
//!
//! - Keys and values are expected to be small and `Copy`.
//! - A [`Comparator`] object is used to compare keys, so the key type itself doesn't need to carry
//!   everything needed to order it (it can refer out to a side table via the comparator).
//! - Nodes are allocated from a shared [`node::NodePool`]; clearing a [`MapForest`]/[`SetForest`]
//!   frees every tree built from it in one O(1) step.
#![no_std]
#![deny(missing_docs)]

extern crate alloc;

mod map;
mod node;
mod set;

pub use map::{Map, MapCursor, MapForest, MapIter};
pub use set::{Set, SetCursor, SetForest, SetIter};

use core::cmp::Ordering;

/// An external comparator for ordering keys.
///
/// The default implementation just uses `Ord`, but a caller can supply one that dereferences an
/// index into a side table, letting the key type itself stay a small `Copy` handle.
pub trait Comparator<K> {
    /// Compare two keys.
    fn cmp(&self, a: K, b: K) -> Ordering;
}

/// The natural comparator: compare keys with their own `Ord` implementation.
pub struct NaturalOrder;

impl<K: Ord> Comparator<K> for NaturalOrder {
    fn cmp(&self, a: K, b: K) -> Ordering {
        a.cmp(&b)
    }
}
