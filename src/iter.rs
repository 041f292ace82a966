//! Ordered traversal over the leaf list and range-query results.
//!
//! Leaves are linked left to right, so once a scan has found its starting
//! leaf it never descends the tree again.

use std::iter::FusedIterator;
use std::ops::Deref;

use crate::arena::NodeArena;
use crate::node::{LeafNode, NodeId};

// ===========================================================================
// Leaf Iterator
// ===========================================================================

/// Iterator over `(&K, &V)` entries in ascending key order.
///
/// Created by [`Tree::iter`](crate::Tree::iter).
pub struct Iter<'t, K, V> {
	arena: &'t NodeArena<K, V>,
	leaf: Option<&'t LeafNode<K, V>>,
	pos: usize,
}

impl<'t, K, V> Iter<'t, K, V> {
	/// Starts at entry `pos` of `leaf`. A position past the end of the leaf
	/// continues with the next leaf.
	pub(crate) fn new(arena: &'t NodeArena<K, V>, leaf: NodeId, pos: usize) -> Self {
		Iter {
			arena,
			leaf: Some(arena.get(leaf).as_leaf()),
			pos,
		}
	}
}

impl<'t, K, V> Iterator for Iter<'t, K, V> {
	type Item = (&'t K, &'t V);

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			let leaf = self.leaf?;
			if let (Some(key), Some(value)) = (leaf.keys.get(self.pos), leaf.values.get(self.pos)) {
				self.pos += 1;
				return Some((key, value));
			}
			// Exhausted this leaf, follow the link
			let arena = self.arena;
			self.leaf = leaf.next.map(|next| arena.get(next).as_leaf());
			self.pos = 0;
		}
	}
}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

// ===========================================================================
// Range Results
// ===========================================================================

/// Values returned by [`Tree::get_range`](crate::Tree::get_range), ordered by
/// ascending key.
///
/// The buffer is owned by the caller. It dereferences to a slice; call
/// [`release`](RangeResults::release) (or simply drop it) when done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeResults<V> {
	values: Vec<V>,
}

impl<V> RangeResults<V> {
	pub(crate) fn new(values: Vec<V>) -> Self {
		RangeResults {
			values,
		}
	}

	/// Number of values returned.
	#[inline]
	pub fn len(&self) -> usize {
		self.values.len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	#[inline]
	pub fn as_slice(&self) -> &[V] {
		&self.values
	}

	/// Takes ownership of the underlying buffer.
	pub fn into_vec(self) -> Vec<V> {
		self.values
	}

	/// Frees the result buffer.
	pub fn release(self) {}
}

impl<V> Deref for RangeResults<V> {
	type Target = [V];

	fn deref(&self) -> &[V] {
		&self.values
	}
}

impl<V> IntoIterator for RangeResults<V> {
	type Item = V;
	type IntoIter = std::vec::IntoIter<V>;

	fn into_iter(self) -> Self::IntoIter {
		self.values.into_iter()
	}
}

impl<'a, V> IntoIterator for &'a RangeResults<V> {
	type Item = &'a V;
	type IntoIter = std::slice::Iter<'a, V>;

	fn into_iter(self) -> Self::IntoIter {
		self.values.iter()
	}
}

impl<V> From<RangeResults<V>> for Vec<V> {
	fn from(results: RangeResults<V>) -> Vec<V> {
		results.values
	}
}

#[cfg(test)]
mod tests {
	use crate::Tree;

	#[test]
	fn iter_walks_all_leaves_in_order() {
		let mut tree: Tree<i64, u64> = Tree::new(3).unwrap();
		for k in (0..50).rev() {
			tree.put(k, k as u64 + 100).unwrap();
		}

		let entries: Vec<_> = tree.iter().map(|(k, v)| (*k, *v)).collect();
		assert_eq!(entries.len(), 50);
		for (i, (k, v)) in entries.into_iter().enumerate() {
			assert_eq!(k, i as i64);
			assert_eq!(v, i as u64 + 100);
		}
	}

	#[test]
	fn iter_on_empty_tree() {
		let tree: Tree<i64, u64> = Tree::new(3).unwrap();
		let mut iter = tree.iter();
		assert!(iter.next().is_none());
		assert!(iter.next().is_none());
	}

	#[test]
	fn range_results_views() {
		let mut tree: Tree<i64, u64> = Tree::new(4).unwrap();
		for k in 0..10 {
			tree.put(k, k as u64).unwrap();
		}

		let results = tree.get_range(&2, &5).unwrap();
		assert_eq!(results.len(), 4);
		assert_eq!(results.iter().sum::<u64>(), 14);
		assert_eq!((&results).into_iter().count(), 4);
		assert_eq!(results.first(), Some(&2));
		assert_eq!(results.clone().into_vec(), vec![2, 3, 4, 5]);
		assert_eq!(Vec::from(results.clone()), vec![2, 3, 4, 5]);
		assert_eq!(results.into_iter().last(), Some(5));
	}
}
