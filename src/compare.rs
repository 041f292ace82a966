//! Key ordering.
//!
//! A tree holds exactly one comparator for its whole lifetime. The built-in
//! key kinds, fixed-size byte strings (`[u8; N]`) and signed integers
//! (`i64`), are ordered by [`Natural`]: byte-wise lexicographic and numeric
//! respectively. Any closure `Fn(&K, &K) -> Ordering` can stand in for a
//! custom order as long as it is total and antisymmetric.

use std::cmp::Ordering;

/// A total order over keys of type `K`.
pub trait Comparator<K: ?Sized> {
	/// Compares two keys.
	fn compare(&self, a: &K, b: &K) -> Ordering;

	#[inline]
	fn lt(&self, a: &K, b: &K) -> bool {
		self.compare(a, b) == Ordering::Less
	}

	#[inline]
	fn le(&self, a: &K, b: &K) -> bool {
		self.compare(a, b) != Ordering::Greater
	}
}

/// The key type's own [`Ord`] implementation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Natural;

impl<K: Ord + ?Sized> Comparator<K> for Natural {
	#[inline]
	fn compare(&self, a: &K, b: &K) -> Ordering {
		a.cmp(b)
	}
}

impl<K: ?Sized, F> Comparator<K> for F
where
	F: Fn(&K, &K) -> Ordering,
{
	#[inline]
	fn compare(&self, a: &K, b: &K) -> Ordering {
		self(a, b)
	}
}

/// Binary search over a sorted key slice.
///
/// Returns `(position, exact_match)` where `position` is the index of `key`
/// if present, otherwise the index at which it would be inserted.
#[inline]
pub(crate) fn lower_bound<K, C>(keys: &[K], key: &K, cmp: &C) -> (usize, bool)
where
	C: Comparator<K> + ?Sized,
{
	let mut lower = 0;
	let mut upper = keys.len();

	while lower < upper {
		let mid = ((upper - lower) / 2) + lower;
		match cmp.compare(key, &keys[mid]) {
			Ordering::Less => upper = mid,
			Ordering::Greater => lower = mid + 1,
			Ordering::Equal => return (mid, true),
		}
	}

	(lower, false)
}

/// Index of the child to follow for `key` in an internal node.
///
/// The smallest `i` with `key < keys[i]`, or `keys.len()` if there is none.
#[inline]
pub(crate) fn child_index<K, C>(keys: &[K], key: &K, cmp: &C) -> usize
where
	C: Comparator<K> + ?Sized,
{
	match lower_bound(keys, key, cmp) {
		// Separators are the minimum of their right subtree
		(pos, true) => pos + 1,
		(pos, false) => pos,
	}
}
