//! Shared access to a tree from multiple threads.
//!
//! A [`Tree`] is single-writer: every mutation takes `&mut self`. A
//! [`SharedTree`] puts the tree behind a `parking_lot` reader-writer lock so
//! lookups and range scans run concurrently while `put` and `remove` are
//! serialized.
//!
//! ```
//! use bptree::{Error, SharedTree, Tree};
//! use std::thread;
//!
//! let shared = SharedTree::new(Tree::<i64, u64>::new(16)?);
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|t| {
//!         let shared = shared.clone();
//!         thread::spawn(move || {
//!             for k in 0..100 {
//!                 shared.put(t * 1000 + k, k as u64).unwrap();
//!             }
//!         })
//!     })
//!     .collect();
//! for h in handles {
//!     h.join().unwrap();
//! }
//!
//! assert_eq!(shared.len(), 400);
//! assert!(shared.check_invariants());
//! # Ok::<(), Error>(())
//! ```

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::compare::{Comparator, Natural};
use crate::error::Result;
use crate::iter::RangeResults;
use crate::{Stats, Tree};

/// A cloneable, thread-safe handle to one tree.
pub struct SharedTree<K, V, C = Natural> {
	inner: Arc<RwLock<Tree<K, V, C>>>,
}

impl<K, V, C> Clone for SharedTree<K, V, C> {
	fn clone(&self) -> Self {
		SharedTree {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<K, V, C> From<Tree<K, V, C>> for SharedTree<K, V, C> {
	fn from(tree: Tree<K, V, C>) -> Self {
		SharedTree {
			inner: Arc::new(RwLock::new(tree)),
		}
	}
}

impl<K: Copy, V: Copy, C: Comparator<K>> SharedTree<K, V, C> {
	pub fn new(tree: Tree<K, V, C>) -> Self {
		Self::from(tree)
	}

	/// Inserts under the write lock. See [`Tree::put`].
	pub fn put(&self, key: K, value: V) -> Result<()> {
		self.inner.write().put(key, value)
	}

	/// Removes under the write lock. See [`Tree::remove`].
	pub fn remove(&self, key: &K) -> Result<V> {
		self.inner.write().remove(key)
	}

	pub fn get(&self, key: &K) -> Result<V> {
		self.inner.read().get(key)
	}

	pub fn contains(&self, key: &K) -> bool {
		self.inner.read().contains(key)
	}

	/// Scans `[low, high]` under a single read lock, so the result is a
	/// consistent snapshot.
	pub fn get_range(&self, low: &K, high: &K) -> Result<RangeResults<V>> {
		self.inner.read().get_range(low, high)
	}

	pub fn len(&self) -> usize {
		self.inner.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.read().is_empty()
	}

	pub fn stats(&self) -> Stats {
		self.inner.read().stats()
	}

	pub fn check_invariants(&self) -> bool {
		self.inner.read().check_invariants()
	}

	/// Locks the tree for reading, e.g. to iterate over it.
	pub fn read(&self) -> RwLockReadGuard<'_, Tree<K, V, C>> {
		self.inner.read()
	}

	/// Locks the tree for writing, e.g. to run several mutations atomically.
	pub fn write(&self) -> RwLockWriteGuard<'_, Tree<K, V, C>> {
		self.inner.write()
	}

	/// Returns the tree if this is the last handle to it.
	pub fn try_unwrap(self) -> std::result::Result<Tree<K, V, C>, Self> {
		Arc::try_unwrap(self.inner).map(RwLock::into_inner).map_err(|inner| SharedTree {
			inner,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Error;

	#[test]
	fn write_guard_batches_mutations() {
		let shared = SharedTree::new(Tree::<i64, u64>::new(4).unwrap());
		{
			let mut tree = shared.write();
			for k in 0..10 {
				tree.put(k, k as u64).unwrap();
			}
		}
		assert_eq!(shared.len(), 10);
		assert_eq!(shared.read().iter().count(), 10);
		assert_eq!(shared.remove(&3), Ok(3));
		assert_eq!(shared.get(&3), Err(Error::KeyNotFound));
	}

	#[test]
	fn try_unwrap_requires_last_handle() {
		let shared = SharedTree::new(Tree::<i64, u64>::new(4).unwrap());
		let other = shared.clone();
		let shared = shared.try_unwrap().unwrap_err();
		drop(other);
		assert!(shared.try_unwrap().is_ok());
	}
}
