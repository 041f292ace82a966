//! # bptree: An Embeddable In-Memory B+ Tree Index
//!
//! This crate provides an ordered index mapping fixed-size keys to opaque,
//! word-sized value handles. It is meant to be linked into a larger storage
//! engine as its indexing primitive: there is no durability, no transaction
//! support and no I/O.
//!
//! ## Design Overview
//!
//! **Runtime fanout**: the maximum number of keys per node (`max_keys`) is
//! chosen when the tree is created. Every node's key and payload buffers are
//! sized once from a [`NodeLayout`] computed for that fanout, with one spare
//! slot absorbing the transient overflow key of a split.
//!
//! **Arena ownership**: nodes live in an arena and refer to each other by id.
//! A parent owns its children; the leaf `next` link is a non-owning
//! cross-reference used only to walk the leaves in key order.
//!
//! **Tight separators**: every separator in an internal node equals the
//! smallest key of the subtree to its right. Inserts, splits, borrows and
//! merges all preserve this, and [`Tree::check_invariants`] verifies it.
//!
//! ### Tree Structure
//!
//! ```text
//!                    ┌─────────────────┐
//!                    │  Internal Root  │  level 0
//!                    │   keys: [K]     │
//!                    │ children: [id]  │
//!                    └────────┬────────┘
//!                             │
//!              ┌──────────────┼──────────────┐
//!              ▼              ▼              ▼
//!        ┌──────────┐  ┌──────────┐  ┌──────────┐
//!        │   Leaf   │─▶│   Leaf   │─▶│   Leaf   │  level == height
//!        │ keys:[K] │  │ keys:[K] │  │ keys:[K] │
//!        │ vals:[V] │  │ vals:[V] │  │ vals:[V] │
//!        └──────────┘  └──────────┘  └──────────┘
//! ```
//!
//! A tree holding a single leaf has height 0.
//!
//! ## Basic Usage
//!
//! ```
//! use bptree::{Error, Tree};
//!
//! let mut tree: Tree<i64, usize> = Tree::new(4)?;
//!
//! tree.put(10, 0x1000)?;
//! tree.put(20, 0x2000)?;
//! assert_eq!(tree.put(10, 0x3000), Err(Error::DuplicateKey));
//!
//! assert_eq!(tree.get(&20), Ok(0x2000));
//! assert!(tree.contains(&10));
//!
//! let range = tree.get_range(&0, &15)?;
//! assert_eq!(&range[..], &[0x1000]);
//!
//! assert_eq!(tree.remove(&10), Ok(0x1000));
//! assert!(tree.check_invariants());
//! # Ok::<(), Error>(())
//! ```
//!
//! ## Thread Safety
//!
//! A [`Tree`] has no internal synchronization; mutating operations take
//! `&mut self`. Callers that need shared access can wrap it in a
//! [`SharedTree`], which serializes writers and admits concurrent readers.

use std::fmt;

use smallvec::SmallVec;

/// Emits a `log` event when the tree was created with the debug flag set.
macro_rules! decision {
	($tree:expr, $($arg:tt)+) => {
		if $tree.config.debug {
			log::debug!(target: "bptree", $($arg)+);
		}
	};
}

mod arena;
mod check;
pub mod compare;
pub mod config;
pub mod error;
pub mod iter;
pub mod node;
pub mod sync;

#[cfg(any(test, feature = "test-utils"))]
pub mod alloc;
#[cfg(any(test, feature = "test-utils"))]
pub mod util;

use arena::NodeArena;
use node::{Node, NodeId};

pub use check::Violation;
pub use compare::{Comparator, Natural};
pub use config::{Config, DEFAULT_MAX_KEYS};
pub use error::{Error, Result};
pub use iter::{Iter, RangeResults};
pub use node::{NodeKind, NodeLayout};
pub use sync::SharedTree;

#[cfg(test)]
#[global_allocator]
static ALLOC: alloc::TrackingAllocator = alloc::TrackingAllocator;

// ---------------------------------------------------------------------------
// Public Type Aliases
// ---------------------------------------------------------------------------

/// A tree keyed by signed 64-bit integers in numeric order.
pub type IntTree<V> = Tree<i64, V>;

/// A tree keyed by `N`-byte strings in byte-wise lexicographic order.
pub type BytesTree<const N: usize, V> = Tree<[u8; N], V>;

/// Upper bound on the height of any tree. Every internal node has at least
/// two children and every leaf at least one key, so a tree of height `h`
/// holds at least `2^h` entries.
const MAX_HEIGHT: usize = usize::BITS as usize;

/// Root-to-leaf descent record: each internal node visited and the child
/// index taken from it. Stored inline for any reachable height, so a descent
/// never allocates.
type Path = SmallVec<[(NodeId, usize); MAX_HEIGHT]>;

/// Nodes reserved ahead of a split cascade.
type SpareNodes = SmallVec<[NodeId; 16]>;

// ---------------------------------------------------------------------------
// Core Tree Structure
// ---------------------------------------------------------------------------

/// An in-memory B+ tree mapping keys `K` to value handles `V`.
///
/// # Type Parameters
///
/// - `K`: The key type, a fixed-size `Copy` type such as `i64` or `[u8; N]`.
/// - `V`: The value handle. The tree stores and returns it by value and never
///   dereferences or frees what it refers to.
/// - `C`: The key order, fixed for the tree's lifetime. Defaults to
///   [`Natural`], the key type's own `Ord`.
pub struct Tree<K, V, C = Natural> {
	/// Storage for every node reachable from `root`.
	arena: NodeArena<K, V>,
	/// The root node, a leaf while the tree has height 0.
	root: NodeId,
	/// Number of stored key/value pairs.
	count: usize,
	/// Levels from the root down to the leaves, root at level 0.
	height: usize,
	config: Config,
	/// Occupancy floor for non-root leaves.
	min_leaf_keys: usize,
	/// Occupancy floor for non-root internal nodes.
	min_internal_keys: usize,
	leaf_layout: NodeLayout,
	internal_layout: NodeLayout,
	compare: C,
}

impl<K: Copy + Ord, V: Copy> Tree<K, V, Natural> {
	/// Creates an empty tree with the given fanout and natural key order.
	///
	/// # Errors
	///
	/// Returns `Error::InvalidArgument` if `max_keys < 2`, and
	/// `Error::AllocationFailure` if the root leaf cannot be allocated.
	///
	/// # Example
	///
	/// ```
	/// use bptree::{Error, Tree};
	///
	/// let tree: Tree<i64, usize> = Tree::new(8)?;
	/// assert!(tree.is_empty());
	/// assert_eq!(tree.height(), 0); // Single leaf node
	///
	/// assert!(Tree::<i64, usize>::new(1).is_err());
	/// # Ok::<(), Error>(())
	/// ```
	pub fn new(max_keys: usize) -> Result<Self> {
		Self::with_config(Config::new(max_keys))
	}

	/// Creates an empty tree from a [`Config`] with natural key order.
	pub fn with_config(config: Config) -> Result<Self> {
		Self::with_comparator(config, Natural)
	}
}

impl<K: Copy, V: Copy, C: Comparator<K>> Tree<K, V, C> {
	// -----------------------------------------------------------------------
	// Construction
	// -----------------------------------------------------------------------

	/// Creates an empty tree ordered by `compare`.
	///
	/// # Example
	///
	/// ```
	/// use bptree::{Config, Error, Tree};
	///
	/// // Descending order
	/// let mut tree = Tree::with_comparator(Config::new(4), |a: &i64, b: &i64| b.cmp(a))?;
	/// tree.put(1, ())?;
	/// tree.put(2, ())?;
	/// assert_eq!(tree.iter().map(|(k, _)| *k).collect::<Vec<_>>(), vec![2, 1]);
	/// # Ok::<(), Error>(())
	/// ```
	pub fn with_comparator(config: Config, compare: C) -> Result<Self> {
		config.validate()?;

		let leaf_layout = NodeLayout::new::<K, V>(config.max_keys, NodeKind::Leaf)?;
		let internal_layout = NodeLayout::new::<K, V>(config.max_keys, NodeKind::Internal)?;

		// The tree starts as a single empty leaf
		let mut arena = NodeArena::new();
		let root = arena.alloc(&leaf_layout)?;

		Ok(Tree {
			arena,
			root,
			count: 0,
			height: 0,
			min_leaf_keys: config.min_keys(),
			min_internal_keys: config.min_keys(),
			config,
			leaf_layout,
			internal_layout,
			compare,
		})
	}

	// -----------------------------------------------------------------------
	// Tree Metadata
	// -----------------------------------------------------------------------

	/// Returns the number of stored key/value pairs.
	#[inline]
	pub fn len(&self) -> usize {
		self.count
	}

	/// Returns `true` if the tree holds no entries.
	#[inline]
	pub fn is_empty(&self) -> bool {
		self.count == 0
	}

	/// Returns the number of levels below the root; 0 for a single leaf.
	#[inline]
	pub fn height(&self) -> usize {
		self.height
	}

	/// Returns the fanout the tree was created with.
	#[inline]
	pub fn max_keys(&self) -> usize {
		self.config.max_keys
	}

	/// Returns the configuration the tree was created with.
	#[inline]
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Returns the byte layout used for nodes of the given kind.
	pub fn node_layout(&self, kind: NodeKind) -> NodeLayout {
		match kind {
			NodeKind::Leaf => self.leaf_layout,
			NodeKind::Internal => self.internal_layout,
		}
	}

	/// Collects count, height and a node census by walking the whole tree.
	///
	/// # Example
	///
	/// ```
	/// use bptree::{Error, Tree};
	///
	/// let mut tree: Tree<i64, u64> = Tree::new(3)?;
	/// for k in [10, 20, 30, 40] {
	///     tree.put(k, k as u64)?;
	/// }
	///
	/// let stats = tree.stats();
	/// assert_eq!(stats.count, 4);
	/// assert_eq!(stats.height, 1);
	/// assert_eq!(stats.node_count, 3);
	/// # Ok::<(), Error>(())
	/// ```
	pub fn stats(&self) -> Stats {
		let mut census = Census::default();
		self.count_nodes(self.root, &mut census);
		let internal_count = census.nodes - census.leaves;

		Stats {
			count: self.count,
			height: self.height,
			node_count: census.nodes,
			leaf_count: census.leaves,
			bytes: census.leaves * self.leaf_layout.size
				+ internal_count * self.internal_layout.size,
		}
	}

	fn count_nodes(&self, id: NodeId, census: &mut Census) {
		census.nodes += 1;
		match self.arena.get(id) {
			Node::Leaf(_) => census.leaves += 1,
			Node::Internal(internal) => {
				for &child in &internal.children {
					self.count_nodes(child, census);
				}
			}
		}
	}

	// -----------------------------------------------------------------------
	// Descent
	// -----------------------------------------------------------------------

	/// Descends from the root to the leaf whose key range covers `key`.
	///
	/// At each internal node the child followed is `C[i]` for the smallest
	/// `i` with `key < K[i]`, or the last child if there is none.
	fn find_leaf(&self, key: &K) -> NodeId {
		let mut id = self.root;
		loop {
			match self.arena.get(id) {
				Node::Leaf(_) => return id,
				Node::Internal(internal) => {
					id = internal.children[internal.child_index(key, &self.compare)];
				}
			}
		}
	}

	/// Like [`find_leaf`](Self::find_leaf), recording every internal node
	/// visited and the child index taken from it.
	fn find_leaf_recording(&self, key: &K, path: &mut Path) -> NodeId {
		let mut id = self.root;
		loop {
			match self.arena.get(id) {
				Node::Leaf(_) => return id,
				Node::Internal(internal) => {
					let pos = internal.child_index(key, &self.compare);
					path.push((id, pos));
					id = internal.children[pos];
				}
			}
		}
	}

	/// Follows first children down to the leftmost leaf.
	fn leftmost_leaf(&self) -> NodeId {
		let mut id = self.root;
		while let Node::Internal(internal) = self.arena.get(id) {
			id = internal.children[0];
		}
		id
	}

	/// Follows last children down to the rightmost leaf.
	fn rightmost_leaf(&self) -> NodeId {
		let mut id = self.root;
		while let Node::Internal(internal) = self.arena.get(id) {
			id = internal.children[internal.children.len() - 1];
		}
		id
	}

	/// Smallest key stored under `id`, or `None` if that subtree is empty.
	fn subtree_min(&self, mut id: NodeId) -> Option<K> {
		loop {
			match self.arena.get(id) {
				Node::Leaf(leaf) => return leaf.keys.first().copied(),
				Node::Internal(internal) => id = *internal.children.first()?,
			}
		}
	}

	// -----------------------------------------------------------------------
	// Public API: Read Operations
	// -----------------------------------------------------------------------

	/// Returns the value stored for `key`.
	///
	/// # Errors
	///
	/// Returns `Error::KeyNotFound` if the key is not stored.
	///
	/// # Example
	///
	/// ```
	/// use bptree::{Error, Tree};
	///
	/// let mut tree: Tree<i64, u64> = Tree::new(4)?;
	/// tree.put(1, 100)?;
	///
	/// assert_eq!(tree.get(&1), Ok(100));
	/// assert_eq!(tree.get(&2), Err(Error::KeyNotFound));
	/// # Ok::<(), Error>(())
	/// ```
	pub fn get(&self, key: &K) -> Result<V> {
		let leaf = self.arena.get(self.find_leaf(key)).as_leaf();
		match leaf.lower_bound(key, &self.compare) {
			(pos, true) => Ok(leaf.values[pos]),
			(_, false) => Err(Error::KeyNotFound),
		}
	}

	/// Returns `true` if the tree contains `key`.
	pub fn contains(&self, key: &K) -> bool {
		let leaf = self.arena.get(self.find_leaf(key)).as_leaf();
		leaf.lower_bound(key, &self.compare).1
	}

	/// Returns the values of every key `k` with `low <= k <= high`, ascending.
	///
	/// The scan descends once to the leaf holding the first key `>= low` and
	/// then follows the leaf list. An inverted interval yields no values.
	///
	/// # Errors
	///
	/// Returns `Error::AllocationFailure` if the result buffer cannot grow.
	///
	/// # Example
	///
	/// ```
	/// use bptree::{Error, Tree};
	///
	/// let mut tree: Tree<i64, u64> = Tree::new(3)?;
	/// for k in 1..=10 {
	///     tree.put(k, k as u64 * 10)?;
	/// }
	///
	/// let values = tree.get_range(&3, &6)?;
	/// assert_eq!(values.as_slice(), &[30, 40, 50, 60]);
	/// values.release();
	///
	/// assert!(tree.get_range(&6, &3)?.is_empty());
	/// # Ok::<(), Error>(())
	/// ```
	pub fn get_range(&self, low: &K, high: &K) -> Result<RangeResults<V>> {
		let mut values = Vec::new();
		if self.count == 0 || self.compare.lt(high, low) {
			return Ok(RangeResults::new(values));
		}

		let leaf_id = self.find_leaf(low);
		let (pos, _) = self.arena.get(leaf_id).as_leaf().lower_bound(low, &self.compare);

		for (key, value) in Iter::new(&self.arena, leaf_id, pos) {
			if self.compare.lt(high, key) {
				break;
			}
			values.try_reserve(1)?;
			values.push(*value);
		}

		Ok(RangeResults::new(values))
	}

	/// Returns the entries in ascending key order.
	///
	/// The iterator walks the leaf list without re-descending the tree.
	pub fn iter(&self) -> Iter<'_, K, V> {
		Iter::new(&self.arena, self.leftmost_leaf(), 0)
	}

	/// Returns the entry with the smallest key.
	pub fn first_key_value(&self) -> Option<(K, V)> {
		let leaf = self.arena.get(self.leftmost_leaf()).as_leaf();
		Some((*leaf.keys.first()?, *leaf.values.first()?))
	}

	/// Returns the entry with the largest key.
	pub fn last_key_value(&self) -> Option<(K, V)> {
		let leaf = self.arena.get(self.rightmost_leaf()).as_leaf();
		Some((*leaf.keys.last()?, *leaf.values.last()?))
	}

	// -----------------------------------------------------------------------
	// Public API: Insert
	// -----------------------------------------------------------------------

	/// Inserts `key` with `value`.
	///
	/// # Algorithm
	///
	/// 1. Descend to the target leaf, recording the path
	/// 2. Reject an existing key without mutating anything
	/// 3. Reserve one node per full node on the path (plus a new root when the
	///    root is full), so the cascade below cannot fail half way
	/// 4. Insert into the leaf and split upward while a node overflows
	///
	/// # Errors
	///
	/// - `Error::DuplicateKey` if `key` is already stored
	/// - `Error::AllocationFailure` if the split cascade cannot be reserved;
	///   the tree is left unchanged
	///
	/// # Example
	///
	/// ```
	/// use bptree::{Error, Tree};
	///
	/// let mut tree: Tree<i64, u64> = Tree::new(3)?;
	/// for k in [10, 20, 30, 40] {
	///     tree.put(k, k as u64)?;
	/// }
	///
	/// // The fourth key overflowed the root leaf and split it
	/// assert_eq!(tree.height(), 1);
	/// assert_eq!(tree.put(30, 0), Err(Error::DuplicateKey));
	/// assert_eq!(tree.get(&30), Ok(30));
	/// # Ok::<(), Error>(())
	/// ```
	pub fn put(&mut self, key: K, value: V) -> Result<()> {
		let mut path = Path::new();
		let leaf_id = self.find_leaf_recording(&key, &mut path);

		let (pos, exact) = self.arena.get(leaf_id).as_leaf().lower_bound(&key, &self.compare);
		if exact {
			return Err(Error::DuplicateKey);
		}

		// Every allocation happens before the first structural edit
		let spare = self.reserve_split_nodes(leaf_id, &path)?;

		self.arena.get_mut(leaf_id).as_leaf_mut().insert_at(pos, key, value);
		self.count += 1;

		if !spare.is_empty() {
			self.split_upward(leaf_id, path, spare)?;
		}
		Ok(())
	}

	/// Allocates the new siblings (and new root) a split cascade will need.
	///
	/// A node splits on this insert iff it already holds `max_keys` keys and
	/// the node below it splits too. The first reserved node is a leaf, the
	/// rest are internal. On failure every node reserved so far is released.
	fn reserve_split_nodes(&mut self, leaf_id: NodeId, path: &Path) -> Result<SpareNodes> {
		let mut spare = SpareNodes::new();
		if self.arena.get(leaf_id).len() < self.config.max_keys {
			return Ok(spare);
		}

		let mut splits = 1;
		for &(parent_id, _) in path.iter().rev() {
			if self.arena.get(parent_id).len() < self.config.max_keys {
				break;
			}
			splits += 1;
		}
		let grows_root = splits == path.len() + 1;
		let total = splits + usize::from(grows_root);

		spare.try_reserve(total)?;
		for i in 0..total {
			let layout = if i == 0 {
				self.leaf_layout
			} else {
				self.internal_layout
			};
			match self.arena.alloc(&layout) {
				Ok(id) => spare.push(id),
				Err(err) => {
					for id in spare.drain(..) {
						self.arena.release(id);
					}
					return Err(err);
				}
			}
		}
		Ok(spare)
	}

	/// Splits overflowing nodes from `leaf_id` up the recorded path.
	fn split_upward(&mut self, leaf_id: NodeId, mut path: Path, spare: SpareNodes) -> Result<()> {
		let mut spare = spare.into_iter();
		let mut node_id = leaf_id;

		while self.arena.get(node_id).len() > self.config.max_keys {
			let right_id =
				spare.next().ok_or(Error::Internal("split cascade ran out of reserved nodes"))?;

			let separator = match self.arena.pair_mut(node_id, right_id) {
				(Node::Leaf(left), Node::Leaf(right)) => {
					let split_pos = left.keys.len() / 2;
					left.split(right_id, right, split_pos)
				}
				(Node::Internal(left), Node::Internal(right)) => {
					left.split(right).ok_or(Error::Internal("split of an empty internal node"))?
				}
				_ => return Err(Error::Internal("split sibling has the wrong node kind")),
			};
			decision!(
				self,
				"split {:?} node {} into {} ({} + {} keys)",
				self.arena.get(node_id).kind(),
				node_id.0,
				right_id.0,
				self.arena.get(node_id).len(),
				self.arena.get(right_id).len()
			);

			match path.pop() {
				Some((parent_id, pos)) => {
					self.arena.get_mut(parent_id).as_internal_mut().insert_after(
						pos,
						separator,
						right_id,
					);
					node_id = parent_id;
				}
				None => {
					// The root split: grow the tree by one level
					let root_id =
						spare.next().ok_or(Error::Internal("no node reserved for new root"))?;
					let root = self.arena.get_mut(root_id).as_internal_mut();
					root.keys.push(separator);
					root.children.push(node_id);
					root.children.push(right_id);
					self.root = root_id;
					self.height += 1;
					decision!(self, "new root {} (height {})", root_id.0, self.height);
					break;
				}
			}
		}

		// Reservations are exact, anything left over is returned
		for id in spare {
			self.arena.release(id);
		}
		Ok(())
	}

	// -----------------------------------------------------------------------
	// Public API: Remove
	// -----------------------------------------------------------------------

	/// Removes `key`, returning the value that was stored for it.
	///
	/// # Algorithm
	///
	/// 1. Descend to the leaf, recording the path
	/// 2. Remove the entry; a root leaf needs no further work
	/// 3. Walk the path bottom-up. At each level: refresh the separator that
	///    referenced a changed subtree minimum, then fix an underflowing child
	///    by borrowing from the left sibling, else the right sibling, else by
	///    merging. Stop at the first level needing neither.
	/// 4. Replace an internal root left without keys by its only child
	///
	/// # Errors
	///
	/// - `Error::KeyNotFound` if `key` is not stored; nothing is changed
	/// - `Error::Internal` if restructuring found the tree corrupted
	///
	/// # Example
	///
	/// ```
	/// use bptree::{Error, Tree};
	///
	/// let mut tree: Tree<i64, u64> = Tree::new(4)?;
	/// tree.put(1, 100)?;
	///
	/// assert_eq!(tree.remove(&1), Ok(100));
	/// assert_eq!(tree.remove(&1), Err(Error::KeyNotFound)); // Already removed
	/// # Ok::<(), Error>(())
	/// ```
	pub fn remove(&mut self, key: &K) -> Result<V> {
		let mut path = Path::new();
		let leaf_id = self.find_leaf_recording(key, &mut path);

		let leaf = self.arena.get_mut(leaf_id).as_leaf_mut();
		let (pos, exact) = leaf.lower_bound(key, &self.compare);
		if !exact {
			return Err(Error::KeyNotFound);
		}
		let (_, value) = leaf.remove_at(pos);
		let underflow = leaf.keys.len() < self.min_leaf_keys;
		self.count -= 1;

		self.repair_path(path, underflow, pos == 0)?;
		Ok(value)
	}

	/// Restores occupancy and separator tightness along `path` after a removal.
	///
	/// `underflow` says whether the node below the current level fell under
	/// its floor; `min_changed` whether that node's smallest key changed.
	fn repair_path(
		&mut self,
		mut path: Path,
		mut underflow: bool,
		mut min_changed: bool,
	) -> Result<()> {
		while let Some((parent_id, idx)) = path.pop() {
			if !underflow && !min_changed {
				break;
			}

			if min_changed && idx > 0 {
				self.refresh_separator(parent_id, idx);
			}
			if underflow {
				self.rebalance(parent_id, idx)?;
			}

			// The root is exempt from the floor
			let is_root = path.is_empty();
			underflow = !is_root && self.arena.get(parent_id).len() < self.min_internal_keys;
			min_changed = min_changed && idx == 0;
		}

		self.collapse_root();
		Ok(())
	}

	/// Sets separator `idx - 1` of `parent_id` to the minimum of child `idx`.
	fn refresh_separator(&mut self, parent_id: NodeId, idx: usize) {
		let child = self.arena.get(parent_id).as_internal().children[idx];
		if let Some(min) = self.subtree_min(child) {
			self.arena.get_mut(parent_id).as_internal_mut().keys[idx - 1] = min;
		}
	}

	/// Fixes the underflowing child `idx` of `parent_id`.
	fn rebalance(&mut self, parent_id: NodeId, idx: usize) -> Result<()> {
		let (left, child, right) = {
			let parent = self.arena.get(parent_id).as_internal();
			(
				idx.checked_sub(1).map(|i| parent.children[i]),
				parent.children[idx],
				parent.children.get(idx + 1).copied(),
			)
		};
		let floor = if self.arena.get(child).is_leaf() {
			self.min_leaf_keys
		} else {
			self.min_internal_keys
		};

		if let Some(left_id) = left {
			if self.arena.get(left_id).len() > floor {
				return self.borrow_from_left(parent_id, idx, left_id, child);
			}
		}
		if let Some(right_id) = right {
			if self.arena.get(right_id).len() > floor {
				return self.borrow_from_right(parent_id, idx, child, right_id);
			}
		}

		match (left, right) {
			(Some(left_id), _) => self.merge(parent_id, idx - 1, left_id, child),
			(None, Some(right_id)) => self.merge(parent_id, idx, child, right_id),
			(None, None) => Err(Error::Internal("underflowing node has no sibling")),
		}
	}

	/// Moves the last entry of the left sibling into the front of child `idx`.
	///
	/// ```text
	/// Leaf:     parent [.., S, ..]         parent [.., L2, ..]
	///           left [L0, L1, L2]   ──▶    left [L0, L1]
	///           node [N0]                  node [L2, N0]
	///
	/// Internal: the separator S rotates down in front of the node's keys,
	///           the left sibling's last child moves across and its last key
	///           rotates up into the parent.
	/// ```
	fn borrow_from_left(
		&mut self,
		parent_id: NodeId,
		idx: usize,
		left_id: NodeId,
		node_id: NodeId,
	) -> Result<()> {
		let separator = self.arena.get(parent_id).as_internal().keys[idx - 1];

		let new_separator = match self.arena.pair_mut(left_id, node_id) {
			(Node::Leaf(left), Node::Leaf(node)) => {
				let last = left.keys.len() - 1;
				let (key, value) = left.remove_at(last);
				node.insert_at(0, key, value);
				key
			}
			(Node::Internal(left), Node::Internal(node)) => {
				let (Some(key), Some(child)) = (left.keys.pop(), left.children.pop()) else {
					return Err(Error::Internal("left sibling has nothing to lend"));
				};
				node.keys.insert(0, separator);
				node.children.insert(0, child);
				key
			}
			_ => return Err(Error::Internal("siblings differ in node kind")),
		};

		self.arena.get_mut(parent_id).as_internal_mut().keys[idx - 1] = new_separator;
		decision!(self, "node {} borrowed from left sibling {}", node_id.0, left_id.0);
		Ok(())
	}

	/// Moves the first entry of the right sibling onto the end of child `idx`.
	fn borrow_from_right(
		&mut self,
		parent_id: NodeId,
		idx: usize,
		node_id: NodeId,
		right_id: NodeId,
	) -> Result<()> {
		let separator = self.arena.get(parent_id).as_internal().keys[idx];

		let new_separator = match self.arena.pair_mut(node_id, right_id) {
			(Node::Leaf(node), Node::Leaf(right)) => {
				let (key, value) = right.remove_at(0);
				node.insert_at(node.keys.len(), key, value);
				*right.keys.first().ok_or(Error::Internal("right sibling emptied by borrow"))?
			}
			(Node::Internal(node), Node::Internal(right)) => {
				if right.keys.is_empty() {
					return Err(Error::Internal("right sibling has nothing to lend"));
				}
				let key = right.keys.remove(0);
				node.keys.push(separator);
				node.children.push(right.children.remove(0));
				key
			}
			_ => return Err(Error::Internal("siblings differ in node kind")),
		};

		self.arena.get_mut(parent_id).as_internal_mut().keys[idx] = new_separator;
		// An emptied leaf gets a new minimum from the borrowed entry
		if idx > 0 {
			self.refresh_separator(parent_id, idx);
		}
		decision!(self, "node {} borrowed from right sibling {}", node_id.0, right_id.0);
		Ok(())
	}

	/// Merges child `left_idx + 1` into child `left_idx` and frees it.
	///
	/// The parent loses the separator between them and the absorbed child
	/// reference. A combined size above the fanout means the floors were not
	/// maintained upstream; it is reported before anything is moved.
	fn merge(
		&mut self,
		parent_id: NodeId,
		left_idx: usize,
		left_id: NodeId,
		right_id: NodeId,
	) -> Result<()> {
		let separator = self.arena.get(parent_id).as_internal().keys[left_idx];
		let max_keys = self.config.max_keys;

		match self.arena.pair_mut(left_id, right_id) {
			(Node::Leaf(left), Node::Leaf(right)) => {
				if left.keys.len() + right.keys.len() > max_keys {
					return Err(Error::Internal("merged leaf would exceed node capacity"));
				}
				left.merge(right);
			}
			(Node::Internal(left), Node::Internal(right)) => {
				if left.keys.len() + right.keys.len() + 1 > max_keys {
					return Err(Error::Internal("merged internal node would exceed node capacity"));
				}
				left.merge(separator, right);
			}
			_ => return Err(Error::Internal("siblings differ in node kind")),
		}

		let parent = self.arena.get_mut(parent_id).as_internal_mut();
		parent.keys.remove(left_idx);
		parent.children.remove(left_idx + 1);
		self.arena.release(right_id);

		decision!(self, "merged node {} into {}", right_id.0, left_id.0);
		Ok(())
	}

	/// Replaces an internal root without keys by its only child.
	fn collapse_root(&mut self) {
		let child = match self.arena.get(self.root) {
			Node::Internal(internal) if internal.keys.is_empty() => {
				internal.children.first().copied()
			}
			_ => None,
		};

		if let Some(child) = child {
			let old_root = std::mem::replace(&mut self.root, child);
			self.arena.release(old_root);
			self.height -= 1;
			decision!(self, "root {} collapsed into {} (height {})", old_root.0, child.0, self.height);
		}
	}

	// -----------------------------------------------------------------------
	// Public API: Teardown
	// -----------------------------------------------------------------------

	/// Removes every entry, freeing all nodes but one empty root leaf.
	///
	/// # Example
	///
	/// ```
	/// use bptree::{Error, Tree};
	///
	/// let mut tree: Tree<i64, u64> = Tree::new(3)?;
	/// for k in 0..100 {
	///     tree.put(k, 0)?;
	/// }
	///
	/// tree.clear();
	/// assert!(tree.is_empty());
	/// assert_eq!(tree.height(), 0);
	/// assert_eq!(tree.stats().node_count, 1);
	/// # Ok::<(), Error>(())
	/// ```
	pub fn clear(&mut self) {
		// The leftmost leaf is reused as the new root so clearing never allocates
		let keep = self.leftmost_leaf();
		self.free_subtree(self.root, keep);

		let leaf = self.arena.get_mut(keep).as_leaf_mut();
		leaf.keys.clear();
		leaf.values.clear();
		leaf.next = None;

		self.root = keep;
		self.height = 0;
		self.count = 0;
	}

	/// Recursively frees `id` and everything below it, except `keep`.
	fn free_subtree(&mut self, id: NodeId, keep: NodeId) {
		if id == keep {
			return;
		}
		if let Some(Node::Internal(internal)) = self.arena.release(id) {
			for child in internal.children {
				self.free_subtree(child, keep);
			}
		}
	}
}

impl<K: fmt::Debug, V: fmt::Debug, C> fmt::Debug for Tree<K, V, C> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Tree")
			.field("count", &self.count)
			.field("height", &self.height)
			.field("max_keys", &self.config.max_keys)
			.field(
				"root",
				&DebugNode {
					arena: &self.arena,
					id: self.root,
				},
			)
			.finish()
	}
}

/// Formats a subtree by following child ids through the arena.
struct DebugNode<'a, K, V> {
	arena: &'a NodeArena<K, V>,
	id: NodeId,
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for DebugNode<'_, K, V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.arena.try_get(self.id) {
			None => write!(f, "<dangling {}>", self.id.0),
			Some(Node::Leaf(leaf)) => fmt::Debug::fmt(leaf, f),
			Some(Node::Internal(internal)) => f
				.debug_struct("InternalNode")
				.field("keys", &internal.keys)
				.field(
					"children",
					&DebugChildren {
						arena: self.arena,
						children: &internal.children,
					},
				)
				.finish(),
		}
	}
}

struct DebugChildren<'a, K, V> {
	arena: &'a NodeArena<K, V>,
	children: &'a [NodeId],
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for DebugChildren<'_, K, V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list()
			.entries(self.children.iter().map(|&id| DebugNode {
				arena: self.arena,
				id,
			}))
			.finish()
	}
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// A snapshot of tree size and shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stats {
	/// Number of stored key/value pairs.
	pub count: usize,
	/// Levels below the root.
	pub height: usize,
	/// Nodes reachable from the root.
	pub node_count: usize,
	/// Leaves among them.
	pub leaf_count: usize,
	/// Node memory per [`NodeLayout`], summed over all nodes.
	pub bytes: usize,
}

#[derive(Default)]
struct Census {
	nodes: usize,
	leaves: usize,
}
