//! # Node Layout and Node Contents
//!
//! A node is one page of the tree. Its logical image is a fixed header
//! followed by a key region and a payload region:
//!
//! ```text
//! ┌──────────┬───────────────────────────┬─────┬──────────────────────────────┐
//! │  header  │ keys[0 .. max_keys + 1]   │ pad │ values[0 .. max_keys + 1]    │ leaf
//! │          │                           │     │ children[0 .. max_keys + 2]  │ internal
//! └──────────┴───────────────────────────┴─────┴──────────────────────────────┘
//!            ^ keys_offset                      ^ payload_offset
//! ```
//!
//! Both regions carry one slot beyond the fanout so that a node can hold a
//! transient overflow key (and its value or extra child) until the split that
//! resolves it completes. The payload region starts at an offset aligned to
//! the larger of the value and child-reference alignments.
//!
//! [`NodeLayout`] computes that image once per node kind; every node's key and
//! payload buffers are reserved from it, so capacities agree across all
//! operations.

use std::alloc::Layout;
use std::fmt;
use std::mem;

use crate::compare::{self, Comparator};
use crate::error::{Error, Result};

// ===========================================================================
// Node Identity and Layout
// ===========================================================================

/// Handle to a node slot inside a [`NodeArena`](crate::arena::NodeArena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(pub(crate) u32);

impl NodeId {
	#[inline]
	pub(crate) fn index(self) -> usize {
		self.0 as usize
	}
}

/// Which of the two node kinds a layout describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
	/// Holds keys and values, linked to the next leaf.
	Leaf,
	/// Holds separator keys and child references.
	Internal,
}

/// Fixed-size header at the start of every node image.
#[repr(C)]
#[allow(dead_code)]
struct NodeHeader {
	is_leaf: bool,
	key_count: u32,
	next: Option<NodeId>,
}

/// Byte layout of a node for a given fanout and kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeLayout {
	/// Node kind this layout describes.
	pub kind: NodeKind,
	/// Total size in bytes, padded to `align`.
	pub size: usize,
	/// Alignment of the whole node.
	pub align: usize,
	/// Offset of the first key.
	pub keys_offset: usize,
	/// Number of key slots, `max_keys + 1`.
	pub key_capacity: usize,
	/// Offset of the first value or child reference.
	pub payload_offset: usize,
	/// Number of value slots (`max_keys + 1`) or child slots (`max_keys + 2`).
	pub payload_capacity: usize,
}

impl NodeLayout {
	/// Computes the layout of a node holding `K` keys and `V` values.
	///
	/// # Errors
	///
	/// Returns `Error::InvalidArgument` if the node would not fit in the
	/// address space.
	pub fn new<K, V>(max_keys: usize, kind: NodeKind) -> Result<NodeLayout> {
		Self::compute::<K, V>(max_keys, kind)
			.ok_or(Error::InvalidArgument("node layout exceeds addressable size"))
	}

	fn compute<K, V>(max_keys: usize, kind: NodeKind) -> Option<NodeLayout> {
		let key_capacity = max_keys.checked_add(1)?;
		let payload_capacity = match kind {
			NodeKind::Leaf => max_keys.checked_add(1)?,
			NodeKind::Internal => max_keys.checked_add(2)?,
		};

		let header = Layout::new::<NodeHeader>();
		let keys = Layout::array::<K>(key_capacity).ok()?;
		let (with_keys, keys_offset) = header.extend(keys).ok()?;

		// The payload boundary is aligned for either payload kind
		let boundary = mem::align_of::<V>().max(mem::align_of::<NodeId>());
		let payload = match kind {
			NodeKind::Leaf => Layout::array::<V>(payload_capacity).ok()?,
			NodeKind::Internal => Layout::array::<NodeId>(payload_capacity).ok()?,
		}
		.align_to(boundary)
		.ok()?;
		let (full, payload_offset) = with_keys.extend(payload).ok()?;
		let full = full.pad_to_align();

		Some(NodeLayout {
			kind,
			size: full.size(),
			align: full.align(),
			keys_offset,
			key_capacity,
			payload_offset,
			payload_capacity,
		})
	}
}

// ===========================================================================
// Node
// ===========================================================================

/// A node in the B+ tree, either internal (index) or leaf (data).
pub(crate) enum Node<K, V> {
	/// An internal node containing separator keys and child references.
	Internal(InternalNode<K>),
	/// A leaf node containing key-value pairs.
	Leaf(LeafNode<K, V>),
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Node<K, V> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Node::Internal(ref internal) => f.debug_tuple("Internal").field(internal).finish(),
			Node::Leaf(ref leaf) => f.debug_tuple("Leaf").field(leaf).finish(),
		}
	}
}

impl<K, V> Node<K, V> {
	/// Allocates an empty node whose buffers match `layout` exactly.
	pub(crate) fn try_new(layout: &NodeLayout) -> Result<Self> {
		Ok(match layout.kind {
			NodeKind::Leaf => Node::Leaf(LeafNode::try_with_layout(layout)?),
			NodeKind::Internal => Node::Internal(InternalNode::try_with_layout(layout)?),
		})
	}

	#[inline]
	pub(crate) fn is_leaf(&self) -> bool {
		matches!(self, Node::Leaf(_))
	}

	#[inline]
	pub(crate) fn kind(&self) -> NodeKind {
		match self {
			Node::Leaf(_) => NodeKind::Leaf,
			Node::Internal(_) => NodeKind::Internal,
		}
	}

	/// Number of keys stored in this node.
	#[inline]
	pub(crate) fn len(&self) -> usize {
		self.keys().len()
	}

	#[inline]
	pub(crate) fn keys(&self) -> &[K] {
		match self {
			Node::Internal(ref internal) => &internal.keys,
			Node::Leaf(ref leaf) => &leaf.keys,
		}
	}

	/// Returns a reference to the inner leaf node.
	///
	/// # Panics
	///
	/// Panics if called on an internal node.
	#[inline]
	pub(crate) fn as_leaf(&self) -> &LeafNode<K, V> {
		match self {
			Node::Leaf(ref leaf) => leaf,
			Node::Internal(_) => {
				unreachable!("as_leaf() called on internal node - this indicates a traversal bug")
			}
		}
	}

	/// Returns a mutable reference to the inner leaf node.
	///
	/// # Panics
	///
	/// Panics if called on an internal node.
	#[inline]
	pub(crate) fn as_leaf_mut(&mut self) -> &mut LeafNode<K, V> {
		match self {
			Node::Leaf(ref mut leaf) => leaf,
			Node::Internal(_) => {
				unreachable!("as_leaf_mut() called on internal node - this indicates a traversal bug")
			}
		}
	}

	/// Returns a reference to the inner internal node.
	///
	/// # Panics
	///
	/// Panics if called on a leaf node.
	#[inline]
	pub(crate) fn as_internal(&self) -> &InternalNode<K> {
		match self {
			Node::Internal(ref internal) => internal,
			Node::Leaf(_) => {
				unreachable!("as_internal() called on leaf node - this indicates a traversal bug")
			}
		}
	}

	/// Returns a mutable reference to the inner internal node.
	///
	/// # Panics
	///
	/// Panics if called on a leaf node.
	#[inline]
	pub(crate) fn as_internal_mut(&mut self) -> &mut InternalNode<K> {
		match self {
			Node::Internal(ref mut internal) => internal,
			Node::Leaf(_) => {
				unreachable!("as_internal_mut() called on leaf node - this indicates a traversal bug")
			}
		}
	}
}

// ===========================================================================
// Leaf Node
// ===========================================================================

/// A leaf node, storing key-value pairs in ascending key order.
///
/// Leaves form a singly linked list through `next`, left to right. The link
/// is a non-owning handle: a leaf is owned by its parent (or the tree, when
/// it is the root), never by its predecessor.
pub(crate) struct LeafNode<K, V> {
	/// Sorted keys.
	pub(crate) keys: Vec<K>,
	/// Values corresponding to keys (same index).
	pub(crate) values: Vec<V>,
	/// The next leaf in ascending key order.
	pub(crate) next: Option<NodeId>,
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for LeafNode<K, V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LeafNode").field("keys", &self.keys).field("values", &self.values).finish()
	}
}

impl<K, V> LeafNode<K, V> {
	fn try_with_layout(layout: &NodeLayout) -> Result<LeafNode<K, V>> {
		let mut keys = Vec::new();
		keys.try_reserve_exact(layout.key_capacity)?;
		let mut values = Vec::new();
		values.try_reserve_exact(layout.payload_capacity)?;
		Ok(LeafNode {
			keys,
			values,
			next: None,
		})
	}

	/// Binary search for a key, returning position and whether it's an exact match.
	#[inline]
	pub(crate) fn lower_bound<C>(&self, key: &K, cmp: &C) -> (usize, bool)
	where
		C: Comparator<K> + ?Sized,
	{
		compare::lower_bound(&self.keys, key, cmp)
	}

	/// Inserts a key-value pair at `pos`, shifting later entries right.
	///
	/// The key buffer holds one overflow slot, so this never reallocates as
	/// long as the node held at most `max_keys` entries before the call.
	pub(crate) fn insert_at(&mut self, pos: usize, key: K, value: V) {
		self.keys.insert(pos, key);
		self.values.insert(pos, value);
	}

	/// Removes and returns the key-value pair at `pos`.
	pub(crate) fn remove_at(&mut self, pos: usize) -> (K, V) {
		let key = self.keys.remove(pos);
		let value = self.values.remove(pos);
		(key, value)
	}

	/// Moves the entries from `split_pos` onward into the empty `right` leaf.
	///
	/// `right` takes over this leaf's `next` link and this leaf links to
	/// `right`. Returns the separator for the parent: the first key of
	/// `right`, which stays stored in the leaf.
	///
	/// ```text
	/// Before: self  = [K0, K1, K2, K3]  next = N       (split_pos = 2)
	/// After:  self  = [K0, K1]          next = right
	///         right = [K2, K3]          next = N       separator = K2
	/// ```
	pub(crate) fn split(&mut self, right_id: NodeId, right: &mut LeafNode<K, V>, split_pos: usize) -> K
	where
		K: Copy,
	{
		debug_assert!(right.keys.is_empty());
		right.keys.extend(self.keys.drain(split_pos..));
		right.values.extend(self.values.drain(split_pos..));

		right.next = self.next.replace(right_id);

		right.keys[0]
	}

	/// Appends every entry of `right` to this leaf, emptying `right`.
	///
	/// The caller has checked that the combined entries fit.
	pub(crate) fn merge(&mut self, right: &mut LeafNode<K, V>) {
		self.keys.append(&mut right.keys);
		self.values.append(&mut right.values);
		self.next = right.next.take();
	}
}

// ===========================================================================
// Internal Node
// ===========================================================================

/// An internal (index) node, storing separator keys and child references.
///
/// # Structure
///
/// ```text
/// keys:      [K0,  K1,  ...  K(n-1)]
/// children: [C0,  C1,  C2,  ...   Cn]
///
/// Navigation: for key K follow C[i], the smallest i with K < K[i]
///             (Cn when there is none)
/// ```
///
/// Each separator `K[i-1]` equals the smallest key stored under `C[i]`.
pub(crate) struct InternalNode<K> {
	/// Separator keys, sorted in ascending order.
	pub(crate) keys: Vec<K>,
	/// Child references, one more than keys.
	pub(crate) children: Vec<NodeId>,
}

impl<K: fmt::Debug> fmt::Debug for InternalNode<K> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("InternalNode")
			.field("keys", &self.keys)
			.field("children", &self.children)
			.finish()
	}
}

impl<K> InternalNode<K> {
	fn try_with_layout(layout: &NodeLayout) -> Result<InternalNode<K>> {
		let mut keys = Vec::new();
		keys.try_reserve_exact(layout.key_capacity)?;
		let mut children = Vec::new();
		children.try_reserve_exact(layout.payload_capacity)?;
		Ok(InternalNode {
			keys,
			children,
		})
	}

	/// Index of the child to follow for `key`.
	#[inline]
	pub(crate) fn child_index<C>(&self, key: &K, cmp: &C) -> usize
	where
		C: Comparator<K> + ?Sized,
	{
		compare::child_index(&self.keys, key, cmp)
	}

	/// Inserts a separator and the right half of a child split at `pos`.
	///
	/// ```text
	/// Before: keys=[A, B], children=[c0, c1, c2]       splitting c1 (pos = 1)
	/// After:  keys=[A, S, B], children=[c0, c1, r, c2]
	/// ```
	pub(crate) fn insert_after(&mut self, pos: usize, key: K, child: NodeId) {
		self.keys.insert(pos, key);
		self.children.insert(pos + 1, child);
	}

	/// Splits this overflowing node, moving the upper half into the empty `right`.
	///
	/// The middle key is removed from both halves and returned for the parent.
	///
	/// ```text
	/// Before (max_keys = 4):
	///   keys:     [K0, K1, K2, K3, K4]
	///   children: [C0, C1, C2, C3, C4, C5]
	///
	/// After:
	///   self:  keys=[K0, K1]      children=[C0, C1, C2]
	///   right: keys=[K3, K4]      children=[C3, C4, C5]
	///   separator (pushed to parent): K2
	/// ```
	pub(crate) fn split(&mut self, right: &mut InternalNode<K>) -> Option<K> {
		debug_assert!(right.keys.is_empty());
		let mid = self.keys.len() / 2;

		right.keys.extend(self.keys.drain(mid + 1..));
		right.children.extend(self.children.drain(mid + 1..));

		self.keys.pop()
	}

	/// Appends `separator` and every key and child of `right` to this node.
	///
	/// ```text
	/// Before: self:  keys=[K0, K1], children=[C0, C1, C2]
	///         right: keys=[K3],     children=[C3, C4]      separator = K2
	/// After:  self:  keys=[K0, K1, K2, K3], children=[C0, C1, C2, C3, C4]
	/// ```
	pub(crate) fn merge(&mut self, separator: K, right: &mut InternalNode<K>) {
		self.keys.push(separator);
		self.keys.append(&mut right.keys);
		self.children.append(&mut right.children);
	}
}
