//! Node storage.
//!
//! Every node of a tree lives in one [`NodeArena`] slot and is addressed by
//! its [`NodeId`]. A node is created here (first root, split sibling, new
//! root) and destroyed here exactly once (merge, root collapse, clear, or
//! when the arena itself is dropped with the tree).
//!
//! Allocation is fallible end to end: slot growth and node buffers use
//! `try_reserve`, and the free list keeps room for every slot so that
//! releasing a node never allocates.

use crate::error::{Error, Result};
use crate::node::{Node, NodeId, NodeLayout};

pub(crate) struct NodeArena<K, V> {
	slots: Vec<Option<Node<K, V>>>,
	free: Vec<NodeId>,
	live: usize,
}

impl<K, V> NodeArena<K, V> {
	pub(crate) fn new() -> Self {
		NodeArena {
			slots: Vec::new(),
			free: Vec::new(),
			live: 0,
		}
	}

	/// Number of nodes currently allocated.
	#[inline]
	pub(crate) fn live(&self) -> usize {
		self.live
	}

	/// Allocates an empty node with buffers sized by `layout`.
	pub(crate) fn alloc(&mut self, layout: &NodeLayout) -> Result<NodeId> {
		let node = Node::try_new(layout)?;

		if let Some(id) = self.free.pop() {
			self.slots[id.index()] = Some(node);
			self.live += 1;
			return Ok(id);
		}

		let index = u32::try_from(self.slots.len()).map_err(|_| Error::AllocationFailure)?;
		self.slots.try_reserve(1)?;
		// Releasing any slot must be able to push onto the free list
		let wanted = self.slots.len() + 1;
		if self.free.capacity() < wanted {
			self.free.try_reserve(wanted - self.free.len())?;
		}

		self.slots.push(Some(node));
		self.live += 1;
		Ok(NodeId(index))
	}

	/// Destroys the node at `id` and returns its slot to the free list.
	pub(crate) fn release(&mut self, id: NodeId) -> Option<Node<K, V>> {
		let node = self.slots.get_mut(id.index())?.take()?;
		self.live -= 1;
		self.free.push(id);
		Some(node)
	}

	/// Returns the node at `id`.
	///
	/// # Panics
	///
	/// Panics if `id` does not refer to a live node. Ids only come from the
	/// tree's own structure, so this indicates an engine bug.
	#[inline]
	pub(crate) fn get(&self, id: NodeId) -> &Node<K, V> {
		match self.slots.get(id.index()) {
			Some(Some(node)) => node,
			_ => unreachable!("dangling node id {:?}", id),
		}
	}

	/// Returns the node at `id` mutably.
	///
	/// # Panics
	///
	/// Panics if `id` does not refer to a live node.
	#[inline]
	pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut Node<K, V> {
		match self.slots.get_mut(id.index()) {
			Some(Some(node)) => node,
			_ => unreachable!("dangling node id {:?}", id),
		}
	}

	/// Returns the node at `id`, or `None` for a dangling id.
	#[inline]
	pub(crate) fn try_get(&self, id: NodeId) -> Option<&Node<K, V>> {
		self.slots.get(id.index()).and_then(Option::as_ref)
	}

	/// Returns two distinct nodes mutably.
	///
	/// # Panics
	///
	/// Panics if `a == b` or either id is dangling.
	pub(crate) fn pair_mut(&mut self, a: NodeId, b: NodeId) -> (&mut Node<K, V>, &mut Node<K, V>) {
		assert_ne!(a, b, "pair_mut requires two distinct nodes");
		let (lo, hi, swapped) = if a.index() < b.index() {
			(a, b, false)
		} else {
			(b, a, true)
		};

		let (head, tail) = self.slots.split_at_mut(hi.index());
		let (Some(Some(lo_node)), Some(Some(hi_node))) = (head.get_mut(lo.index()), tail.first_mut())
		else {
			unreachable!("dangling node id in pair {:?}, {:?}", a, b)
		};

		if swapped {
			(hi_node, lo_node)
		} else {
			(lo_node, hi_node)
		}
	}
}
