//! Structural validation.
//!
//! [`Tree::validate`] walks the whole tree once, recursively, and reports
//! the first violated property:
//!
//! - keys within every node strictly ascend
//! - every non-root node holds between its floor and `max_keys` keys; a root
//!   leaf may hold zero, an internal root at least one
//! - an internal node with `n` keys has `n + 1` children
//! - every leaf sits at depth `height`
//! - for each separator `K[i]`: every key under `C[i]` is smaller, and the
//!   smallest key under `C[i + 1]` equals it
//! - the leaf list visits exactly the leaves of the tree, left to right, in
//!   strictly ascending key order, and ends
//! - `len()` matches the keys stored and every allocated node is reachable
//!
//! Keys are not required to be `Debug`, so violations locate the fault by
//! level and position rather than by key.

use std::cmp::Ordering;

use thiserror::Error;

use crate::compare::Comparator;
use crate::node::{Node, NodeId, NodeKind};
use crate::Tree;

/// A structural property the tree fails to satisfy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
	#[error("node at level {level} references a freed or unknown node")]
	DanglingNode {
		level: usize,
	},

	#[error("keys at level {level} are not strictly ascending at position {position}")]
	UnsortedKeys {
		level: usize,
		position: usize,
	},

	#[error("{kind:?} node at level {level} holds {len} keys, outside [{min}, {max}]")]
	Occupancy {
		kind: NodeKind,
		level: usize,
		len: usize,
		min: usize,
		max: usize,
	},

	#[error("leaf at level {level} holds {keys} keys but {values} values")]
	ValueCount {
		level: usize,
		keys: usize,
		values: usize,
	},

	#[error("internal node at level {level} has {keys} keys but {children} children")]
	ChildCount {
		level: usize,
		keys: usize,
		children: usize,
	},

	#[error("leaf found at level {found}, expected all leaves at level {expected}")]
	LeafDepth {
		expected: usize,
		found: usize,
	},

	#[error("internal node found at level {level}, at or below leaf level {height}")]
	InternalTooDeep {
		level: usize,
		height: usize,
	},

	#[error("child {index} at level {level} has an empty subtree")]
	EmptySubtree {
		level: usize,
		index: usize,
	},

	#[error("separator {index} at level {level} is not above every key of its left child")]
	SeparatorTooLow {
		level: usize,
		index: usize,
	},

	#[error("separator {index} at level {level} differs from the minimum of its right child")]
	SeparatorNotTight {
		level: usize,
		index: usize,
	},

	#[error("leaf list diverges from the tree at leaf {index}")]
	LeafChain {
		index: usize,
	},

	#[error("leaf list ends after {found} of {expected} leaves")]
	LeafChainLength {
		expected: usize,
		found: usize,
	},

	#[error("leaf list keys are not strictly ascending in leaf {index}")]
	LeafChainOrder {
		index: usize,
	},

	#[error("tree reports {stored} entries but its leaves hold {found}")]
	CountMismatch {
		stored: usize,
		found: usize,
	},

	#[error("tree reports height {stored} but its leaves are at level {found}")]
	HeightMismatch {
		stored: usize,
		found: usize,
	},

	#[error("{live} nodes are allocated but {reachable} are reachable from the root")]
	Unreachable {
		live: usize,
		reachable: usize,
	},
}

/// State accumulated over one recursive walk.
struct Walk {
	leaf_depth: Option<usize>,
	leaves: Vec<NodeId>,
	nodes: usize,
	keys: usize,
}

impl<K: Copy, V: Copy, C: Comparator<K>> Tree<K, V, C> {
	/// Validates every structural invariant, reporting the first violation.
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
	/// assert_eq!(tree.validate(), Ok(()));
	/// # Ok::<(), Error>(())
	/// ```
	pub fn validate(&self) -> Result<(), Violation> {
		let mut walk = Walk {
			leaf_depth: None,
			leaves: Vec::new(),
			nodes: 0,
			keys: 0,
		};
		self.validate_node(self.root, 0, &mut walk)?;

		let found = walk.leaf_depth.unwrap_or(0);
		if found != self.height {
			return Err(Violation::HeightMismatch {
				stored: self.height,
				found,
			});
		}
		if walk.keys != self.count {
			return Err(Violation::CountMismatch {
				stored: self.count,
				found: walk.keys,
			});
		}
		if walk.nodes != self.arena.live() {
			return Err(Violation::Unreachable {
				live: self.arena.live(),
				reachable: walk.nodes,
			});
		}

		self.validate_leaf_chain(&walk.leaves)
	}

	/// Returns `true` if [`validate`](Self::validate) finds no violation.
	///
	/// With the debug flag set, a violation is logged as a warning.
	pub fn check_invariants(&self) -> bool {
		match self.validate() {
			Ok(()) => true,
			Err(violation) => {
				if self.config.debug {
					log::warn!(target: "bptree", "invariant violated: {}", violation);
				}
				false
			}
		}
	}

	/// Panics with the first violation found.
	#[cfg(any(test, feature = "test-utils"))]
	#[track_caller]
	pub fn assert_invariants(&self) {
		if let Err(violation) = self.validate() {
			panic!("tree invariant violated: {}", violation);
		}
	}

	/// Validates the subtree at `id`, returning its smallest and largest key.
	fn validate_node(
		&self,
		id: NodeId,
		level: usize,
		walk: &mut Walk,
	) -> Result<Option<(K, K)>, Violation> {
		let node = self.arena.try_get(id).ok_or(Violation::DanglingNode {
			level,
		})?;
		walk.nodes += 1;

		let keys = node.keys();
		for position in 1..keys.len() {
			if !self.compare.lt(&keys[position - 1], &keys[position]) {
				return Err(Violation::UnsortedKeys {
					level,
					position,
				});
			}
		}
		self.validate_occupancy(node, level)?;

		match node {
			Node::Leaf(leaf) => {
				if leaf.keys.len() != leaf.values.len() {
					return Err(Violation::ValueCount {
						level,
						keys: leaf.keys.len(),
						values: leaf.values.len(),
					});
				}
				let expected = *walk.leaf_depth.get_or_insert(level);
				if level != expected {
					return Err(Violation::LeafDepth {
						expected,
						found: level,
					});
				}

				walk.leaves.push(id);
				walk.keys += leaf.keys.len();
				Ok(leaf.keys.first().copied().zip(leaf.keys.last().copied()))
			}
			Node::Internal(internal) => {
				// Also bounds the recursion if children form a cycle
				if level >= self.height {
					return Err(Violation::InternalTooDeep {
						level,
						height: self.height,
					});
				}
				if internal.children.len() != internal.keys.len() + 1 {
					return Err(Violation::ChildCount {
						level,
						keys: internal.keys.len(),
						children: internal.children.len(),
					});
				}

				let mut low = None;
				let mut high = None;
				for (index, &child) in internal.children.iter().enumerate() {
					let Some((min, max)) = self.validate_node(child, level + 1, walk)? else {
						return Err(Violation::EmptySubtree {
							level,
							index,
						});
					};

					if let Some(separator) = internal.keys.get(index) {
						if !self.compare.lt(&max, separator) {
							return Err(Violation::SeparatorTooLow {
								level,
								index,
							});
						}
					}
					if index > 0 && self.compare.compare(&min, &internal.keys[index - 1]) != Ordering::Equal {
						return Err(Violation::SeparatorNotTight {
							level,
							index: index - 1,
						});
					}

					low.get_or_insert(min);
					high = Some(max);
				}
				Ok(low.zip(high))
			}
		}
	}

	fn validate_occupancy(&self, node: &Node<K, V>, level: usize) -> Result<(), Violation> {
		let len = node.len();
		let max = self.config.max_keys;
		let min = match (node, level) {
			(Node::Leaf(_), 0) => 0,
			(Node::Internal(_), 0) => 1,
			(Node::Leaf(_), _) => self.min_leaf_keys,
			(Node::Internal(_), _) => self.min_internal_keys,
		};

		if len < min || len > max {
			return Err(Violation::Occupancy {
				kind: node.kind(),
				level,
				len,
				min,
				max,
			});
		}
		Ok(())
	}

	/// Follows the `next` links from the leftmost leaf and compares them with
	/// the leaves found by the recursive walk.
	fn validate_leaf_chain(&self, leaves: &[NodeId]) -> Result<(), Violation> {
		let mut current = leaves.first().copied();
		let mut previous: Option<K> = None;
		let mut index = 0;

		while let Some(id) = current {
			if leaves.get(index) != Some(&id) {
				return Err(Violation::LeafChain {
					index,
				});
			}
			let Some(Node::Leaf(leaf)) = self.arena.try_get(id) else {
				return Err(Violation::LeafChain {
					index,
				});
			};

			for key in &leaf.keys {
				if let Some(previous) = previous {
					if !self.compare.lt(&previous, key) {
						return Err(Violation::LeafChainOrder {
							index,
						});
					}
				}
				previous = Some(*key);
			}

			index += 1;
			current = leaf.next;
		}

		if index != leaves.len() {
			return Err(Violation::LeafChainLength {
				expected: leaves.len(),
				found: index,
			});
		}
		Ok(())
	}
}
