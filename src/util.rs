//! Test utilities for loading sample trees from JSON fixtures.
//!
//! A fixture describes a tree node by node and is loaded as is, without
//! rebalancing, so it can describe trees that violate invariants:
//!
//! ```json
//! {
//!     "max_keys": 3,
//!     "root": {
//!         "keys": [30],
//!         "children": [
//!             { "keys": [10, 20], "values": [100, 200] },
//!             { "keys": [30, 40], "values": [300, 400] }
//!         ]
//!     }
//! }
//! ```
//!
//! Leaves are linked left to right in document order. Height is the depth of
//! the leftmost leaf and the entry count is the sum over all leaves.

use std::error::Error as StdError;
use std::path::Path;

use serde::Deserialize;

use crate::error::Result;
use crate::node::{Node, NodeId};
use crate::Tree;

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum TreeNode {
	Internal {
		keys: Vec<i64>,
		children: Vec<TreeNode>,
	},
	Leaf {
		keys: Vec<i64>,
		values: Vec<u64>,
	},
}

#[derive(Deserialize, Debug)]
struct SampleTree {
	max_keys: usize,
	root: TreeNode,
}

fn translate_node(
	tree: &mut Tree<i64, u64>,
	tree_node: TreeNode,
	leaves: &mut Vec<NodeId>,
) -> Result<NodeId> {
	match tree_node {
		TreeNode::Internal {
			keys,
			children,
		} => {
			let mut out_children = Vec::with_capacity(children.len());
			for child in children {
				out_children.push(translate_node(tree, child, leaves)?);
			}

			let layout = tree.internal_layout;
			let id = tree.arena.alloc(&layout)?;
			let internal = tree.arena.get_mut(id).as_internal_mut();
			internal.keys.extend(keys);
			internal.children.extend(out_children);
			Ok(id)
		}
		TreeNode::Leaf {
			keys,
			values,
		} => {
			let layout = tree.leaf_layout;
			let id = tree.arena.alloc(&layout)?;
			let leaf = tree.arena.get_mut(id).as_leaf_mut();
			leaf.keys.extend(keys);
			leaf.values.extend(values);
			leaves.push(id);
			Ok(id)
		}
	}
}

/// Builds a tree from a JSON fixture string.
pub fn tree_from_json(json: &str) -> std::result::Result<Tree<i64, u64>, Box<dyn StdError>> {
	let sample: SampleTree = serde_json::from_str(json)?;
	let mut tree = Tree::new(sample.max_keys)?;

	let mut leaves = Vec::new();
	let root = translate_node(&mut tree, sample.root, &mut leaves)?;
	for pair in leaves.windows(2) {
		tree.arena.get_mut(pair[0]).as_leaf_mut().next = Some(pair[1]);
	}

	let empty_root = std::mem::replace(&mut tree.root, root);
	tree.arena.release(empty_root);

	let mut height = 0;
	let mut id = tree.root;
	while let Node::Internal(internal) = tree.arena.get(id) {
		let Some(&child) = internal.children.first() else {
			break;
		};
		height += 1;
		id = child;
	}
	tree.height = height;
	tree.count = leaves.iter().map(|&leaf| tree.arena.get(leaf).len()).sum();

	Ok(tree)
}

/// Builds a tree from the JSON fixture at `path`.
pub fn sample_tree<P: AsRef<Path>>(path: P) -> std::result::Result<Tree<i64, u64>, Box<dyn StdError>> {
	let json = std::fs::read_to_string(path)?;
	tree_from_json(&json)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn loads_structure_as_written() {
		let tree = tree_from_json(include_str!("../tests/fixtures/valid_three_level.json")).unwrap();
		assert_eq!(tree.len(), 9);
		assert_eq!(tree.height(), 2);
		assert_eq!(tree.stats().node_count, 7);
		assert_eq!(tree.get(&70), Ok(700));
		assert_eq!(
			tree.iter().map(|(k, _)| *k).collect::<Vec<_>>(),
			vec![10, 15, 20, 30, 40, 50, 60, 70, 80]
		);
	}

	#[test]
	fn loads_from_path() {
		let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/loose_separator.json");
		let tree = sample_tree(path).unwrap();
		assert_eq!(tree.len(), 4);
		assert_eq!(tree.height(), 1);
	}

	#[test]
	fn rejects_malformed_json() {
		assert!(tree_from_json("{ \"max_keys\": 3 }").is_err());
		assert!(tree_from_json("{ \"max_keys\": 1, \"root\": { \"keys\": [], \"values\": [] } }").is_err());
	}
}
