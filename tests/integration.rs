//! # Integration Tests for the B+ Tree Index
//!
//! This module contains end-to-end integration tests that exercise the tree
//! through its public API with realistic workloads.

use bptree::{BytesTree, Config, Error, IntTree, NodeKind, Tree};
use rand::prelude::*;
use std::collections::BTreeMap;

fn check(tree: &Tree<i64, u64>) {
	if let Err(violation) = tree.validate() {
		panic!("tree invariant violated: {}", violation);
	}
}

// ===========================================================================
// Large Scale Operation Tests
// ===========================================================================

#[test]
fn large_scale_insert_and_lookup() {
	let mut tree: IntTree<u64> = Tree::new(32).unwrap();

	for i in 0..10_000 {
		tree.put(i, i as u64 * 10).unwrap();
	}

	check(&tree);
	assert_eq!(tree.len(), 10_000);

	for i in 0..10_000 {
		assert_eq!(tree.get(&i), Ok(i as u64 * 10), "Failed to find key {}", i);
	}
}

#[test]
fn large_scale_insert_and_remove() {
	let mut tree: IntTree<u64> = Tree::new(8).unwrap();

	for i in 0..10_000 {
		tree.put(i, i as u64).unwrap();
	}
	check(&tree);

	for i in 0..10_000 {
		assert_eq!(tree.remove(&i), Ok(i as u64), "Failed to remove key {}", i);
	}

	check(&tree);
	assert!(tree.is_empty());
	assert_eq!(tree.height(), 0);
	assert_eq!(tree.stats().node_count, 1);
}

#[test]
fn large_scale_random_operations() {
	let mut tree: IntTree<u64> = Tree::new(6).unwrap();
	let mut rng = rand::rng();
	let mut expected: BTreeMap<i64, u64> = BTreeMap::new();

	for _ in 0..10_000 {
		let key: i64 = rng.random_range(0..1000);
		let op: u8 = rng.random_range(0..4);

		match op {
			0 => {
				let value = key as u64 * 10;
				let result = tree.put(key, value);
				match expected.entry(key) {
					std::collections::btree_map::Entry::Occupied(_) => {
						assert_eq!(result, Err(Error::DuplicateKey));
					}
					std::collections::btree_map::Entry::Vacant(slot) => {
						assert_eq!(result, Ok(()));
						slot.insert(value);
					}
				}
			}
			1 => {
				assert_eq!(tree.remove(&key).ok(), expected.remove(&key));
			}
			2 => {
				assert_eq!(tree.get(&key).ok(), expected.get(&key).copied());
			}
			_ => {
				let high = key + rng.random_range(0..50);
				let values = tree.get_range(&key, &high).unwrap();
				let oracle: Vec<u64> = expected.range(key..=high).map(|(_, v)| *v).collect();
				assert_eq!(values.as_slice(), oracle.as_slice());
			}
		}
	}

	check(&tree);
	assert_eq!(tree.len(), expected.len());
}

// ===========================================================================
// Key Kinds
// ===========================================================================

#[test]
fn byte_string_keys_order_lexicographically() {
	let mut tree: BytesTree<4, u32> = Tree::new(4).unwrap();
	let words: [&[u8; 4]; 6] = [b"pear", b"appl", b"kiwi", b"fig_", b"date", b"lime"];
	for (i, word) in words.iter().enumerate() {
		tree.put(**word, i as u32).unwrap();
	}

	let keys: Vec<[u8; 4]> = tree.iter().map(|(k, _)| *k).collect();
	assert_eq!(keys, vec![*b"appl", *b"date", *b"fig_", *b"kiwi", *b"lime", *b"pear"]);
	assert_eq!(tree.get(b"kiwi"), Ok(2));
	assert_eq!(tree.get(b"plum"), Err(Error::KeyNotFound));

	// Every key from "d" up to and including "lime"
	let values = tree.get_range(b"d\0\0\0", b"lime").unwrap();
	assert_eq!(values.as_slice(), &[4, 3, 2, 5]);
	assert!(tree.check_invariants());
}

#[test]
fn byte_keys_compare_as_unsigned() {
	let mut tree: BytesTree<2, u8> = Tree::new(2).unwrap();
	tree.put([0x80, 0x00], 1).unwrap();
	tree.put([0x7f, 0xff], 0).unwrap();
	tree.put([0xff, 0x00], 2).unwrap();

	let values: Vec<u8> = tree.iter().map(|(_, v)| *v).collect();
	assert_eq!(values, vec![0, 1, 2]);
}

#[test]
fn negative_integer_keys() {
	let mut tree: IntTree<u64> = Tree::new(3).unwrap();
	for k in -50..50 {
		tree.put(k, (k + 50) as u64).unwrap();
	}

	assert_eq!(tree.first_key_value(), Some((-50, 0)));
	assert_eq!(tree.last_key_value(), Some((49, 99)));
	assert_eq!(tree.get_range(&-2, &1).unwrap().as_slice(), &[48, 49, 50, 51]);
	assert_eq!(tree.get_range(&i64::MIN, &-49).unwrap().len(), 2);
	check(&tree);
}

#[test]
fn extreme_integer_keys() {
	let mut tree: IntTree<u64> = Tree::new(2).unwrap();
	for k in [i64::MAX, i64::MIN, 0, -1, 1] {
		tree.put(k, 0).unwrap();
	}
	assert_eq!(tree.get_range(&i64::MIN, &i64::MAX).unwrap().len(), 5);
	assert_eq!(tree.remove(&i64::MIN), Ok(0));
	assert_eq!(tree.remove(&i64::MAX), Ok(0));
	check(&tree);
}

#[test]
fn custom_comparator_descending() {
	let descending = |a: &i64, b: &i64| b.cmp(a);
	let mut tree = Tree::with_comparator(Config::new(3), descending).unwrap();
	for k in 0..100i64 {
		tree.put(k, k as u64).unwrap();
	}

	assert!(tree.check_invariants());
	assert_eq!(tree.first_key_value(), Some((99, 99)));

	// Bounds follow the tree's order: low is the larger integer
	let values = tree.get_range(&10, &7).unwrap();
	assert_eq!(values.as_slice(), &[10, 9, 8, 7]);
	assert!(tree.get_range(&7, &10).unwrap().is_empty());

	for k in (0..100i64).step_by(2) {
		assert_eq!(tree.remove(&k), Ok(k as u64));
	}
	assert!(tree.check_invariants());
	assert_eq!(tree.len(), 50);
}

#[test]
fn pointer_sized_value_handles() {
	let records: Vec<Box<u64>> = (0..64).map(Box::new).collect();
	let mut tree: IntTree<*const u64> = Tree::new(4).unwrap();
	for (i, record) in records.iter().enumerate() {
		tree.put(i as i64, &**record as *const u64).unwrap();
	}

	// The tree hands back the handle untouched
	let handle = tree.get(&42).unwrap();
	assert!(std::ptr::eq(handle, &*records[42]));
	drop(tree);
	assert_eq!(*records[42], 42);
}

// ===========================================================================
// Configuration and Introspection
// ===========================================================================

#[test]
fn fanout_bounds() {
	assert!(matches!(IntTree::<u64>::new(1), Err(Error::InvalidArgument(_))));
	let tree = IntTree::<u64>::with_config(Config::default()).unwrap();
	assert_eq!(tree.max_keys(), bptree::DEFAULT_MAX_KEYS);
}

#[test]
fn node_layout_matches_fanout() {
	let tree: BytesTree<16, u64> = Tree::new(10).unwrap();

	let leaf = tree.node_layout(NodeKind::Leaf);
	assert_eq!(leaf.kind, NodeKind::Leaf);
	assert_eq!(leaf.key_capacity, 11);
	assert_eq!(leaf.payload_capacity, 11);
	assert!(leaf.payload_offset >= leaf.keys_offset + 11 * 16);
	assert_eq!(leaf.payload_offset % std::mem::align_of::<u64>(), 0);

	let internal = tree.node_layout(NodeKind::Internal);
	assert_eq!(internal.payload_capacity, 12);
	assert_eq!(internal.size % internal.align, 0);
}

#[test]
fn stats_track_growth_and_shrinkage() {
	let mut tree: IntTree<u64> = Tree::new(4).unwrap();
	let empty = tree.stats();

	for k in 0..1_000 {
		tree.put(k, 0).unwrap();
	}
	let full = tree.stats();
	assert_eq!(full.count, 1_000);
	assert!(full.height >= 4);
	assert!(full.leaf_count >= 1_000 / 4);
	assert!(full.bytes > empty.bytes);

	for k in 0..1_000 {
		tree.remove(&k).unwrap();
	}
	assert_eq!(tree.stats(), empty);
}

#[test]
fn clear_then_reuse() {
	let mut tree: IntTree<u64> = Tree::new(5).unwrap();
	for k in 0..500 {
		tree.put(k, 0).unwrap();
	}
	tree.clear();
	assert!(tree.is_empty());
	assert!(tree.get_range(&0, &500).unwrap().is_empty());

	for k in (0..500).rev() {
		tree.put(k, 1).unwrap();
	}
	check(&tree);
	assert_eq!(tree.len(), 500);
}

#[test]
fn range_results_release() {
	let mut tree: IntTree<u64> = Tree::new(8).unwrap();
	for k in 0..100 {
		tree.put(k, k as u64).unwrap();
	}

	let results = tree.get_range(&10, &19).unwrap();
	let total: u64 = results.iter().sum();
	assert_eq!(total, (10..20).sum::<u64>());
	results.release();

	let owned: Vec<u64> = tree.get_range(&95, &200).unwrap().into_vec();
	assert_eq!(owned, vec![95, 96, 97, 98, 99]);
}

#[test]
fn debug_output_shows_structure() {
	let mut tree: IntTree<u64> = Tree::new(3).unwrap();
	for k in [10, 20, 30, 40] {
		tree.put(k, k as u64).unwrap();
	}
	let debug = format!("{:?}", tree);
	assert!(debug.contains("height: 1"), "{}", debug);
	assert!(debug.contains("InternalNode"), "{}", debug);
	assert!(debug.contains("LeafNode"), "{}", debug);
}
