//! # Fixture-Based Tests
//!
//! These tests load hand-written trees from `tests/fixtures/*.json`, which
//! may violate invariants on purpose, and check what the validator reports.
//! They need the `test-utils` feature for `bptree::util::sample_tree`.

use bptree::util::sample_tree;
use bptree::{Tree, Violation};

fn fixture(name: &str) -> Tree<i64, u64> {
	let path = format!("{}/tests/fixtures/{}.json", env!("CARGO_MANIFEST_DIR"), name);
	sample_tree(&path).unwrap_or_else(|err| panic!("failed to load {}: {}", path, err))
}

#[test]
fn sample_tree_lookup() {
	let tree = fixture("valid_three_level");

	assert_eq!(tree.get(&10).ok(), Some(100));
	assert_eq!(tree.get(&50).ok(), Some(500));
	assert_eq!(tree.get(&80).ok(), Some(800));
	assert_eq!(tree.get(&25).ok(), None);
	assert!(tree.check_invariants());
}

#[test]
fn sample_tree_range() {
	let tree = fixture("valid_three_level");
	let values = tree.get_range(&15, &60).unwrap();
	assert_eq!(values.as_slice(), &[150, 200, 300, 400, 500, 600]);
}

#[test]
fn sample_tree_mutations_keep_it_valid() {
	let mut tree = fixture("valid_three_level");
	for k in [11, 12, 13, 14, 16, 17] {
		tree.put(k, 0).unwrap();
		assert!(tree.check_invariants());
	}
	for k in [10, 15, 20, 30, 40, 50, 60, 70, 80] {
		tree.remove(&k).unwrap();
		assert!(tree.check_invariants());
	}
	assert_eq!(tree.len(), 6);
}

#[test]
fn broken_fixtures_are_rejected() {
	for name in ["unsorted_leaf", "loose_separator", "uneven_depth", "underfull_leaf"] {
		let tree = fixture(name);
		assert!(!tree.check_invariants(), "{} should fail validation", name);
	}
	assert!(matches!(
		fixture("loose_separator").validate(),
		Err(Violation::SeparatorNotTight { .. })
	));
}
