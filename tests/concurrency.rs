//! # Concurrency Tests for the Shared Tree Handle
//!
//! A [`Tree`] has no internal synchronization; these tests exercise
//! [`SharedTree`], which serializes writers behind a reader-writer lock, from
//! several threads at once.

use bptree::{Error, SharedTree, Tree};
use rand::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

fn shared(max_keys: usize) -> SharedTree<i64, u64> {
	SharedTree::new(Tree::new(max_keys).unwrap())
}

// ===========================================================================
// Concurrent Writers
// ===========================================================================

#[test]
fn concurrent_insert_disjoint_ranges() {
	let tree = shared(4);
	let num_threads = 4;
	let entries_per_thread = 500;

	let handles: Vec<_> = (0..num_threads)
		.map(|t| {
			let tree = tree.clone();
			thread::spawn(move || {
				for i in 0..entries_per_thread {
					let key = t * entries_per_thread + i;
					tree.put(key, key as u64 * 10).unwrap();
				}
			})
		})
		.collect();
	for h in handles {
		h.join().unwrap();
	}

	assert_eq!(tree.len(), (num_threads * entries_per_thread) as usize);
	assert!(tree.check_invariants());
	for key in 0..num_threads * entries_per_thread {
		assert_eq!(tree.get(&key), Ok(key as u64 * 10));
	}
}

#[test]
fn concurrent_insert_same_keys_exactly_one_wins() {
	let tree = shared(3);
	let num_threads = 8;
	let barrier = Arc::new(Barrier::new(num_threads));
	let wins = Arc::new(AtomicUsize::new(0));

	let handles: Vec<_> = (0..num_threads)
		.map(|t| {
			let tree = tree.clone();
			let barrier = Arc::clone(&barrier);
			let wins = Arc::clone(&wins);
			thread::spawn(move || {
				barrier.wait();
				for key in 0..200 {
					match tree.put(key, t as u64) {
						Ok(()) => {
							wins.fetch_add(1, Ordering::Relaxed);
						}
						Err(err) => assert_eq!(err, Error::DuplicateKey),
					}
				}
			})
		})
		.collect();
	for h in handles {
		h.join().unwrap();
	}

	assert_eq!(wins.load(Ordering::Relaxed), 200);
	assert_eq!(tree.len(), 200);
	assert!(tree.check_invariants());
}

#[test]
fn concurrent_insert_and_remove() {
	let tree = shared(4);
	for k in 0..1_000 {
		tree.put(k, 0).unwrap();
	}

	let remover = {
		let tree = tree.clone();
		thread::spawn(move || {
			for k in (0..1_000).step_by(2) {
				assert_eq!(tree.remove(&k), Ok(0));
			}
		})
	};
	let inserter = {
		let tree = tree.clone();
		thread::spawn(move || {
			for k in 1_000..2_000 {
				tree.put(k, 1).unwrap();
			}
		})
	};
	remover.join().unwrap();
	inserter.join().unwrap();

	assert_eq!(tree.len(), 1_500);
	assert!(tree.check_invariants());
}

// ===========================================================================
// Readers Alongside Writers
// ===========================================================================

#[test]
fn readers_see_consistent_ranges() {
	let tree = shared(5);
	// Keys are inserted and removed in pairs (2k, 2k + 1) under one write lock
	let writer = {
		let tree = tree.clone();
		thread::spawn(move || {
			let mut rng = StdRng::seed_from_u64(1);
			for _ in 0..2_000 {
				let k = rng.random_range(0..200) * 2;
				let mut guard = tree.write();
				if guard.contains(&k) {
					guard.remove(&k).unwrap();
					guard.remove(&(k + 1)).unwrap();
				} else {
					guard.put(k, k as u64).unwrap();
					guard.put(k + 1, k as u64 + 1).unwrap();
				}
			}
		})
	};

	let readers: Vec<_> = (0..3)
		.map(|_| {
			let tree = tree.clone();
			thread::spawn(move || {
				for _ in 0..500 {
					let values = tree.get_range(&0, &400).unwrap();
					assert_eq!(values.len() % 2, 0, "a reader saw half of a pair");
					assert!(values.windows(2).all(|w| w[0] < w[1]));
				}
			})
		})
		.collect();

	writer.join().unwrap();
	for r in readers {
		r.join().unwrap();
	}
	assert!(tree.check_invariants());
}

#[test]
fn iterate_under_read_lock() {
	let tree = shared(8);
	for k in 0..300 {
		tree.put(k, k as u64).unwrap();
	}

	let handles: Vec<_> = (0..4)
		.map(|_| {
			let tree = tree.clone();
			thread::spawn(move || {
				let guard = tree.read();
				let sum: u64 = guard.iter().map(|(_, v)| *v).sum();
				assert_eq!(sum, (0..300).sum::<u64>());
			})
		})
		.collect();
	for h in handles {
		h.join().unwrap();
	}

	let tree = tree.try_unwrap().ok().unwrap();
	assert_eq!(tree.stats().count, 300);
}
