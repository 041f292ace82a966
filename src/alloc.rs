//! Allocation tracking and failure injection for tests.
//!
//! This module provides a global allocator that counts allocations and bytes
//! per thread, and can be armed to fail allocations on the current thread.
//! It is designed for tests that verify nodes are reclaimed and that an
//! allocation failure leaves a tree untouched.
//!
//! # Usage
//!
//! In test binaries that want to track allocations, use:
//!
//! ```ignore
//! use bptree::alloc::TrackingAllocator;
//!
//! #[global_allocator]
//! static ALLOC: TrackingAllocator = TrackingAllocator;
//!
//! #[test]
//! fn test_no_leaks() {
//!     bptree::alloc::reset_counters();
//!
//!     // ... test code ...
//!
//!     drop(tree);
//!
//!     bptree::alloc::check_no_leaks();
//! }
//! ```
//!
//! # Caveats
//!
//! - Counters and injected failures are per thread, so tests running in
//!   parallel do not disturb each other, but memory freed on another thread
//!   is not seen
//! - An armed thread fails infallible allocations too, which aborts the
//!   process; keep the armed scope to the fallible call under test

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::ptr;

thread_local! {
	/// Number of allocations since last reset.
	static ALLOC_COUNT: Cell<usize> = const { Cell::new(0) };
	/// Number of deallocations since last reset.
	static DEALLOC_COUNT: Cell<usize> = const { Cell::new(0) };
	/// Net bytes allocated since last reset.
	static BYTES_ALLOCATED: Cell<isize> = const { Cell::new(0) };
	/// Peak of `BYTES_ALLOCATED` since last reset.
	static PEAK_BYTES: Cell<usize> = const { Cell::new(0) };
	/// Allocations still allowed before injected failures start.
	static FAIL_AFTER: Cell<Option<usize>> = const { Cell::new(None) };
}

/// A tracking allocator wrapping the system allocator.
pub struct TrackingAllocator;

fn should_fail() -> bool {
	FAIL_AFTER
		.try_with(|remaining| match remaining.get() {
			None => false,
			Some(0) => true,
			Some(n) => {
				remaining.set(Some(n - 1));
				false
			}
		})
		.unwrap_or(false)
}

fn record(allocs: usize, deallocs: usize, bytes: isize) {
	let _ = ALLOC_COUNT.try_with(|c| c.set(c.get() + allocs));
	let _ = DEALLOC_COUNT.try_with(|c| c.set(c.get() + deallocs));
	let _ = BYTES_ALLOCATED.try_with(|current| {
		let now = current.get() + bytes;
		current.set(now);
		let _ = PEAK_BYTES.try_with(|peak| {
			if now > 0 && now as usize > peak.get() {
				peak.set(now as usize);
			}
		});
	});
}

unsafe impl GlobalAlloc for TrackingAllocator {
	unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
		if should_fail() {
			return ptr::null_mut();
		}
		record(1, 0, layout.size() as isize);
		System.alloc(layout)
	}

	unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
		record(0, 1, -(layout.size() as isize));
		System.dealloc(ptr, layout)
	}

	unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
		if should_fail() {
			return ptr::null_mut();
		}
		record(1, 0, layout.size() as isize);
		System.alloc_zeroed(layout)
	}

	unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
		if should_fail() {
			return ptr::null_mut();
		}
		record(0, 0, new_size as isize - layout.size() as isize);
		System.realloc(ptr, layout, new_size)
	}
}

// ---------------------------------------------------------------------------
// Failure Injection
// ---------------------------------------------------------------------------

/// Arms failure injection on the current thread until the guard is dropped.
///
/// The first `n` allocations (or reallocations) still succeed; every one
/// after that returns null.
#[must_use = "failure injection is disarmed when the guard is dropped"]
pub fn fail_after(n: usize) -> FailureGuard {
	FAIL_AFTER.with(|remaining| remaining.set(Some(n)));
	FailureGuard {
		_private: (),
	}
}

/// Disarms failure injection on drop.
pub struct FailureGuard {
	_private: (),
}

impl Drop for FailureGuard {
	fn drop(&mut self) {
		let _ = FAIL_AFTER.try_with(|remaining| remaining.set(None));
	}
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Resets this thread's allocation counters to zero.
///
/// Call this at the beginning of a test to start fresh counting.
pub fn reset_counters() {
	ALLOC_COUNT.with(|c| c.set(0));
	DEALLOC_COUNT.with(|c| c.set(0));
	BYTES_ALLOCATED.with(|c| c.set(0));
	PEAK_BYTES.with(|c| c.set(0));
}

/// Returns this thread's allocation statistics.
pub fn get_stats() -> AllocationStats {
	AllocationStats {
		alloc_count: ALLOC_COUNT.with(Cell::get),
		dealloc_count: DEALLOC_COUNT.with(Cell::get),
		bytes_allocated: BYTES_ALLOCATED.with(Cell::get),
		peak_bytes: PEAK_BYTES.with(Cell::get),
	}
}

/// Allocation statistics snapshot.
#[derive(Debug, Clone, Copy)]
pub struct AllocationStats {
	/// Total number of allocations since reset.
	pub alloc_count: usize,
	/// Total number of deallocations since reset.
	pub dealloc_count: usize,
	/// Current bytes allocated.
	pub bytes_allocated: isize,
	/// Peak bytes allocated since reset.
	pub peak_bytes: usize,
}

/// Checks that no memory has been leaked since the last reset.
///
/// # Panics
///
/// Panics if there are unmatched allocations or bytes still allocated.
pub fn check_no_leaks() {
	let stats = get_stats();
	let diff = stats.alloc_count as isize - stats.dealloc_count as isize;

	if diff != 0 {
		panic!(
			"Memory leak detected!\n\
             Allocations: {}\n\
             Deallocations: {}\n\
             Difference: {}\n\
             Bytes still allocated: {}",
			stats.alloc_count, stats.dealloc_count, diff, stats.bytes_allocated
		);
	}

	if stats.bytes_allocated != 0 {
		panic!(
			"Memory leak detected!\n\
             Bytes still allocated: {}\n\
             (alloc_count == dealloc_count but bytes != 0, possible size mismatch)",
			stats.bytes_allocated
		);
	}
}
