//! # Error Types for the B+ Tree Index
//!
//! Every fallible operation on [`Tree`](crate::Tree) reports its outcome
//! through [`Result`]. None of these conditions is raised as a panic from a
//! correct caller, and none is swallowed.
//!
//! ## Error Kinds
//!
//! ```text
//! caller errors                      engine errors
//! ─────────────                      ─────────────
//! DuplicateKey     put               AllocationFailure   put / get_range
//! KeyNotFound      get / remove      Internal            remove (restructuring)
//! InvalidArgument  create
//! ```
//!
//! `DuplicateKey` and `KeyNotFound` never mutate the tree. `AllocationFailure`
//! leaves the tree exactly as it was before the call, because every node a
//! split needs is reserved before the first structural edit. `Internal` means
//! the engine found one of its own invariants broken while restructuring; it
//! is reported instead of writing past a node's capacity.

use std::collections::TryReserveError;

use thiserror::Error;

/// Errors returned by tree operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
	/// `put` was called with a key that is already stored.
	#[error("key already exists")]
	DuplicateKey,

	/// `get` or `remove` was called with a key that is not stored.
	#[error("key not found")]
	KeyNotFound,

	/// Memory for a node or a range result could not be reserved.
	///
	/// The tree is left in its pre-operation state.
	#[error("allocation failure")]
	AllocationFailure,

	/// The tree was created with a degenerate configuration.
	#[error("invalid argument: {0}")]
	InvalidArgument(&'static str),

	/// A structural invariant was found violated during restructuring.
	///
	/// This indicates a bug in the engine rather than caller misuse.
	#[error("internal consistency error: {0}")]
	Internal(&'static str),
}

impl Error {
	/// Returns `true` if this error signals a defect in the engine itself.
	pub fn is_internal(&self) -> bool {
		matches!(self, Error::Internal(_))
	}
}

impl From<TryReserveError> for Error {
	fn from(_: TryReserveError) -> Self {
		Error::AllocationFailure
	}
}

impl From<smallvec::CollectionAllocErr> for Error {
	fn from(_: smallvec::CollectionAllocErr) -> Self {
		Error::AllocationFailure
	}
}

/// A Result type alias using the crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
