//! Tree configuration fixed at creation time.

use crate::error::{Error, Result};

/// Default fanout: up to 64 keys per node.
pub const DEFAULT_MAX_KEYS: usize = 64;

/// Smallest fanout that still lets a split produce two non-empty halves.
pub const MIN_MAX_KEYS: usize = 2;

/// Creation-time parameters of a [`Tree`](crate::Tree).
///
/// ```
/// use bptree::Config;
///
/// let config = Config::new(16).debug(true);
/// assert_eq!(config.max_keys, 16);
/// assert_eq!(config.min_keys(), 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
	/// Upper bound on keys per node.
	pub max_keys: usize,
	/// Emit `log` events at split, borrow, merge and invariant-failure points.
	pub debug: bool,
}

impl Config {
	/// Creates a configuration with the given fanout and logging disabled.
	pub const fn new(max_keys: usize) -> Self {
		Config {
			max_keys,
			debug: false,
		}
	}

	/// Enables or disables decision-point logging.
	pub const fn debug(mut self, debug: bool) -> Self {
		self.debug = debug;
		self
	}

	/// Sets the fanout.
	pub const fn max_keys(mut self, max_keys: usize) -> Self {
		self.max_keys = max_keys;
		self
	}

	/// Occupancy floor for every non-root node, leaf or internal.
	///
	/// `ceil((max_keys + 1) / 2) - 1`, which is `max_keys / 2`. A split of an
	/// overflowing node (`max_keys + 1` keys) leaves both halves at or above
	/// this floor, and two nodes that can neither lend nor absorb a key always
	/// fit into one node when merged.
	pub const fn min_keys(&self) -> usize {
		self.max_keys / 2
	}

	/// Rejects degenerate fanouts.
	pub fn validate(&self) -> Result<()> {
		if self.max_keys < MIN_MAX_KEYS {
			return Err(Error::InvalidArgument("max_keys must be at least 2"));
		}
		// Node ids and capacities are tracked in u32 space
		if self.max_keys > u32::MAX as usize - 2 {
			return Err(Error::InvalidArgument("max_keys is too large"));
		}
		Ok(())
	}
}

impl Default for Config {
	fn default() -> Self {
		Config::new(DEFAULT_MAX_KEYS)
	}
}
