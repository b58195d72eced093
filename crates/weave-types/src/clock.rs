//! Vector-clock algebra: the sole arbiter of "who is ahead" between two replicas.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A mapping from actor id to the highest sequence number we know that actor produced.
///
/// Backed by a `BTreeMap` rather than a `HashMap` so that serialization naturally
/// yields ascending actor-id key order, which is required for byte-level determinism
/// of the wire encoding (see the sync-protocol message format).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorClock(BTreeMap<String, u64>);

impl VectorClock {
	pub fn new() -> Self {
		Self(BTreeMap::new())
	}

	pub fn get(&self, actor: &str) -> u64 {
		self.0.get(actor).copied().unwrap_or(0)
	}

	pub fn set(&mut self, actor: impl Into<String>, seq: u64) {
		self.0.insert(actor.into(), seq);
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
		self.0.iter().map(|(k, v)| (k.as_str(), *v))
	}

	/// `lessOrEqual(a, b)`: true iff for every actor present in `self`, `self[k] <= other[k]`
	/// (absent keys in `other` are treated as zero).
	pub fn less_or_equal(&self, other: &VectorClock) -> bool {
		self.0.iter().all(|(actor, &seq)| seq <= other.get(actor))
	}

	/// Pointwise maximum over the union of both actor sets.
	pub fn merge(&self, other: &VectorClock) -> VectorClock {
		let mut merged = self.0.clone();
		for (actor, &seq) in &other.0 {
			let entry = merged.entry(actor.clone()).or_insert(0);
			if seq > *entry {
				*entry = seq;
			}
		}
		VectorClock(merged)
	}

	/// `lessOrEqual(a,b) && lessOrEqual(b,a)`.
	pub fn equivalent(&self, other: &VectorClock) -> bool {
		self.less_or_equal(other) && other.less_or_equal(self)
	}
}

impl From<BTreeMap<String, u64>> for VectorClock {
	fn from(map: BTreeMap<String, u64>) -> Self {
		Self(map)
	}
}

impl FromIterator<(String, u64)> for VectorClock {
	fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
		Self(iter.into_iter().collect())
	}
}
