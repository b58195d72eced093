//! Wire form exchanged between `DocumentSync` peers.

use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::clock::VectorClock;

/// An opaque, immutable, causally-tagged operation produced by the CRDT library.
///
/// The sync layer never inspects the bytes; it only stores, transmits and hands them
/// back to the CRDT library for application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change(pub Vec<u8>);

impl Change {
	pub fn new(bytes: Vec<u8>) -> Self {
		Self(bytes)
	}

	pub fn as_bytes(&self) -> &[u8] {
		&self.0
	}
}

impl Serialize for Change {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let encoded = base64::engine::general_purpose::STANDARD.encode(&self.0);
		serializer.serialize_str(&encoded)
	}
}

impl<'de> Deserialize<'de> for Change {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let encoded = String::deserialize(deserializer)?;
		let bytes = base64::engine::general_purpose::STANDARD
			.decode(encoded.as_bytes())
			.map_err(serde::de::Error::custom)?;
		Ok(Self(bytes))
	}
}

/// `{ clock, changes? }`. A message with `changes` is a data push; a message with
/// only `clock` is a pull request for anything newer. `changes` is omitted (not
/// `null`) on the wire when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
	pub clock: VectorClock,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub changes: Option<Vec<Change>>,
}

impl Message {
	/// A pull request: "send me anything newer than this clock".
	pub fn pull(clock: VectorClock) -> Self {
		Self { clock, changes: None }
	}

	/// A data push carrying concrete changes alongside the sender's clock.
	pub fn push(clock: VectorClock, changes: Vec<Change>) -> Self {
		Self { clock, changes: Some(changes) }
	}

	pub fn is_pull(&self) -> bool {
		self.changes.is_none()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pull_request_omits_changes_field() {
		let msg = Message::pull(VectorClock::new());
		let json = serde_json::to_string(&msg).unwrap();
		assert!(!json.contains("changes"));
	}

	#[test]
	fn push_round_trips_opaque_bytes() {
		let change = Change::new(vec![1, 2, 3, 255, 0]);
		let msg = Message::push(VectorClock::new(), vec![change.clone()]);
		let json = serde_json::to_string(&msg).unwrap();
		let back: Message = serde_json::from_str(&json).unwrap();
		assert_eq!(back.changes, Some(vec![change]));
	}
}
