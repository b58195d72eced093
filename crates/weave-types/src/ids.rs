//! Stable string-based identifiers used throughout the sync stack.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(pub Box<str>);

		impl $name {
			pub fn as_str(&self) -> &str {
				&self.0
			}
		}

		impl From<String> for $name {
			fn from(s: String) -> Self {
				Self(s.into_boxed_str())
			}
		}

		impl From<&str> for $name {
			fn from(s: &str) -> Self {
				Self(Box::from(s))
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(&self.0)
			}
		}
	};
}

string_id!(DocumentId, "Stable identifier of a single logical CRDT document.");
string_id!(PeerId, "Stable identifier of a remote participant, per connection.");
string_id!(ActorId, "Identity that authors changes within a document's CRDT history.");

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_through_json() {
		let doc: DocumentId = "doc-1".into();
		let json = serde_json::to_string(&doc).unwrap();
		assert_eq!(json, "\"doc-1\"");
		let back: DocumentId = serde_json::from_str(&json).unwrap();
		assert_eq!(back, doc);
	}
}
