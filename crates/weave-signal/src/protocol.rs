//! Wire messages of the introduction endpoint (§4.6, §6). Stateless and opaque to
//! document contents: the server only ever reads `documentId`s and peer ids.

use serde::{Deserialize, Serialize};
use weave_types::{DocumentId, PeerId};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum IntroductionMessage {
	/// `C→S`: advertise interest in a set of documents.
	Join { join: Vec<DocumentId> },
	/// `S→C`: `otherId` shares interest in `keys`.
	Introduction { id: PeerId, keys: Vec<DocumentId> },
}
