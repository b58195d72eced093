//! `/introduction/:localId` (§4.6). Maintains, per in-flight connection, the set of
//! `(localId, docId)` interests; for each newly-declared interest, scans current
//! peers and introduces any whose interest set now intersects.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::Response;
use dashmap::DashMap;
use tokio::sync::{mpsc, RwLock};
use weave_types::prelude::*;

use crate::protocol::IntroductionMessage;

struct PeerInterests {
	docs: RwLock<HashSet<DocumentId>>,
	outbox: mpsc::Sender<IntroductionMessage>,
}

/// Stateless broker state: which documents each currently-connected peer has
/// declared interest in, and a channel to push `Introduction` messages to it.
#[derive(Default)]
pub struct IntroductionRegistry {
	peers: DashMap<PeerId, PeerInterests>,
}

impl IntroductionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	async fn register(&self, peer_id: PeerId) -> mpsc::Receiver<IntroductionMessage> {
		let (tx, rx) = mpsc::channel(64);
		self.peers.insert(peer_id, PeerInterests { docs: RwLock::new(HashSet::new()), outbox: tx });
		rx
	}

	async fn unregister(&self, peer_id: &PeerId) {
		self.peers.remove(peer_id);
	}

	/// Records `new_docs` as interests of `peer_id` and introduces it to every
	/// other currently-registered peer whose interests now intersect.
	async fn join(&self, peer_id: &PeerId, new_docs: Vec<DocumentId>) {
		let Some(entry) = self.peers.get(peer_id) else { return };

		let mut truly_new = Vec::new();
		{
			let mut docs = entry.docs.write().await;
			for doc in new_docs {
				if docs.insert(doc.clone()) {
					truly_new.push(doc);
				}
			}
		}
		if truly_new.is_empty() {
			return;
		}

		let self_docs: HashSet<DocumentId> = entry.docs.read().await.clone();
		for other in self.peers.iter() {
			let other_id = other.key();
			if other_id == peer_id {
				continue;
			}
			let other_docs = other.value().docs.read().await;
			let shared: Vec<DocumentId> = self_docs.intersection(&other_docs).cloned().collect();
			if shared.is_empty() {
				continue;
			}
			drop(other_docs);

			let to_self = IntroductionMessage::Introduction { id: other_id.clone(), keys: shared.clone() };
			let to_other = IntroductionMessage::Introduction { id: peer_id.clone(), keys: shared };
			if entry.outbox.send(to_self).await.is_err() {
				warn!(peer = %peer_id, "introduction outbox closed, peer may have disconnected mid-scan");
			}
			if other.value().outbox.send(to_other).await.is_err() {
				warn!(peer = %other_id, "introduction outbox closed, peer may have disconnected mid-scan");
			}
		}
	}
}

pub async fn introduction_handler(
	Path(local_id): Path<String>,
	State(registry): State<Arc<IntroductionRegistry>>,
	ws: WebSocketUpgrade,
) -> Response {
	ws.on_upgrade(move |socket| handle_introduction_socket(socket, local_id.into(), registry))
}

async fn handle_introduction_socket(socket: WebSocket, local_id: PeerId, registry: Arc<IntroductionRegistry>) {
	let (mut sink, mut stream) = futures::StreamExt::split(socket);
	let mut outbox = registry.register(local_id.clone()).await;

	let forward = async {
		while let Some(message) = outbox.recv().await {
			let Ok(json) = serde_json::to_string(&message) else { continue };
			if futures::SinkExt::send(&mut sink, Message::Text(json.into())).await.is_err() {
				break;
			}
		}
	};

	let receive = async {
		use futures::StreamExt;
		while let Some(frame) = stream.next().await {
			let frame = match frame {
				Ok(frame) => frame,
				Err(err) => {
					debug!(peer = %local_id, error = %err, "introduction socket error");
					break;
				}
			};
			let Message::Text(text) = frame else { continue };
			match serde_json::from_str::<IntroductionMessage>(&text) {
				Ok(IntroductionMessage::Join { join }) => registry.join(&local_id, join).await,
				Ok(IntroductionMessage::Introduction { .. }) => {
					debug!(peer = %local_id, "ignoring client-sent Introduction message");
				}
				Err(err) => warn!(peer = %local_id, error = %err, "malformed introduction message"),
			}
		}
	};

	tokio::select! {
		() = forward => {}
		() = receive => {}
	}
	registry.unregister(&local_id).await;
}
