//! `/connection/:A/:B/:documentId` (§4.6). A purely mechanical rendezvous: the first
//! of the two named peers to arrive waits (up to a timeout) for the second, then the
//! server pipes raw frames between them byte-for-byte. The server never inspects the
//! CRDT protocol running over the pipe.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::Response;
use dashmap::DashMap;
use tokio::sync::oneshot;
use weave_types::prelude::*;

/// How long the first peer to arrive waits for its counterpart before the server
/// gives up and closes the socket.
pub const DEFAULT_PAIRING_TIMEOUT: Duration = Duration::from_secs(60);

type PairKey = (PeerId, PeerId, DocumentId);

fn canonical_key(a: &PeerId, b: &PeerId, document_id: &DocumentId) -> PairKey {
	if a.as_str() <= b.as_str() {
		(a.clone(), b.clone(), document_id.clone())
	} else {
		(b.clone(), a.clone(), document_id.clone())
	}
}

enum Rendezvous {
	/// This socket was handed off to the peer that was already waiting; nothing
	/// further to do on this task.
	HandedOff,
	/// This task waited and now owns both sockets.
	Paired(WebSocket, WebSocket),
	TimedOut,
}

#[derive(Default)]
pub struct PairingRegistry {
	pending: DashMap<PairKey, oneshot::Sender<WebSocket>>,
}

impl PairingRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	async fn rendezvous(
		&self,
		a: PeerId,
		b: PeerId,
		document_id: DocumentId,
		socket: WebSocket,
		timeout: Duration,
	) -> Rendezvous {
		let key = canonical_key(&a, &b, &document_id);

		if let Some((_, tx)) = self.pending.remove(&key) {
			match tx.send(socket) {
				Ok(()) => return Rendezvous::HandedOff,
				Err(returned_socket) => {
					// The waiter gave up (timed out) between our remove() and send();
					// fall through and wait ourselves instead.
					return self.wait(key, returned_socket, timeout).await;
				}
			}
		}

		self.wait(key, socket, timeout).await
	}

	async fn wait(&self, key: PairKey, own_socket: WebSocket, timeout: Duration) -> Rendezvous {
		let (tx, rx) = oneshot::channel();
		self.pending.insert(key.clone(), tx);
		let outcome = match tokio::time::timeout(timeout, rx).await {
			Ok(Ok(counterpart)) => Rendezvous::Paired(own_socket, counterpart),
			Ok(Err(_)) | Err(_) => Rendezvous::TimedOut,
		};
		self.pending.remove(&key);
		outcome
	}
}

/// State the `/connection/:a/:b/:documentId` route is mounted with: the pairing
/// registry plus the timeout the embedding [`SignalServerConfig`](crate::SignalServerConfig)
/// was constructed with.
#[derive(Clone)]
pub struct ConnectState {
	pub registry: Arc<PairingRegistry>,
	pub timeout: Duration,
}

pub async fn connection_handler(
	Path((a, b, document_id)): Path<(String, String, String)>,
	State(state): State<Arc<ConnectState>>,
	ws: WebSocketUpgrade,
) -> Response {
	ws.on_upgrade(move |socket| {
		handle_connection_socket(socket, a.into(), b.into(), document_id.into(), state.registry.clone(), state.timeout)
	})
}

async fn handle_connection_socket(
	socket: WebSocket,
	a: PeerId,
	b: PeerId,
	document_id: DocumentId,
	registry: Arc<PairingRegistry>,
	timeout: Duration,
) {
	match registry.rendezvous(a, b, document_id, socket, timeout).await {
		Rendezvous::HandedOff => {}
		Rendezvous::Paired(mine, theirs) => pipe_bidirectional(mine, theirs).await,
		Rendezvous::TimedOut => debug!("pairing timed out, closing lone socket"),
	}
}

/// Copies frames 1:1 in both directions until either side closes or errors. Never
/// reorders, merges, or splits frames.
async fn pipe_bidirectional(left: WebSocket, right: WebSocket) {
	use futures::{SinkExt, StreamExt};

	let (mut left_sink, mut left_stream) = left.split();
	let (mut right_sink, mut right_stream) = right.split();

	let left_to_right = async {
		while let Some(Ok(frame)) = left_stream.next().await {
			let done = matches!(frame, Message::Close(_));
			if right_sink.send(frame).await.is_err() || done {
				break;
			}
		}
		let _ = right_sink.send(Message::Close(Some(CloseFrame { code: 1000, reason: "peer closed".into() }))).await;
	};
	let right_to_left = async {
		while let Some(Ok(frame)) = right_stream.next().await {
			let done = matches!(frame, Message::Close(_));
			if left_sink.send(frame).await.is_err() || done {
				break;
			}
		}
		let _ = left_sink.send(Message::Close(Some(CloseFrame { code: 1000, reason: "peer closed".into() }))).await;
	};

	tokio::select! {
		() = left_to_right => {}
		() = right_to_left => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn canonical_key_is_order_independent() {
		let a: PeerId = "A".into();
		let b: PeerId = "B".into();
		let doc: DocumentId = "doc-1".into();
		assert_eq!(canonical_key(&a, &b, &doc), canonical_key(&b, &a, &doc));
	}

	#[test]
	fn canonical_key_distinguishes_documents() {
		let a: PeerId = "A".into();
		let b: PeerId = "B".into();
		assert_ne!(canonical_key(&a, &b, &"doc-1".into()), canonical_key(&a, &b, &"doc-2".into()));
	}
}
