//! One instance per peer per document (§4.4). Constructs a `DocumentSync` over the
//! `Repository`'s observable document, wires its `send` callback to a byte-stream
//! socket, and drives an inbound read loop that feeds decoded messages back into
//! the state machine and on to the host command dispatcher.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use weave_repo::{Repository, RepositoryDocument};
use weave_sync::{DocumentSync, Transport};
use weave_types::prelude::*;

use crate::dispatcher::HostDispatcher;
use crate::socket::{PeerReceiver, PeerSender};

/// Adapts a [`PeerSender`] to `weave-sync`'s `Transport`: every outbound `Message`
/// is canonically JSON-encoded before being written to the socket (§6).
struct SocketTransport {
	sender: Arc<dyn PeerSender>,
}

#[async_trait]
impl Transport for SocketTransport {
	async fn send(&self, message: Message) -> WeaveResult<()> {
		let bytes = serde_json::to_vec(&message)?;
		self.sender.send(bytes).await
	}
}

pub struct Connection {
	peer_id: PeerId,
	document_id: DocumentId,
	document_sync: Arc<DocumentSync<RepositoryDocument, SocketTransport>>,
	read_loop: JoinHandle<()>,
}

impl Connection {
	/// Opens a `Connection` to `peer_id` for `document_id`: constructs the
	/// `DocumentSync`, sends the initial pull request, and spawns the inbound read
	/// loop. On socket close or error the read loop closes the `DocumentSync` and
	/// invokes `on_disconnect` (the `PEER_REMOVE` emission is the caller's, i.e. the
	/// `StoreManager`'s, responsibility).
	pub async fn open<S, R>(
		repository: Arc<Repository>,
		document_id: DocumentId,
		peer_id: PeerId,
		sender: S,
		mut receiver: R,
		dispatcher: Arc<dyn HostDispatcher>,
		on_disconnect: impl Fn(PeerId) + Send + Sync + 'static,
	) -> WeaveResult<Arc<Self>>
	where
		S: PeerSender,
		R: PeerReceiver,
	{
		let document = Arc::new(RepositoryDocument::new(repository, document_id.clone()));
		let sender: Arc<dyn PeerSender> = Arc::new(sender);
		let transport = SocketTransport { sender };
		let document_sync = DocumentSync::new(document, transport);
		document_sync.open().await?;

		let read_loop = {
			let document_sync = document_sync.clone();
			let document_id = document_id.clone();
			let peer_id = peer_id.clone();
			tokio::spawn(async move {
				loop {
					match receiver.recv().await {
						Ok(Some(bytes)) => {
							let message: Message = match serde_json::from_slice(&bytes) {
								Ok(message) => message,
								Err(err) => {
									warn!(peer = %peer_id, error = %err, "dropping malformed sync message");
									continue;
								}
							};
							match document_sync.receive(message).await {
								Ok(view) => {
									dispatcher.dispatch_peer_state(&document_id, &peer_id, &view).await;
								}
								Err(err) if err.is_protocol_violation() => {
									warn!(peer = %peer_id, error = %err, "protocol violation, closing connection");
									break;
								}
								Err(err) => {
									warn!(peer = %peer_id, error = %err, "failed to process inbound sync message");
								}
							}
						}
						Ok(None) => {
							debug!(peer = %peer_id, "peer socket closed");
							break;
						}
						Err(err) => {
							warn!(peer = %peer_id, error = %err, "transport error, closing connection");
							break;
						}
					}
				}
				document_sync.close().await;
				on_disconnect(peer_id);
			})
		};

		Ok(Arc::new(Self { peer_id, document_id, document_sync, read_loop }))
	}

	pub fn peer_id(&self) -> &PeerId {
		&self.peer_id
	}

	pub fn document_id(&self) -> &DocumentId {
		&self.document_id
	}

	/// Cancels the read loop and unsubscribes the `DocumentSync` from the document.
	/// No message is sent and no further message is guaranteed to be delivered
	/// after this returns (§5, cancellation and timeouts).
	pub async fn close(&self) {
		self.read_loop.abort();
		self.document_sync.close().await;
	}
}
