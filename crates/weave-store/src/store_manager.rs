//! Top-level façade for one database (§4.5): multiplexes peer discovery, connection
//! lifecycle, and the host application's command/event integration. One
//! `StoreManager` per database, created once and closed once.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;
use weave_net::{Connection, HostDispatcher};
use weave_repo::{DocumentView, Repository};
use weave_types::prelude::*;

use crate::config::StoreManagerConfig;
use crate::events::{Event, EventBus, HandlerId};
use crate::keychain::Keychain;
use crate::reducer::{Reducer, ReducerOutcome};
use crate::signal_client::{backoff_delay, SignalClient};

const RECONNECT_MIN: std::time::Duration = std::time::Duration::from_secs(1);
const RECONNECT_MAX: std::time::Duration = std::time::Duration::from_secs(30);

/// Forwards `Connection`'s per-message dispatch into the `StoreManager`'s event bus
/// as a `CHANGE` event, matching §4.4's "dispatches a synthetic apply-peer-state
/// command to the host dispatcher".
struct EventDispatcher {
	events: Arc<EventBus>,
}

#[async_trait]
impl HostDispatcher for EventDispatcher {
	async fn dispatch_peer_state(&self, document_id: &DocumentId, _peer_id: &PeerId, _view: &DocumentView) {
		self.events.emit(Event::Change { document_id: document_id.clone() });
	}
}

/// Top-level façade: owns one `Repository`, the `Connection`s fanning out from it,
/// and the signaling client that discovers new peers for it.
pub struct StoreManager {
	repository: Arc<Repository>,
	keychain: Arc<Keychain>,
	events: Arc<EventBus>,
	reducer: Arc<dyn Reducer>,
	local_id: PeerId,
	signal_urls: Vec<String>,
	connections: DashMap<(DocumentId, PeerId), Arc<Connection>>,
	signal_tasks: Mutex<HashMap<DocumentId, JoinHandle<()>>>,
	dispatcher: Arc<dyn HostDispatcher>,
}

impl StoreManager {
	pub fn new(config: StoreManagerConfig, reducer: Arc<dyn Reducer>) -> Arc<Self> {
		let events = Arc::new(EventBus::new(config.event_listener_cap));
		let repository = Arc::new(Repository::new(config.database_name, config.storage.clone()));
		Arc::new(Self {
			repository,
			keychain: Arc::new(Keychain::new(config.storage)),
			dispatcher: Arc::new(EventDispatcher { events: events.clone() }),
			events,
			reducer,
			local_id: Uuid::new_v4().to_string().into(),
			signal_urls: config.signal_urls,
			connections: DashMap::new(),
			signal_tasks: Mutex::new(HashMap::new()),
		})
	}

	/// `createStore(documentId)`: initializes the Repository in "new" mode and
	/// begins advertising interest to the signal server.
	pub async fn create_store(self: &Arc<Self>, document_id: DocumentId, initial_state: serde_json::Value) -> WeaveResult<DocumentView> {
		self.open_store(document_id, Some(initial_state), true).await
	}

	/// `joinStore(documentId)`: initializes the Repository in "join" mode (empty
	/// until peers sync) and begins advertising interest to the signal server.
	pub async fn join_store(self: &Arc<Self>, document_id: DocumentId) -> WeaveResult<DocumentView> {
		self.open_store(document_id, None, false).await
	}

	async fn open_store(
		self: &Arc<Self>,
		document_id: DocumentId,
		initial_state: Option<serde_json::Value>,
		is_creating: bool,
	) -> WeaveResult<DocumentView> {
		let key_pair = self.keychain.get_or_create(&document_id).await?;
		let actor: ActorId = key_pair.public_key.as_str().into();
		let view = self.repository.init(document_id.clone(), actor, initial_state, is_creating).await?;

		self.events.emit(Event::Open { document_id: document_id.clone() });

		let task = self.spawn_signal_task(document_id);
		self.signal_tasks.lock().await.insert(task.0, task.1);

		Ok(view)
	}

	/// Spawns the background task that stays joined to a signal server, adopting
	/// peers as they are introduced. Recovers from a lost signaling connection by
	/// reconnecting with exponential backoff (`SignalError`, §7: "does not close
	/// existing peer Connections").
	fn spawn_signal_task(self: &Arc<Self>, document_id: DocumentId) -> (DocumentId, JoinHandle<()>) {
		let this = self.clone();
		let doc_id_for_task = document_id.clone();
		let handle = tokio::spawn(async move {
			let mut attempt = 0u32;
			loop {
				match this.run_signal_session(&doc_id_for_task).await {
					Ok(()) => break,
					Err(err) => {
						warn!(document_id = %doc_id_for_task, error = %err, "signal session ended, reconnecting");
						tokio::time::sleep(backoff_delay(attempt, RECONNECT_MIN, RECONNECT_MAX)).await;
						attempt = attempt.saturating_add(1);
					}
				}
			}
		});
		(document_id, handle)
	}

	/// Joins one signal server, advertises interest, and adopts peers until the
	/// signaling connection drops.
	async fn run_signal_session(self: &Arc<Self>, document_id: &DocumentId) -> WeaveResult<()> {
		let url = self.signal_urls.first().ok_or_else(|| Error::Signal("no signal server URLs configured".into()))?;
		let mut client = SignalClient::connect(url, self.local_id.clone()).await?;
		client.join(vec![document_id.clone()]).await?;

		loop {
			let Some((remote_id, _keys)) = client.next_introduction().await? else { return Ok(()) };
			let (sender, receiver) = client.open_peer_socket(&remote_id, document_id).await?;
			self.adopt_peer(document_id.clone(), remote_id, sender, receiver).await?;
		}
	}

	/// Peer adoption (§4.5): constructs a `Connection` for the newly-introduced peer
	/// and records it under `(documentId, peerId)`. A duplicate replaces the prior
	/// Connection, closing the old one first.
	async fn adopt_peer(
		self: &Arc<Self>,
		document_id: DocumentId,
		peer_id: PeerId,
		sender: weave_net::WsPeerSender,
		receiver: weave_net::WsPeerReceiver,
	) -> WeaveResult<()> {
		if let Some((_, old)) = self.connections.remove(&(document_id.clone(), peer_id.clone())) {
			old.close().await;
		}

		let this = self.clone();
		let doc_for_callback = document_id.clone();
		let peer_for_callback = peer_id.clone();
		let connection = Connection::open(
			self.repository.clone(),
			document_id.clone(),
			peer_id.clone(),
			sender,
			receiver,
			self.dispatcher.clone(),
			move |peer_id| {
				this.connections.remove(&(doc_for_callback.clone(), peer_id.clone()));
				this.events.emit(Event::PeerRemove { document_id: doc_for_callback.clone(), peer_id });
			},
		)
		.await?;

		self.connections.insert((document_id.clone(), peer_id.clone()), connection);
		self.events.emit(Event::Peer { document_id, peer_id: peer_for_callback });
		Ok(())
	}

	/// Runs a host command through the configured reducer and, if handled, applies
	/// the resulting mutation to the document.
	pub async fn dispatch(&self, document_id: &DocumentId, command: &serde_json::Value) -> WeaveResult<()> {
		match self.reducer.reduce(command) {
			ReducerOutcome::NotHandled => Ok(()),
			ReducerOutcome::Handled(change_fn) => {
				self.repository.mutate_document(document_id, move |root, txn| change_fn(root, txn)).await?;
				self.events.emit(Event::Change { document_id: document_id.clone() });
				Ok(())
			}
		}
	}

	pub fn connection_count(&self) -> usize {
		self.connections.len()
	}

	pub async fn known_document_ids(&self) -> Vec<DocumentId> {
		self.keychain.known_document_ids().await
	}

	pub fn on(&self, handler: impl Fn(&Event) + Send + Sync + 'static) -> WeaveResult<HandlerId> {
		self.events.on(handler)
	}

	pub fn off(&self, id: HandlerId) {
		self.events.off(id);
	}

	/// `close()`: closes every Connection, cancels every signaling task, and emits
	/// `CLOSE`. No message is required to be delivered after this returns.
	pub async fn close(&self) {
		for task in self.signal_tasks.lock().await.drain() {
			task.1.abort();
		}
		let keys: Vec<_> = self.connections.iter().map(|entry| entry.key().clone()).collect();
		for key in keys {
			if let Some((_, connection)) = self.connections.remove(&key) {
				connection.close().await;
			}
		}
		self.events.emit(Event::Close);
	}
}
