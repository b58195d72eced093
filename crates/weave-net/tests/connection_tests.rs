//! In-process duplex-channel harness for `Connection` (§10.5): stands in for a real
//! socket so the scenarios of §8 can be exercised without a network. Each test
//! wires two `Repository`s together through a pair of `tokio::sync::mpsc` channels
//! wrapped as `PeerSender`/`PeerReceiver`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use weave_crdt::Any;
use weave_net::{Connection, NullDispatcher, PeerReceiver, PeerSender};
use weave_repo::{InMemoryStorageAdapter, Repository};
use weave_types::prelude::*;

struct ChannelSender(mpsc::Sender<Vec<u8>>);

#[async_trait]
impl PeerSender for ChannelSender {
	async fn send(&self, bytes: Vec<u8>) -> WeaveResult<()> {
		self.0.send(bytes).await.map_err(|_| Error::Transport("peer channel closed".into()))
	}
}

struct ChannelReceiver(mpsc::Receiver<Vec<u8>>);

#[async_trait]
impl PeerReceiver for ChannelReceiver {
	async fn recv(&mut self) -> WeaveResult<Option<Vec<u8>>> {
		Ok(self.0.recv().await)
	}
}

/// A pair of channel-backed sockets wired to each other, as if a signal server had
/// just piped two peers' connections together.
fn channel_pair() -> ((ChannelSender, ChannelReceiver), (ChannelSender, ChannelReceiver)) {
	let (tx_a, rx_a) = mpsc::channel(64);
	let (tx_b, rx_b) = mpsc::channel(64);
	((ChannelSender(tx_a), ChannelReceiver(rx_b)), (ChannelSender(tx_b), ChannelReceiver(rx_a)))
}

/// Polls `check` until it reports convergence or the timeout elapses. Sync
/// propagation happens across spawned tasks (the change-observation hook runs in
/// its own `tokio::spawn`), so tests can't assert immediately after a mutation.
async fn wait_for<F, Fut>(mut check: F)
where
	F: FnMut() -> Fut,
	Fut: std::future::Future<Output = bool>,
{
	for _ in 0..200 {
		if check().await {
			return;
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
	panic!("condition was not met within the test timeout");
}

fn in_memory_repo(database_name: &str) -> Arc<Repository> {
	Arc::new(Repository::new(database_name, Arc::new(InMemoryStorageAdapter::new())))
}

/// S1: two peers, one edit. A creates the document with `x=1`; B joins empty and
/// connects. Expect B's document to end up holding `x=1`.
#[tokio::test]
async fn two_peers_converge_after_one_edit() {
	let repo_a = in_memory_repo("db-a");
	let repo_b = in_memory_repo("db-b");
	let doc_id: DocumentId = "doc-1".into();

	repo_a.init(doc_id.clone(), "A".into(), Some(serde_json::json!({"x": 1})), true).await.unwrap();
	repo_b.init(doc_id.clone(), "B".into(), None, false).await.unwrap();

	let ((sender_a, receiver_a), (sender_b, receiver_b)) = channel_pair();

	let conn_a = Connection::open(
		repo_a.clone(),
		doc_id.clone(),
		"peer-b".into(),
		sender_a,
		receiver_a,
		Arc::new(NullDispatcher),
		|_peer_id| {},
	)
	.await
	.unwrap();
	let conn_b = Connection::open(
		repo_b.clone(),
		doc_id.clone(),
		"peer-a".into(),
		sender_b,
		receiver_b,
		Arc::new(NullDispatcher),
		|_peer_id| {},
	)
	.await
	.unwrap();

	wait_for(|| {
		let repo_b = repo_b.clone();
		let doc_id = doc_id.clone();
		async move { repo_b.get_document(&doc_id).unwrap().get().await.value == serde_json::json!({"x": 1.0}) }
	})
	.await;

	conn_a.close().await;
	conn_b.close().await;
}

/// S2: concurrent edits converge. A sets `x=1` and B sets `y=2` independently
/// before the connection is established; once connected, both sides converge to
/// `{x:1, y:2}` with matching clocks.
#[tokio::test]
async fn concurrent_edits_converge_once_connected() {
	let repo_a = in_memory_repo("db-a");
	let repo_b = in_memory_repo("db-b");
	let doc_id: DocumentId = "doc-1".into();

	repo_a.init(doc_id.clone(), "A".into(), Some(serde_json::json!({})), true).await.unwrap();
	repo_b.init(doc_id.clone(), "B".into(), Some(serde_json::json!({})), true).await.unwrap();

	repo_a.mutate_document(&doc_id, |root, txn| root.insert(txn, "x".to_string(), Any::Number(1.0))).await.unwrap();
	repo_b.mutate_document(&doc_id, |root, txn| root.insert(txn, "y".to_string(), Any::Number(2.0))).await.unwrap();

	let ((sender_a, receiver_a), (sender_b, receiver_b)) = channel_pair();

	let conn_a = Connection::open(
		repo_a.clone(),
		doc_id.clone(),
		"peer-b".into(),
		sender_a,
		receiver_a,
		Arc::new(NullDispatcher),
		|_peer_id| {},
	)
	.await
	.unwrap();
	let conn_b = Connection::open(
		repo_b.clone(),
		doc_id.clone(),
		"peer-a".into(),
		sender_b,
		receiver_b,
		Arc::new(NullDispatcher),
		|_peer_id| {},
	)
	.await
	.unwrap();

	let expected = serde_json::json!({"x": 1.0, "y": 2.0});
	wait_for(|| {
		let repo_a = repo_a.clone();
		let doc_id = doc_id.clone();
		let expected = expected.clone();
		async move { repo_a.get_document(&doc_id).unwrap().get().await.value == expected }
	})
	.await;
	wait_for(|| {
		let repo_b = repo_b.clone();
		let doc_id = doc_id.clone();
		let expected = expected.clone();
		async move { repo_b.get_document(&doc_id).unwrap().get().await.value == expected }
	})
	.await;

	let clock_a = repo_a.get_document(&doc_id).unwrap().get().await.clock;
	let clock_b = repo_b.get_document(&doc_id).unwrap().get().await.clock;
	assert!(clock_a.equivalent(&clock_b));
	assert_eq!(clock_a.get("A"), 1);
	assert_eq!(clock_a.get("B"), 1);

	conn_a.close().await;
	conn_b.close().await;
}

/// §4.4 item 3 / §7 `TransportError`: a clean socket close runs the `Connection`'s
/// disconnect path, invoking the caller-supplied callback exactly once.
#[tokio::test]
async fn socket_close_invokes_disconnect_callback() {
	let repo = in_memory_repo("db");
	let doc_id: DocumentId = "doc-1".into();
	repo.init(doc_id.clone(), "A".into(), Some(serde_json::json!({})), true).await.unwrap();

	let (outbound_tx, _outbound_rx) = mpsc::channel::<Vec<u8>>(64);
	let (inbound_tx, inbound_rx) = mpsc::channel::<Vec<u8>>(64);

	let disconnected = Arc::new(AtomicBool::new(false));
	let disconnected_clone = disconnected.clone();

	let _conn = Connection::open(
		repo,
		doc_id,
		"peer-x".into(),
		ChannelSender(outbound_tx),
		ChannelReceiver(inbound_rx),
		Arc::new(NullDispatcher),
		move |_peer_id| {
			disconnected_clone.store(true, Ordering::SeqCst);
		},
	)
	.await
	.unwrap();

	drop(inbound_tx);

	wait_for(|| {
		let disconnected = disconnected.clone();
		async move { disconnected.load(Ordering::SeqCst) }
	})
	.await;
}
