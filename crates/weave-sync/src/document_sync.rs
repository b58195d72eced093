//! Per-peer, per-document sync state machine: the half of the protocol that decides
//! what to send and what to ask for, driven entirely by vector-clock comparisons.
//! Transport-agnostic: constructed over anything implementing [`Transport`] and any
//! document handle implementing `weave-repo`'s `SyncDocument`.

use std::sync::{Arc, Weak};

use tokio::sync::{Mutex, RwLock};
use weave_repo::{DocumentView, HandlerId, SyncDocument};
use weave_types::prelude::*;

use crate::transport::Transport;

/// `opened → syncing ↔ idle → closed`. `syncing` is transient — every call below
/// returns to `idle` once it has sent what it needs to; there is no background loop.
pub struct DocumentSync<D, T> {
	document: Arc<D>,
	transport: T,
	/// What we have last advertised to this peer.
	ours: RwLock<VectorClock>,
	/// What we last learned this peer holds. `None` until `open()` completes the
	/// first round-trip.
	theirs: RwLock<Option<VectorClock>>,
	handler_id: Mutex<Option<HandlerId>>,
}

impl<D, T> DocumentSync<D, T>
where
	D: SyncDocument + 'static,
	T: Transport,
{
	pub fn new(document: Arc<D>, transport: T) -> Arc<Self> {
		Arc::new(Self {
			document,
			transport,
			ours: RwLock::new(VectorClock::new()),
			theirs: RwLock::new(None),
			handler_id: Mutex::new(None),
		})
	}

	/// Validate the current clock, send an initial pull request, and subscribe to
	/// the document's change-observation hook so every subsequent local or applied
	/// change re-drives the state machine.
	pub async fn open(self: &Arc<Self>) -> WeaveResult<()> {
		let view = self.document.get().await;
		self.validate(&view.clock).await?;
		self.transport.send(Message::pull(view.clock.clone())).await?;
		self.advance_ours(&view.clock).await;

		let weak: Weak<Self> = Arc::downgrade(self);
		let id = self
			.document
			.register_handler(Arc::new(move |_document_id: &DocumentId| {
				let Some(strong) = weak.upgrade() else { return };
				tokio::spawn(async move {
					if let Err(err) = strong.doc_changed().await {
						warn!(error = %err, "docChanged failed, peer sync for this document may be stalled");
					}
				});
			}))
			.await?;
		*self.handler_id.lock().await = Some(id);
		Ok(())
	}

	/// Unsubscribe from the document. No message is sent.
	pub async fn close(&self) {
		if let Some(id) = self.handler_id.lock().await.take() {
			self.document.unregister_handler(id).await;
		}
	}

	/// `receive({clock, changes?}) -> Document`.
	pub async fn receive(&self, message: Message) -> WeaveResult<DocumentView> {
		{
			let mut theirs = self.theirs.write().await;
			*theirs = Some(match theirs.take() {
				Some(known) => known.merge(&message.clock),
				None => message.clock.clone(),
			});
		}

		match message.changes {
			Some(changes) => {
				self.document.apply_changes(&changes).await?;
			}
			None => {
				self.maybe_send_changes().await?;
			}
		}

		Ok(self.document.get().await)
	}

	/// Invoked (indirectly, via the registered change handler) after any local or
	/// applied-remote change.
	async fn doc_changed(&self) -> WeaveResult<()> {
		let view = self.document.get().await;
		self.validate(&view.clock).await?;
		self.maybe_send_changes().await?;
		self.maybe_request_changes(&view.clock).await?;
		self.advance_ours(&view.clock).await;
		Ok(())
	}

	/// If we know what the peer holds, send anything local they lack.
	async fn maybe_send_changes(&self) -> WeaveResult<()> {
		let theirs = self.theirs.read().await.clone();
		let Some(theirs) = theirs else { return Ok(()) };

		let missing = self.document.missing_changes(&theirs).await;
		if missing.is_empty() {
			return Ok(());
		}
		let local_clock = self.document.get().await.clock;
		self.transport.send(Message::push(local_clock.clone(), missing)).await?;
		self.advance_ours(&local_clock).await;
		Ok(())
	}

	/// After applying received changes, our clock may have advanced past what we
	/// last told the peer. If so, invite them to send anything we are still
	/// missing by emitting a bare-clock pull; otherwise stay silent.
	async fn maybe_request_changes(&self, c: &VectorClock) -> WeaveResult<()> {
		let ours = self.ours.read().await.clone();
		if !c.less_or_equal(&ours) {
			self.transport.send(Message::pull(c.clone())).await?;
		}
		Ok(())
	}

	/// `c` must dominate `ours`, or the document has regressed to an older state
	/// (`OldClockError`). A clock is always present in this implementation's data
	/// model, so the spec's companion `NoClockError` case cannot occur here.
	async fn validate(&self, c: &VectorClock) -> WeaveResult<()> {
		let ours = self.ours.read().await;
		if !ours.less_or_equal(c) {
			return Err(Error::OldClock);
		}
		Ok(())
	}

	async fn advance_ours(&self, c: &VectorClock) {
		let mut ours = self.ours.write().await;
		*ours = ours.merge(c);
	}
}
