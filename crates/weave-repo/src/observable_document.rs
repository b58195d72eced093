//! The "observable document wrapper" of the design notes: the minimal interface the
//! sync layer depends on, so it never sees the underlying CRDT library's types.

use std::sync::Arc;

use tokio::sync::RwLock;
use weave_crdt::{CrdtDocument, MapRef, TransactionMut};
use weave_types::prelude::*;

use crate::handler_registry::{HandlerId, HandlerRegistry};

/// Read-only facet of a document: what `DocumentSync.docChanged` and
/// `maybeSendChanges` need to know without touching the CRDT library directly.
#[derive(Debug, Clone)]
pub struct DocumentView {
	pub clock: VectorClock,
	pub value: serde_json::Value,
	pub local_actor: ActorId,
}

pub struct ObservableDocument {
	document_id: DocumentId,
	inner: RwLock<CrdtDocument>,
	handlers: HandlerRegistry<DocumentId>,
}

impl ObservableDocument {
	pub(crate) fn new(document_id: DocumentId, doc: CrdtDocument) -> Self {
		Self { document_id, inner: RwLock::new(doc), handlers: HandlerRegistry::new() }
	}

	pub fn document_id(&self) -> &DocumentId {
		&self.document_id
	}

	/// `get()`: the document's current read-only facet.
	pub async fn get(&self) -> DocumentView {
		let doc = self.inner.read().await;
		DocumentView { clock: doc.clock(), value: doc.snapshot(), local_actor: doc.local_actor().clone() }
	}

	/// All locally-known changes not yet reflected in `theirs` — what the CRDT
	/// library calls `missingChanges(localState, theirs)`.
	pub async fn missing_changes(&self, theirs: &VectorClock) -> Vec<Change> {
		self.inner.read().await.missing_changes(theirs)
	}

	pub async fn change_log(&self) -> Vec<Change> {
		self.inner.read().await.change_log()
	}

	/// `applyChanges(changes)`: the only mutation path `DocumentSync`/`Connection` are
	/// allowed to use. Returns the subset of `changes` that were newly applied (empty
	/// if every entry was already known), so the caller can decide whether to persist
	/// and notify.
	pub async fn apply_changes(&self, changes: &[Change]) -> WeaveResult<Vec<Change>> {
		self.inner.write().await.apply_changes(changes)
	}

	/// `registerHandler(fn)`.
	pub async fn register_handler(&self, handler: impl Fn(&DocumentId) + Send + Sync + 'static) -> HandlerId {
		self.handlers.register(handler).await
	}

	/// `unregisterHandler(fn)` (by the id returned from `register_handler`).
	pub async fn unregister_handler(&self, id: HandlerId) {
		self.handlers.unregister(id).await
	}

	/// Fires the change-observation hook: invoked by the Repository after every
	/// `applyChanges` completes (local or remote), before the next message is
	/// processed, per the ordering guarantees.
	pub(crate) async fn notify(&self) {
		self.handlers.notify(&self.document_id).await;
	}

	/// Not part of the minimal observable interface: only the Repository (which
	/// already owns `weave-crdt` as a direct dependency) performs local, host-driven
	/// mutations through this. `DocumentSync` and `Connection` never call it.
	pub(crate) async fn mutate_local(&self, f: impl FnOnce(&MapRef, &mut TransactionMut) + Send) -> Change {
		self.inner.write().await.mutate(f)
	}
}
