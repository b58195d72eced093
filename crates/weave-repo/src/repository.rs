//! Owns the local CRDT document(s) and a write-ahead log of all changes ever
//! applied, keyed per `documentId`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use weave_crdt::{CrdtDocument, MapRef, TransactionMut};
use weave_types::prelude::*;

use crate::handler_registry::HandlerId;
use crate::observable_document::{DocumentView, ObservableDocument};
use crate::storage::StorageAdapter;

pub struct Repository {
	database_name: String,
	storage: Arc<dyn StorageAdapter>,
	documents: DashMap<DocumentId, Arc<ObservableDocument>>,
	/// Set once the storage adapter has reported a `Persistence` error. While set,
	/// the Repository keeps serving and syncing documents from memory but no longer
	/// attempts to write through to storage (general policy: persistence failures
	/// degrade, they do not terminate).
	degraded: AtomicBool,
}

impl Repository {
	pub fn new(database_name: impl Into<String>, storage: Arc<dyn StorageAdapter>) -> Self {
		Self {
			database_name: database_name.into(),
			storage,
			documents: DashMap::new(),
			degraded: AtomicBool::new(false),
		}
	}

	pub fn database_name(&self) -> &str {
		&self.database_name
	}

	pub fn is_degraded(&self) -> bool {
		self.degraded.load(Ordering::Relaxed)
	}

	/// `init(initialState, isCreating) -> documentState`. If `is_creating`, constructs
	/// a fresh document from `initial_state`; otherwise attempts local recovery by
	/// replaying the persisted change log, falling back to a fresh empty document
	/// awaiting peer sync if none is found or storage is unavailable.
	pub async fn init(
		&self,
		document_id: DocumentId,
		local_actor: ActorId,
		initial_state: Option<serde_json::Value>,
		is_creating: bool,
	) -> WeaveResult<DocumentView> {
		let doc = if is_creating {
			let state = initial_state.unwrap_or_else(|| serde_json::json!({}));
			let doc = CrdtDocument::with_initial_state(local_actor, &state)?;
			for change in doc.change_log() {
				self.persist(&document_id, change).await;
			}
			doc
		} else {
			match self.storage.load_changes(&document_id).await {
				Ok(changes) if !changes.is_empty() => {
					let mut doc = CrdtDocument::new_empty(local_actor);
					doc.apply_changes(&changes)?;
					doc
				}
				Ok(_) => CrdtDocument::new_empty(local_actor),
				Err(err) => {
					warn!(document_id = %document_id, error = %err, "recovery failed, starting empty and entering degraded mode");
					self.degraded.store(true, Ordering::Relaxed);
					CrdtDocument::new_empty(local_actor)
				}
			}
		};

		let view = DocumentView { clock: doc.clock(), value: doc.snapshot(), local_actor: doc.local_actor().clone() };
		self.documents.insert(document_id.clone(), Arc::new(ObservableDocument::new(document_id, doc)));
		Ok(view)
	}

	/// `getDocument() -> Document`, scoped to one `documentId`.
	pub fn get_document(&self, document_id: &DocumentId) -> Option<Arc<ObservableDocument>> {
		self.documents.get(document_id).map(|entry| entry.clone())
	}

	/// `applyChanges(changes)`: delegate to the CRDT library, persist, notify all
	/// registered handlers for that document.
	pub async fn apply_changes(&self, document_id: &DocumentId, changes: &[Change]) -> WeaveResult<()> {
		let doc = self.get_document(document_id).ok_or(Error::NotFound)?;
		let applied = doc.apply_changes(changes).await?;
		if applied.is_empty() {
			return Ok(());
		}
		for change in applied {
			self.persist(document_id, change).await;
		}
		doc.notify().await;
		Ok(())
	}

	/// Local, host-driven mutation: applies `f` to the document's root map in one
	/// CRDT transaction, persists the resulting change, and notifies handlers.
	pub async fn mutate_document(
		&self,
		document_id: &DocumentId,
		f: impl FnOnce(&MapRef, &mut TransactionMut) + Send,
	) -> WeaveResult<Change> {
		let doc = self.get_document(document_id).ok_or(Error::NotFound)?;
		let change = doc.mutate_local(f).await;
		self.persist(document_id, change.clone()).await;
		doc.notify().await;
		Ok(change)
	}

	/// `addHandler(fn)`: register a callback invoked after every mutation (local or
	/// remote) on `document_id`.
	pub async fn add_handler(
		&self,
		document_id: &DocumentId,
		handler: impl Fn(&DocumentId) + Send + Sync + 'static,
	) -> WeaveResult<HandlerId> {
		let doc = self.get_document(document_id).ok_or(Error::NotFound)?;
		Ok(doc.register_handler(handler).await)
	}

	pub async fn remove_handler(&self, document_id: &DocumentId, id: HandlerId) {
		if let Some(doc) = self.get_document(document_id) {
			doc.unregister_handler(id).await;
		}
	}

	/// The set of known document ids, delegated to storage so it stays accurate even
	/// for documents not currently loaded in memory.
	pub async fn known_document_ids(&self) -> WeaveResult<Vec<DocumentId>> {
		self.storage.list_documents().await
	}

	pub async fn close_document(&self, document_id: &DocumentId) {
		self.documents.remove(document_id);
	}

	async fn persist(&self, document_id: &DocumentId, change: Change) {
		if let Err(err) = self.storage.append_change(document_id, change).await {
			warn!(document_id = %document_id, error = %err, "failed to persist change, entering degraded mode");
			self.degraded.store(true, Ordering::Relaxed);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::storage::InMemoryStorageAdapter;
	use weave_crdt::Any;

	fn repo() -> Repository {
		Repository::new("testdb", Arc::new(InMemoryStorageAdapter::new()))
	}

	#[tokio::test]
	async fn init_creating_seeds_initial_state() {
		let repo = repo();
		let doc_id: DocumentId = "doc-1".into();
		let view = repo
			.init(doc_id.clone(), "A".into(), Some(serde_json::json!({"x": 1})), true)
			.await
			.unwrap();
		assert_eq!(view.value, serde_json::json!({"x": 1.0}));
		assert_eq!(view.clock.get("A"), 1);
	}

	#[tokio::test]
	async fn apply_changes_persists_and_notifies_handlers() {
		use std::sync::atomic::{AtomicUsize, Ordering as O};

		let repo = repo();
		let a_doc: DocumentId = "doc-1".into();
		repo.init(a_doc.clone(), "A".into(), Some(serde_json::json!({})), true).await.unwrap();

		let notified = Arc::new(AtomicUsize::new(0));
		let notified_clone = notified.clone();
		repo.add_handler(&a_doc, move |_| { notified_clone.fetch_add(1, O::Relaxed); }).await.unwrap();

		let change = repo
			.mutate_document(&a_doc, |root, txn| root.insert(txn, "x".to_string(), Any::Number(1.0)))
			.await
			.unwrap();

		assert_eq!(notified.load(O::Relaxed), 1);

		// A second replica applying that change converges and is notified too.
		let repo2 = repo();
		repo2.init("doc-1".into(), "B".into(), None, false).await.unwrap();
		let notified2 = Arc::new(AtomicUsize::new(0));
		let notified2_clone = notified2.clone();
		repo2.add_handler(&a_doc, move |_| { notified2_clone.fetch_add(1, O::Relaxed); }).await.unwrap();
		repo2.apply_changes(&a_doc, &[change]).await.unwrap();
		assert_eq!(notified2.load(O::Relaxed), 1);

		let doc = repo2.get_document(&a_doc).unwrap();
		assert_eq!(doc.get().await.value, serde_json::json!({"x": 1.0}));
	}

	#[tokio::test]
	async fn init_joining_with_no_persisted_state_starts_empty() {
		let repo = repo();
		let view = repo.init("doc-2".into(), "B".into(), None, false).await.unwrap();
		assert_eq!(view.value, serde_json::json!({}));
		assert!(view.clock.is_empty());
	}
}
