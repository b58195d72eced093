//! The handle `weave-sync`'s `DocumentSync` actually holds: read access plus the one
//! write path ("apply changes"), backed either directly by an
//! [`ObservableDocument`] (tests, or a bare in-memory setup) or, in production, by a
//! [`RepositoryDocument`] that routes writes back through the owning [`Repository`]
//! so every remotely-applied change is persisted and fans out to local handlers
//! exactly like a locally-applied one.

use std::sync::Arc;

use async_trait::async_trait;
use weave_types::prelude::*;

use crate::handler_registry::HandlerId;
use crate::observable_document::{DocumentView, ObservableDocument};
use crate::repository::Repository;

#[async_trait]
pub trait SyncDocument: Send + Sync {
	async fn get(&self) -> DocumentView;
	async fn missing_changes(&self, theirs: &VectorClock) -> Vec<Change>;
	async fn apply_changes(&self, changes: &[Change]) -> WeaveResult<()>;
	async fn register_handler(&self, handler: Arc<dyn Fn(&DocumentId) + Send + Sync>) -> WeaveResult<HandlerId>;
	async fn unregister_handler(&self, id: HandlerId);
}

#[async_trait]
impl SyncDocument for Arc<ObservableDocument> {
	async fn get(&self) -> DocumentView {
		ObservableDocument::get(self).await
	}

	async fn missing_changes(&self, theirs: &VectorClock) -> Vec<Change> {
		ObservableDocument::missing_changes(self, theirs).await
	}

	async fn apply_changes(&self, changes: &[Change]) -> WeaveResult<()> {
		ObservableDocument::apply_changes(self, changes).await?;
		Ok(())
	}

	async fn register_handler(&self, handler: Arc<dyn Fn(&DocumentId) + Send + Sync>) -> WeaveResult<HandlerId> {
		Ok(ObservableDocument::register_handler(self, move |id| handler(id)).await)
	}

	async fn unregister_handler(&self, id: HandlerId) {
		ObservableDocument::unregister_handler(self, id).await;
	}
}

/// The production handle: every call that mutates state goes through the
/// [`Repository`], so persistence and handler fan-out stay centralized there
/// regardless of whether the change originated locally or from a peer.
pub struct RepositoryDocument {
	repository: Arc<Repository>,
	document_id: DocumentId,
}

impl RepositoryDocument {
	pub fn new(repository: Arc<Repository>, document_id: DocumentId) -> Self {
		Self { repository, document_id }
	}
}

#[async_trait]
impl SyncDocument for RepositoryDocument {
	async fn get(&self) -> DocumentView {
		match self.repository.get_document(&self.document_id) {
			Some(doc) => doc.get().await,
			None => DocumentView { clock: VectorClock::new(), value: serde_json::Value::Null, local_actor: "unknown".into() },
		}
	}

	async fn missing_changes(&self, theirs: &VectorClock) -> Vec<Change> {
		match self.repository.get_document(&self.document_id) {
			Some(doc) => doc.missing_changes(theirs).await,
			None => Vec::new(),
		}
	}

	async fn apply_changes(&self, changes: &[Change]) -> WeaveResult<()> {
		self.repository.apply_changes(&self.document_id, changes).await
	}

	async fn register_handler(&self, handler: Arc<dyn Fn(&DocumentId) + Send + Sync>) -> WeaveResult<HandlerId> {
		self.repository.add_handler(&self.document_id, move |id| handler(id)).await
	}

	async fn unregister_handler(&self, id: HandlerId) {
		self.repository.remove_handler(&self.document_id, id).await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::storage::InMemoryStorageAdapter;

	#[tokio::test]
	async fn repository_document_round_trips_through_repository() {
		let repo = Arc::new(Repository::new("testdb", Arc::new(InMemoryStorageAdapter::new())));
		let doc_id: DocumentId = "doc-1".into();
		repo.init(doc_id.clone(), "A".into(), Some(serde_json::json!({})), true).await.unwrap();

		let handle = RepositoryDocument::new(repo.clone(), doc_id.clone());
		let view = handle.get().await;
		assert_eq!(view.value, serde_json::json!({}));
	}
}
