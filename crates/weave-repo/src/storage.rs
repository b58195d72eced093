//! Persistence contract for the Repository's write-ahead log, mirroring the
//! reference codebase's adapter-trait pattern (construction-time injected, async,
//! one trait per storage concern).

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use weave_types::prelude::*;

/// Per-database namespace containing: `documentId -> changeLog`, optional metadata,
/// and the set of known document ids (which MUST be enumerable per the external
/// interfaces contract).
#[async_trait]
pub trait StorageAdapter: Send + Sync {
	/// Append one change to `document_id`'s write-ahead log.
	async fn append_change(&self, document_id: &DocumentId, change: Change) -> WeaveResult<()>;

	/// Load the full change log for `document_id`, in insertion order.
	async fn load_changes(&self, document_id: &DocumentId) -> WeaveResult<Vec<Change>>;

	/// Arbitrary per-document metadata (e.g. keychain entries), as JSON.
	async fn get_meta(&self, document_id: &DocumentId) -> WeaveResult<Option<serde_json::Value>>;

	async fn set_meta(&self, document_id: &DocumentId, value: serde_json::Value) -> WeaveResult<()>;

	/// The set of known document ids, which MUST be enumerable per the storage
	/// contract in the external interfaces section.
	async fn list_documents(&self) -> WeaveResult<Vec<DocumentId>>;

	async fn delete_document(&self, document_id: &DocumentId) -> WeaveResult<()>;
}

/// Volatile, in-process storage used both for tests and as the Repository's
/// degraded "in-memory only" mode when the real adapter reports a `Persistence`
/// error (see the error-handling design's general policy).
#[derive(Default)]
pub struct InMemoryStorageAdapter {
	changes: RwLock<HashMap<DocumentId, Vec<Change>>>,
	meta: RwLock<HashMap<DocumentId, serde_json::Value>>,
}

impl InMemoryStorageAdapter {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl StorageAdapter for InMemoryStorageAdapter {
	async fn append_change(&self, document_id: &DocumentId, change: Change) -> WeaveResult<()> {
		self.changes.write().await.entry(document_id.clone()).or_default().push(change);
		Ok(())
	}

	async fn load_changes(&self, document_id: &DocumentId) -> WeaveResult<Vec<Change>> {
		Ok(self.changes.read().await.get(document_id).cloned().unwrap_or_default())
	}

	async fn get_meta(&self, document_id: &DocumentId) -> WeaveResult<Option<serde_json::Value>> {
		Ok(self.meta.read().await.get(document_id).cloned())
	}

	async fn set_meta(&self, document_id: &DocumentId, value: serde_json::Value) -> WeaveResult<()> {
		self.meta.write().await.insert(document_id.clone(), value);
		Ok(())
	}

	async fn list_documents(&self) -> WeaveResult<Vec<DocumentId>> {
		Ok(self.changes.read().await.keys().cloned().collect())
	}

	async fn delete_document(&self, document_id: &DocumentId) -> WeaveResult<()> {
		self.changes.write().await.remove(document_id);
		self.meta.write().await.remove(document_id);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn round_trips_changes_and_lists_documents() {
		let adapter = InMemoryStorageAdapter::new();
		let doc_id: DocumentId = "doc-1".into();
		adapter.append_change(&doc_id, Change::new(vec![1, 2, 3])).await.unwrap();
		adapter.append_change(&doc_id, Change::new(vec![4, 5])).await.unwrap();

		let loaded = adapter.load_changes(&doc_id).await.unwrap();
		assert_eq!(loaded, vec![Change::new(vec![1, 2, 3]), Change::new(vec![4, 5])]);
		assert_eq!(adapter.list_documents().await.unwrap(), vec![doc_id]);
	}
}
