//! Per-database `documentId → {publicKey, secretKey}` mapping (§3, "Keychain"):
//! used to derive storage namespaces and the discovery identifier a document
//! advertises to the signal server. Persisted through the same `StorageAdapter`
//! meta namespace the `Repository` uses for everything else.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;
use weave_repo::StorageAdapter;
use weave_types::prelude::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyPair {
	pub public_key: String,
	pub secret_key: String,
}

impl KeyPair {
	/// Generates opaque, non-cryptographic key material (§1 Non-goals excludes
	/// cryptographic peer authentication; these values only need to be unguessable
	/// enough to namespace storage and signal-server discovery).
	fn generate() -> Self {
		Self { public_key: Uuid::new_v4().to_string(), secret_key: Uuid::new_v4().to_string() }
	}
}

pub struct Keychain {
	storage: Arc<dyn StorageAdapter>,
	entries: RwLock<HashMap<DocumentId, KeyPair>>,
}

impl Keychain {
	pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
		Self { storage, entries: RwLock::new(HashMap::new()) }
	}

	/// Returns the existing key pair for `document_id`, or generates and persists a
	/// new one. Checks the in-process cache first, then storage, before generating.
	/// Uses the `Repository`'s per-document metadata slot (unused by the change-log
	/// itself), keyed naturally by `document_id`.
	pub async fn get_or_create(&self, document_id: &DocumentId) -> WeaveResult<KeyPair> {
		if let Some(existing) = self.entries.read().await.get(document_id) {
			return Ok(existing.clone());
		}

		if let Some(value) = self.storage.get_meta(document_id).await? {
			let key_pair: KeyPair = serde_json::from_value(value)?;
			self.entries.write().await.insert(document_id.clone(), key_pair.clone());
			return Ok(key_pair);
		}

		let key_pair = KeyPair::generate();
		self.storage.set_meta(document_id, serde_json::to_value(&key_pair)?).await?;
		self.entries.write().await.insert(document_id.clone(), key_pair.clone());
		Ok(key_pair)
	}

	/// `knownDocumentIds` as seen by the Keychain: every document this process has
	/// ever generated or loaded a key pair for.
	pub async fn known_document_ids(&self) -> Vec<DocumentId> {
		self.entries.read().await.keys().cloned().collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use weave_repo::InMemoryStorageAdapter;

	#[tokio::test]
	async fn get_or_create_is_stable_across_calls() {
		let keychain = Keychain::new(Arc::new(InMemoryStorageAdapter::new()));
		let doc_id: DocumentId = "doc-1".into();

		let first = keychain.get_or_create(&doc_id).await.unwrap();
		let second = keychain.get_or_create(&doc_id).await.unwrap();
		assert_eq!(first.public_key, second.public_key);
		assert_eq!(first.secret_key, second.secret_key);
	}

	#[tokio::test]
	async fn get_or_create_is_recoverable_from_storage_alone() {
		let storage = Arc::new(InMemoryStorageAdapter::new());
		let doc_id: DocumentId = "doc-1".into();

		let first = Keychain::new(storage.clone()).get_or_create(&doc_id).await.unwrap();
		let second = Keychain::new(storage).get_or_create(&doc_id).await.unwrap();
		assert_eq!(first.public_key, second.public_key);
	}

	#[tokio::test]
	async fn known_document_ids_reflects_created_entries() {
		let keychain = Keychain::new(Arc::new(InMemoryStorageAdapter::new()));
		keychain.get_or_create(&"doc-1".into()).await.unwrap();
		keychain.get_or_create(&"doc-2".into()).await.unwrap();

		let mut ids: Vec<String> = keychain.known_document_ids().await.iter().map(|id| id.to_string()).collect();
		ids.sort();
		assert_eq!(ids, vec!["doc-1".to_string(), "doc-2".to_string()]);
	}
}
