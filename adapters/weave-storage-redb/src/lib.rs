#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

//! Redb-backed `StorageAdapter`.
//!
//! # Storage layout
//!
//! One redb file holds every document this process knows about:
//! - `weave_changes` — `"{doc_id}:{seq:020}"` -> raw change bytes, in append order
//! - `weave_meta` — `doc_id` -> metadata JSON
//!
//! The zero-padded sequence number keeps a document's changes contiguous and in
//! order under redb's byte-lexicographic range scans.

mod error;
pub use error::{from_join_error, from_redb_error};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use redb::{ReadableDatabase, ReadableTable, TableDefinition};
use weave_repo::StorageAdapter;
use weave_types::prelude::*;

const TABLE_CHANGES: TableDefinition<&str, &[u8]> = TableDefinition::new("weave_changes");
const TABLE_META: TableDefinition<&str, &str> = TableDefinition::new("weave_meta");

fn change_key(document_id: &DocumentId, seq: u64) -> String {
	format!("{document_id}:{seq:020}")
}

fn change_prefix(document_id: &DocumentId) -> String {
	format!("{document_id}:")
}

/// Persists the write-ahead log and per-document metadata to one embedded
/// database file. Append sequence numbers are cached in memory per document and
/// recovered from the table on first access, so ordering survives a restart.
pub struct WeaveStorageRedb {
	db: Arc<redb::Database>,
	next_seq: DashMap<DocumentId, AtomicU64>,
}

impl WeaveStorageRedb {
	/// Opens (creating if needed) the database file at `path`, including its
	/// parent directory.
	pub async fn open(path: impl AsRef<Path>) -> WeaveResult<Self> {
		let path: PathBuf = path.as_ref().to_path_buf();
		let path_for_log = path.clone();
		if let Some(parent) = path.parent() {
			tokio::fs::create_dir_all(parent).await.map_err(|err| Error::Persistence(err.to_string()))?;
		}

		let db = tokio::task::spawn_blocking(move || -> WeaveResult<redb::Database> {
			let db = redb::Database::create(&path).map_err(from_redb_error)?;
			let tx = db.begin_write().map_err(from_redb_error)?;
			let _ = tx.open_table(TABLE_CHANGES).map_err(from_redb_error)?;
			let _ = tx.open_table(TABLE_META).map_err(from_redb_error)?;
			tx.commit().map_err(from_redb_error)?;
			Ok(db)
		})
		.await
		.map_err(from_join_error)??;

		debug!(path = ?path_for_log, "opened redb storage");
		Ok(Self { db: Arc::new(db), next_seq: DashMap::new() })
	}

	/// The sequence number the next `append_change` for `document_id` should use,
	/// recovering it from the table's existing keys the first time it's asked.
	async fn reserve_seq(&self, document_id: &DocumentId) -> WeaveResult<u64> {
		if let Some(counter) = self.next_seq.get(document_id) {
			return Ok(counter.fetch_add(1, Ordering::SeqCst));
		}

		let db = self.db.clone();
		let document_id_owned = document_id.clone();
		let existing = tokio::task::spawn_blocking(move || -> WeaveResult<u64> {
			let tx = db.begin_read().map_err(from_redb_error)?;
			let table = tx.open_table(TABLE_CHANGES).map_err(from_redb_error)?;
			let prefix = change_prefix(&document_id_owned);
			let mut count = 0u64;
			for item in table.range(prefix.as_str()..).map_err(from_redb_error)? {
				let (key, _) = item.map_err(from_redb_error)?;
				if !key.value().starts_with(&prefix) {
					break;
				}
				count += 1;
			}
			Ok(count)
		})
		.await
		.map_err(from_join_error)??;

		let counter = self.next_seq.entry(document_id.clone()).or_insert_with(|| AtomicU64::new(existing));
		Ok(counter.fetch_add(1, Ordering::SeqCst))
	}
}

#[async_trait]
impl StorageAdapter for WeaveStorageRedb {
	async fn append_change(&self, document_id: &DocumentId, change: Change) -> WeaveResult<()> {
		let seq = self.reserve_seq(document_id).await?;
		let key = change_key(document_id, seq);
		let db = self.db.clone();

		tokio::task::spawn_blocking(move || -> WeaveResult<()> {
			let tx = db.begin_write().map_err(from_redb_error)?;
			{
				let mut table = tx.open_table(TABLE_CHANGES).map_err(from_redb_error)?;
				table.insert(key.as_str(), change.0.as_slice()).map_err(from_redb_error)?;
			}
			tx.commit().map_err(from_redb_error)?;
			Ok(())
		})
		.await
		.map_err(from_join_error)??;

		Ok(())
	}

	async fn load_changes(&self, document_id: &DocumentId) -> WeaveResult<Vec<Change>> {
		let db = self.db.clone();
		let document_id = document_id.clone();

		tokio::task::spawn_blocking(move || -> WeaveResult<Vec<Change>> {
			let tx = db.begin_read().map_err(from_redb_error)?;
			let table = tx.open_table(TABLE_CHANGES).map_err(from_redb_error)?;
			let prefix = change_prefix(&document_id);
			let mut changes = Vec::new();
			for item in table.range(prefix.as_str()..).map_err(from_redb_error)? {
				let (key, value) = item.map_err(from_redb_error)?;
				if !key.value().starts_with(&prefix) {
					break;
				}
				changes.push(Change::new(value.value().to_vec()));
			}
			Ok(changes)
		})
		.await
		.map_err(from_join_error)?
	}

	async fn get_meta(&self, document_id: &DocumentId) -> WeaveResult<Option<serde_json::Value>> {
		let db = self.db.clone();
		let document_id = document_id.clone();

		tokio::task::spawn_blocking(move || -> WeaveResult<Option<serde_json::Value>> {
			let tx = db.begin_read().map_err(from_redb_error)?;
			let table = tx.open_table(TABLE_META).map_err(from_redb_error)?;
			match table.get(document_id.as_str()).map_err(from_redb_error)? {
				Some(value) => Ok(Some(serde_json::from_str(value.value())?)),
				None => Ok(None),
			}
		})
		.await
		.map_err(from_join_error)?
	}

	async fn set_meta(&self, document_id: &DocumentId, value: serde_json::Value) -> WeaveResult<()> {
		let db = self.db.clone();
		let document_id = document_id.clone();

		tokio::task::spawn_blocking(move || -> WeaveResult<()> {
			let json = serde_json::to_string(&value)?;
			let tx = db.begin_write().map_err(from_redb_error)?;
			{
				let mut table = tx.open_table(TABLE_META).map_err(from_redb_error)?;
				table.insert(document_id.as_str(), json.as_str()).map_err(from_redb_error)?;
			}
			tx.commit().map_err(from_redb_error)?;
			Ok(())
		})
		.await
		.map_err(from_join_error)?
	}

	async fn list_documents(&self) -> WeaveResult<Vec<DocumentId>> {
		let db = self.db.clone();

		tokio::task::spawn_blocking(move || -> WeaveResult<Vec<DocumentId>> {
			let tx = db.begin_read().map_err(from_redb_error)?;
			let table = tx.open_table(TABLE_META).map_err(from_redb_error)?;
			let mut ids = Vec::new();
			for item in table.iter().map_err(from_redb_error)? {
				let (key, _) = item.map_err(from_redb_error)?;
				ids.push(key.value().into());
			}
			Ok(ids)
		})
		.await
		.map_err(from_join_error)?
	}

	async fn delete_document(&self, document_id: &DocumentId) -> WeaveResult<()> {
		let db = self.db.clone();
		let document_id_owned = document_id.clone();

		tokio::task::spawn_blocking(move || -> WeaveResult<()> {
			let tx = db.begin_write().map_err(from_redb_error)?;
			{
				let mut changes = tx.open_table(TABLE_CHANGES).map_err(from_redb_error)?;
				let mut meta = tx.open_table(TABLE_META).map_err(from_redb_error)?;

				let prefix = change_prefix(&document_id_owned);
				let mut keys_to_delete = Vec::new();
				for item in changes.range(prefix.as_str()..).map_err(from_redb_error)? {
					let (key, _) = item.map_err(from_redb_error)?;
					if !key.value().starts_with(&prefix) {
						break;
					}
					keys_to_delete.push(key.value().to_string());
				}
				for key in keys_to_delete {
					changes.remove(key.as_str()).map_err(from_redb_error)?;
				}
				meta.remove(document_id_owned.as_str()).map_err(from_redb_error)?;
			}
			tx.commit().map_err(from_redb_error)?;
			Ok(())
		})
		.await
		.map_err(from_join_error)??;

		self.next_seq.remove(document_id);
		Ok(())
	}
}
