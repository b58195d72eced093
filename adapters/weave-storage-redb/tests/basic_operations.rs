use tempfile::TempDir;
use weave_repo::StorageAdapter;
use weave_storage_redb::WeaveStorageRedb;
use weave_types::{Change, DocumentId};

async fn open_adapter() -> (WeaveStorageRedb, TempDir) {
	let dir = TempDir::new().expect("tempdir");
	let adapter = WeaveStorageRedb::open(dir.path().join("weave.db")).await.expect("open adapter");
	(adapter, dir)
}

#[tokio::test]
async fn stores_and_loads_changes_in_order() {
	let (adapter, _dir) = open_adapter().await;
	let doc: DocumentId = "doc-1".into();

	adapter.append_change(&doc, Change::new(vec![1, 2, 3])).await.expect("append 1");
	adapter.append_change(&doc, Change::new(vec![4, 5])).await.expect("append 2");

	let loaded = adapter.load_changes(&doc).await.expect("load");
	assert_eq!(loaded, vec![Change::new(vec![1, 2, 3]), Change::new(vec![4, 5])]);
}

#[tokio::test]
async fn empty_document_has_no_changes() {
	let (adapter, _dir) = open_adapter().await;
	let doc: DocumentId = "nonexistent".into();
	assert_eq!(adapter.load_changes(&doc).await.expect("load"), Vec::new());
}

#[tokio::test]
async fn metadata_round_trips() {
	let (adapter, _dir) = open_adapter().await;
	let doc: DocumentId = "doc-2".into();

	assert_eq!(adapter.get_meta(&doc).await.expect("get"), None);

	let meta = serde_json::json!({"publicKey": "abc", "secretKey": "def"});
	adapter.set_meta(&doc, meta.clone()).await.expect("set");
	assert_eq!(adapter.get_meta(&doc).await.expect("get"), Some(meta));
}

#[tokio::test]
async fn lists_and_deletes_documents() {
	let (adapter, _dir) = open_adapter().await;
	let doc_a: DocumentId = "doc-a".into();
	let doc_b: DocumentId = "doc-b".into();

	adapter.set_meta(&doc_a, serde_json::json!({})).await.expect("set a");
	adapter.set_meta(&doc_b, serde_json::json!({})).await.expect("set b");
	adapter.append_change(&doc_a, Change::new(vec![9])).await.expect("append a");

	let mut ids = adapter.list_documents().await.expect("list");
	ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
	assert_eq!(ids, vec![doc_a.clone(), doc_b]);

	adapter.delete_document(&doc_a).await.expect("delete");
	assert_eq!(adapter.load_changes(&doc_a).await.expect("load"), Vec::new());
	assert_eq!(adapter.get_meta(&doc_a).await.expect("get"), None);
}

#[tokio::test]
async fn sequence_numbers_survive_reopening_the_same_file() {
	let dir = TempDir::new().expect("tempdir");
	let db_path = dir.path().join("weave.db");
	let doc: DocumentId = "doc-3".into();

	{
		let adapter = WeaveStorageRedb::open(&db_path).await.expect("open");
		adapter.append_change(&doc, Change::new(vec![1])).await.expect("append 1");
		adapter.append_change(&doc, Change::new(vec![2])).await.expect("append 2");
	}

	let adapter = WeaveStorageRedb::open(&db_path).await.expect("reopen");
	adapter.append_change(&doc, Change::new(vec![3])).await.expect("append 3");

	let loaded = adapter.load_changes(&doc).await.expect("load");
	assert_eq!(loaded, vec![Change::new(vec![1]), Change::new(vec![2]), Change::new(vec![3])]);
}

#[tokio::test]
async fn large_change_round_trips() {
	let (adapter, _dir) = open_adapter().await;
	let doc: DocumentId = "doc-4".into();
	let large = vec![0xABu8; 102_400];

	adapter.append_change(&doc, Change::new(large.clone())).await.expect("append");
	let loaded = adapter.load_changes(&doc).await.expect("load");
	assert_eq!(loaded, vec![Change::new(large)]);
}
