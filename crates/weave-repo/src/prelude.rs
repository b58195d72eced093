pub use crate::handler_registry::HandlerId;
pub use crate::observable_document::{DocumentView, ObservableDocument};
pub use crate::repository::Repository;
pub use crate::storage::{InMemoryStorageAdapter, StorageAdapter};
pub use crate::sync_document::{RepositoryDocument, SyncDocument};
