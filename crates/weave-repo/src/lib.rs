#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

mod handler_registry;
mod observable_document;
mod repository;
mod storage;
mod sync_document;

pub mod prelude;

pub use handler_registry::HandlerId;
pub use observable_document::{DocumentView, ObservableDocument};
pub use repository::Repository;
pub use storage::{InMemoryStorageAdapter, StorageAdapter};
pub use sync_document::{RepositoryDocument, SyncDocument};
