#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

mod document;

pub use document::CrdtDocument;

/// Re-exported only for the host-reducer boundary (the "dynamic reducer contract" of
/// the design notes), where a host command function must touch the document's root
/// map directly. The observable document wrapper used by `DocumentSync`/`Connection`
/// never needs or sees these types.
pub use yrs::{Any, MapRef, TransactionMut};
