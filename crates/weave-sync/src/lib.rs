#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

//! Per-peer, per-document sync state machine (§4.2): decides what to send and what
//! to ask for, driven entirely by vector-clock comparisons. Transport-agnostic.

mod document_sync;
mod transport;

pub use document_sync::DocumentSync;
pub use transport::Transport;
