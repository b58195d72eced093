//! The byte-stream socket abstraction a [`crate::Connection`] is built over. Split
//! into a cloneable sender half (used directly as `weave_sync`'s `Transport`) and an
//! owned receiver half driven by the connection's read loop, mirroring how the
//! signal server treats a peer pairing as an opaque, unidirectionally-owned stream
//! in each direction.

use async_trait::async_trait;
use weave_types::prelude::*;

/// Writes one opaque message frame onto the wire. Implementations must preserve
/// message boundaries (the sync protocol never splits or merges frames).
#[async_trait]
pub trait PeerSender: Send + Sync + 'static {
	async fn send(&self, bytes: Vec<u8>) -> WeaveResult<()>;
}

/// Reads one opaque message frame from the wire. Returns `Ok(None)` on a clean
/// close; an `Err` signals a transport failure (§7, `TransportError`).
#[async_trait]
pub trait PeerReceiver: Send + 'static {
	async fn recv(&mut self) -> WeaveResult<Option<Vec<u8>>>;
}
