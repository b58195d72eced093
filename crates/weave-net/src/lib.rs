#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

//! One peer pairing: a [`Connection`] wraps a [`weave_sync::DocumentSync`], a raw
//! byte-stream socket and the host application's command dispatcher.

mod connection;
mod dispatcher;
mod socket;
mod ws_socket;

pub use connection::Connection;
pub use dispatcher::{HostDispatcher, NullDispatcher};
pub use socket::{PeerReceiver, PeerSender};
pub use ws_socket::{ws_peer_socket, WsPeerReceiver, WsPeerSender};
