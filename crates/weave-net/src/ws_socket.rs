//! Concrete [`PeerSender`]/[`PeerReceiver`] pairing backed by a WebSocket, used on
//! the client side of the signal server's `/connection/:A/:B/:documentId` endpoint
//! once the server has piped the two sockets together. Payload bytes are opaque to
//! the signal server; here they are canonical-JSON-encoded sync messages.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use weave_types::prelude::*;

use crate::socket::{PeerReceiver, PeerSender};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsPeerSender(Mutex<SplitSink<WsStream, WsMessage>>);

pub struct WsPeerReceiver(SplitStream<WsStream>);

/// Splits an established WebSocket connection into the sender/receiver halves a
/// [`crate::Connection`] is constructed from.
pub fn ws_peer_socket(stream: WsStream) -> (WsPeerSender, WsPeerReceiver) {
	let (sink, source) = stream.split();
	(WsPeerSender(Mutex::new(sink)), WsPeerReceiver(source))
}

#[async_trait]
impl PeerSender for WsPeerSender {
	async fn send(&self, bytes: Vec<u8>) -> WeaveResult<()> {
		let mut sink = self.0.lock().await;
		sink.send(WsMessage::Binary(bytes.into()))
			.await
			.map_err(|err| Error::Transport(err.to_string()))
	}
}

#[async_trait]
impl PeerReceiver for WsPeerReceiver {
	async fn recv(&mut self) -> WeaveResult<Option<Vec<u8>>> {
		loop {
			match self.0.next().await {
				None => return Ok(None),
				Some(Ok(WsMessage::Binary(bytes))) => return Ok(Some(bytes.into())),
				Some(Ok(WsMessage::Text(text))) => return Ok(Some(text.into_bytes())),
				Some(Ok(WsMessage::Close(_))) => return Ok(None),
				Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => continue,
				Some(Err(err)) => return Err(Error::Transport(err.to_string())),
			}
		}
	}
}
