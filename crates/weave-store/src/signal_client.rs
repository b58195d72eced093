//! Client side of §4.6's two WebSocket endpoints: a long-lived connection to
//! `/introduction/:localId` that advertises interest and reports newly-introduced
//! peers, and one-shot connections to `/connection/:a/:b/:documentId` that hand
//! back a ready-to-use peer socket once the signal server has paired it.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use weave_net::{ws_peer_socket, WsPeerReceiver, WsPeerSender};
use weave_signal::IntroductionMessage;
use weave_types::prelude::*;

/// `min * 2^attempt`, capped at `max`. Mirrors the reference scheduler's
/// `RetryPolicy::calculate_backoff`.
pub fn backoff_delay(attempt: u32, min: Duration, max: Duration) -> Duration {
	min.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX)).min(max)
}

/// An open connection to one signal server's introduction endpoint, advertising
/// interest in documents and surfacing peers the server has introduced.
pub struct SignalClient {
	local_id: PeerId,
	base_url: String,
	socket: tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
}

impl SignalClient {
	/// Connects to `base_url`'s introduction endpoint as `local_id`. `base_url` has
	/// no trailing slash and no path, e.g. `wss://signal.weave.dev`.
	pub async fn connect(base_url: &str, local_id: PeerId) -> WeaveResult<Self> {
		let url = format!("{base_url}/introduction/{local_id}");
		let (socket, _response) = tokio_tungstenite::connect_async(&url)
			.await
			.map_err(|err| Error::Signal(err.to_string()))?;
		Ok(Self { local_id, base_url: base_url.to_string(), socket })
	}

	/// `C→S: {type: "Join", join: [docId, ...]}`.
	pub async fn join(&mut self, document_ids: Vec<DocumentId>) -> WeaveResult<()> {
		let message = IntroductionMessage::Join { join: document_ids };
		let json = serde_json::to_string(&message)?;
		self.socket.send(WsMessage::Text(json.into())).await.map_err(|err| Error::Signal(err.to_string()))
	}

	/// Waits for the next `Introduction` the server sends. Returns `Ok(None)` on a
	/// clean server-initiated close.
	pub async fn next_introduction(&mut self) -> WeaveResult<Option<(PeerId, Vec<DocumentId>)>> {
		loop {
			match self.socket.next().await {
				None => return Ok(None),
				Some(Ok(WsMessage::Text(text))) => match serde_json::from_str::<IntroductionMessage>(&text) {
					Ok(IntroductionMessage::Introduction { id, keys }) => return Ok(Some((id, keys))),
					Ok(IntroductionMessage::Join { .. }) => continue,
					Err(err) => {
						warn!(error = %err, "malformed message from signal server, ignoring");
						continue;
					}
				},
				Some(Ok(WsMessage::Close(_))) => return Ok(None),
				Some(Ok(WsMessage::Binary(_) | WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => continue,
				Some(Err(err)) => return Err(Error::Signal(err.to_string())),
			}
		}
	}

	/// Opens a fresh connection to `/connection/:localId/:remoteId/:documentId` and
	/// splits it into a ready-to-use peer socket.
	pub async fn open_peer_socket(
		&self,
		remote_id: &PeerId,
		document_id: &DocumentId,
	) -> WeaveResult<(WsPeerSender, WsPeerReceiver)> {
		let url = format!("{}/connection/{}/{}/{}", self.base_url, self.local_id, remote_id, document_id);
		let (stream, _response) =
			tokio_tungstenite::connect_async(&url).await.map_err(|err| Error::Signal(err.to_string()))?;
		Ok(ws_peer_socket(stream))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn backoff_grows_exponentially_and_saturates_at_max() {
		let min = Duration::from_secs(1);
		let max = Duration::from_secs(30);
		assert_eq!(backoff_delay(0, min, max), Duration::from_secs(1));
		assert_eq!(backoff_delay(1, min, max), Duration::from_secs(2));
		assert_eq!(backoff_delay(2, min, max), Duration::from_secs(4));
		assert_eq!(backoff_delay(10, min, max), max);
	}
}
