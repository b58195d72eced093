#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

//! Stateless broker for peer introduction and raw byte-stream pairing (§4.6).
//! Holds no document content and no CRDT state: only which documents each
//! currently-connected peer is interested in, and which sockets are waiting to be
//! paired. Safe to restart at any time without losing sync correctness.

mod connect;
mod introduction;
mod protocol;

pub use connect::{connection_handler, ConnectState, PairingRegistry, DEFAULT_PAIRING_TIMEOUT};
pub use introduction::{introduction_handler, IntroductionRegistry};
pub use protocol::IntroductionMessage;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;

/// Tunables for a running signal server. Constructed explicitly by the embedding
/// binary; no implicit global or environment-variable lookup happens here.
#[derive(Debug, Clone)]
pub struct SignalServerConfig {
	pub pairing_timeout: Duration,
}

impl Default for SignalServerConfig {
	fn default() -> Self {
		Self { pairing_timeout: DEFAULT_PAIRING_TIMEOUT }
	}
}

/// Builds the two-route axum [`Router`] described by §4.6: `/introduction/:localId`
/// and `/connection/:a/:b/:documentId`. The returned router owns its state; mount it
/// under whatever prefix the embedding binary chooses.
pub fn router(config: SignalServerConfig) -> Router {
	let introductions = Arc::new(IntroductionRegistry::new());
	let connect_state = Arc::new(connect::ConnectState { registry: Arc::new(PairingRegistry::new()), timeout: config.pairing_timeout });

	Router::new()
		.route("/introduction/{local_id}", get(introduction_handler).with_state(introductions))
		.route("/connection/{a}/{b}/{document_id}", get(connection_handler).with_state(connect_state))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_config_uses_a_sixty_second_pairing_timeout() {
		assert_eq!(SignalServerConfig::default().pairing_timeout, Duration::from_secs(60));
	}

	#[test]
	fn router_builds_without_panicking() {
		let _router = router(SignalServerConfig::default());
	}
}
