//! The message transport `DocumentSync` is built over. Deliberately minimal: one
//! outbound verb. Inbound delivery is push-based — the transport owner calls
//! `DocumentSync::receive` whenever a message arrives.

use async_trait::async_trait;
use weave_types::prelude::*;

#[async_trait]
pub trait Transport: Send + Sync + 'static {
	async fn send(&self, message: Message) -> WeaveResult<()>;
}
