//! The host application's command bus, treated as an external collaborator (§1):
//! this crate only consumes it, dispatching a synthetic "apply peer state" command
//! after every inbound sync message so the host's read-models update.

use async_trait::async_trait;
use weave_repo::DocumentView;
use weave_types::prelude::*;

#[async_trait]
pub trait HostDispatcher: Send + Sync + 'static {
	/// Dispatch the synthetic "apply peer state" command: the document named by
	/// `document_id` has just been advanced (or merely re-confirmed) by a message
	/// from `peer_id`, and now holds `view`.
	async fn dispatch_peer_state(&self, document_id: &DocumentId, peer_id: &PeerId, view: &DocumentView);
}

/// A dispatcher that does nothing, for tests and for hosts that only care about
/// the `StoreManager`'s own `CHANGE` event and never registered a reducer.
pub struct NullDispatcher;

#[async_trait]
impl HostDispatcher for NullDispatcher {
	async fn dispatch_peer_state(&self, _document_id: &DocumentId, _peer_id: &PeerId, _view: &DocumentView) {}
}
