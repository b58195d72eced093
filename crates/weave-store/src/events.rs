//! `on`/`off`/`emit` event bus for [`crate::StoreManager`] (§9, "Event-emitter
//! patterns"): a registry of subscriber callbacks, explicit add/remove, guarded
//! against reentrant modification during dispatch by snapshotting the subscriber
//! list before invoking it. Mirrors `weave-repo`'s `HandlerRegistry`, kept separate
//! because it carries a richer, typed [`Event`] payload and an explicit cap.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use weave_types::lock;
use weave_types::prelude::*;

/// Events a [`crate::StoreManager`] emits over its lifetime (§4.5).
#[derive(Debug, Clone)]
pub enum Event {
	/// Ready after the first `Repository::init`.
	Open { document_id: DocumentId },
	/// `StoreManager::close` has finished tearing everything down.
	Close,
	/// A peer `Connection` was adopted for a document.
	Peer { document_id: DocumentId, peer_id: PeerId },
	/// A peer `Connection` was closed, by disconnect or replacement.
	PeerRemove { document_id: DocumentId, peer_id: PeerId },
	/// A document was mutated, locally or by a peer.
	Change { document_id: DocumentId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// A bounded registry of `Event` subscribers. `cap` follows §5's instruction not to
/// impose a low ceiling (the reference raises its own default to 500).
pub struct EventBus {
	listeners: RwLock<Vec<(HandlerId, Listener)>>,
	next_id: AtomicU64,
	cap: usize,
}

impl EventBus {
	pub fn new(cap: usize) -> Self {
		Self { listeners: RwLock::new(Vec::new()), next_id: AtomicU64::new(0), cap }
	}

	/// `on(event, handler)`. Fails with [`Error::Closed`] only once `cap` listeners
	/// are already registered — not expected in practice at the default of 500, but
	/// keeps the ceiling real rather than advisory.
	pub fn on(&self, handler: impl Fn(&Event) + Send + Sync + 'static) -> WeaveResult<HandlerId> {
		let mut listeners = lock!(self.listeners.write());
		if listeners.len() >= self.cap {
			return Err(Error::Closed);
		}
		let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
		listeners.push((id, Arc::new(handler)));
		Ok(id)
	}

	/// `off(handler)`.
	pub fn off(&self, id: HandlerId) {
		let mut listeners = lock!(self.listeners.write());
		listeners.retain(|(listener_id, _)| *listener_id != id);
	}

	/// `emit(event)`. Snapshots the subscriber list before invoking it so a handler
	/// that calls `off`/`on` during dispatch never observes a torn list.
	pub fn emit(&self, event: Event) {
		let snapshot: Vec<Listener> = lock!(self.listeners.read()).iter().map(|(_, listener)| listener.clone()).collect();
		for listener in snapshot {
			listener(&event);
		}
	}

	pub fn len(&self) -> usize {
		lock!(self.listeners.read()).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
