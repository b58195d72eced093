//! A registry of typed subscriber callbacks, guarded against reentrant modification
//! during dispatch: the subscriber list is snapshotted before invoking, so a handler
//! that registers or unregisters another handler mid-dispatch cannot corrupt the walk.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

type Handler<A> = Arc<dyn Fn(&A) + Send + Sync>;

pub struct HandlerRegistry<A> {
	next_id: AtomicU64,
	handlers: RwLock<Vec<(HandlerId, Handler<A>)>>,
}

impl<A> Default for HandlerRegistry<A> {
	fn default() -> Self {
		Self { next_id: AtomicU64::new(1), handlers: RwLock::new(Vec::new()) }
	}
}

impl<A> HandlerRegistry<A> {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn register(&self, handler: impl Fn(&A) + Send + Sync + 'static) -> HandlerId {
		let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
		self.handlers.write().await.push((id, Arc::new(handler)));
		id
	}

	pub async fn unregister(&self, id: HandlerId) {
		self.handlers.write().await.retain(|(existing, _)| *existing != id);
	}

	/// Snapshot the current subscriber list, then invoke each handler in turn. A
	/// handler that calls `register`/`unregister` on this same registry only affects
	/// the *next* dispatch, never this one.
	pub async fn notify(&self, event: &A) {
		let snapshot: Vec<Handler<A>> = self.handlers.read().await.iter().map(|(_, h)| h.clone()).collect();
		for handler in snapshot {
			handler(event);
		}
	}

	pub async fn len(&self) -> usize {
		self.handlers.read().await.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::AtomicUsize;

	#[tokio::test]
	async fn notify_invokes_all_registered_handlers() {
		let registry: HandlerRegistry<u32> = HandlerRegistry::new();
		let seen = Arc::new(AtomicUsize::new(0));

		let seen_a = seen.clone();
		registry.register(move |_| { seen_a.fetch_add(1, Ordering::Relaxed); }).await;
		let seen_b = seen.clone();
		registry.register(move |_| { seen_b.fetch_add(1, Ordering::Relaxed); }).await;

		registry.notify(&7).await;
		assert_eq!(seen.load(Ordering::Relaxed), 2);
	}

	#[tokio::test]
	async fn unregister_stops_future_dispatch() {
		let registry: HandlerRegistry<u32> = HandlerRegistry::new();
		let seen = Arc::new(AtomicUsize::new(0));
		let seen_clone = seen.clone();
		let id = registry.register(move |_| { seen_clone.fetch_add(1, Ordering::Relaxed); }).await;

		registry.notify(&1).await;
		registry.unregister(id).await;
		registry.notify(&1).await;

		assert_eq!(seen.load(Ordering::Relaxed), 1);
		assert_eq!(registry.len().await, 0);
	}

	#[tokio::test]
	async fn reentrant_unregister_during_dispatch_does_not_affect_current_pass() {
		let registry: Arc<HandlerRegistry<u32>> = Arc::new(HandlerRegistry::new());
		let seen = Arc::new(AtomicUsize::new(0));

		let registry_clone = registry.clone();
		let seen_a = seen.clone();
		let id_a = registry
			.register(move |_| {
				seen_a.fetch_add(1, Ordering::Relaxed);
				let registry_clone = registry_clone.clone();
				tokio::spawn(async move {
					// Deregistering itself mid-dispatch must not panic or skip siblings.
					registry_clone.unregister(HandlerId(1)).await;
				});
			})
			.await;
		assert_eq!(id_a, HandlerId(1));

		let seen_b = seen.clone();
		registry.register(move |_| { seen_b.fetch_add(1, Ordering::Relaxed); }).await;

		registry.notify(&1).await;
		assert_eq!(seen.load(Ordering::Relaxed), 2);
	}
}
