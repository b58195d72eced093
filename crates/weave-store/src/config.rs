//! `StoreManagerConfig`: every tunable passed explicitly at construction (§9,
//! "Global configuration" — no process-wide defaults, no `lazy_static` registry).

use std::sync::Arc;
use std::time::Duration;

use weave_repo::StorageAdapter;

/// Embedded default signal-server list, analogous to the reference server's
/// baked-in default tenant/instance settings.
pub const DEFAULT_SIGNAL_URLS: &[&str] = &["wss://signal.weave.dev"];

/// Event-listener ceiling a single `EventBus` enforces (§5: "must not impose a low
/// ceiling"; source raises its default to 500).
pub const DEFAULT_EVENT_LISTENER_CAP: usize = 500;

/// Matches `weave-signal`'s own default so a `StoreManager` and a co-located
/// `SignalServer` agree on how long a lone connect request waits.
pub const DEFAULT_PAIRING_TIMEOUT: Duration = Duration::from_secs(60);

/// Construction parameters for one [`crate::StoreManager`], i.e. one application
/// database. Nothing here is read from the environment or a global; the CLI binary
/// that embeds this crate is responsible for layering environment variables on top
/// before constructing this struct.
pub struct StoreManagerConfig {
	pub database_name: String,
	pub signal_urls: Vec<String>,
	pub event_listener_cap: usize,
	pub pairing_timeout: Duration,
	pub storage: Arc<dyn StorageAdapter>,
}

impl StoreManagerConfig {
	pub fn new(database_name: impl Into<String>, storage: Arc<dyn StorageAdapter>) -> Self {
		Self {
			database_name: database_name.into(),
			signal_urls: DEFAULT_SIGNAL_URLS.iter().map(|s| (*s).to_string()).collect(),
			event_listener_cap: DEFAULT_EVENT_LISTENER_CAP,
			pairing_timeout: DEFAULT_PAIRING_TIMEOUT,
			storage,
		}
	}

	#[must_use]
	pub fn with_signal_urls(mut self, urls: Vec<String>) -> Self {
		self.signal_urls = urls;
		self
	}

	#[must_use]
	pub fn with_event_listener_cap(mut self, cap: usize) -> Self {
		self.event_listener_cap = cap;
		self
	}

	#[must_use]
	pub fn with_pairing_timeout(mut self, timeout: Duration) -> Self {
		self.pairing_timeout = timeout;
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use weave_repo::InMemoryStorageAdapter;

	#[test]
	fn defaults_match_the_spec_constants() {
		let config = StoreManagerConfig::new("testdb", Arc::new(InMemoryStorageAdapter::new()));
		assert_eq!(config.event_listener_cap, 500);
		assert_eq!(config.pairing_timeout, Duration::from_secs(60));
		assert_eq!(config.signal_urls, vec!["wss://signal.weave.dev".to_string()]);
	}
}
