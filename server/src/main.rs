//! Standalone signal server process: serves the two WebSocket endpoints of the
//! rendezvous protocol (introduction, connection) over one listener. Layers
//! `WEAVE_LISTEN`/`RUST_LOG`/`WEAVE_DB_PATH` over built-in defaults, the same
//! shape as the reference server's env-var bootstrap, without its tenancy,
//! TLS/ACME, or HTTP API surface.

use std::env;
use std::sync::Arc;

use tracing::info;
use weave_signal::SignalServerConfig;
use weave_store::StoreManagerConfig;
use weave_storage_redb::WeaveStorageRedb;

const DEFAULT_LISTEN: &str = "127.0.0.1:4455";
const DEFAULT_DB_PATH: &str = "./data/weave.db";

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

	let listen = env::var("WEAVE_LISTEN").unwrap_or_else(|_| DEFAULT_LISTEN.to_string());
	let db_path = env::var("WEAVE_DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());

	// Opening the adapter proves out the wiring a host application embeds this
	// crate with; a StoreManager itself isn't started here, since a generic CLI
	// has no application-supplied Reducer to dispatch commands through.
	let storage = match WeaveStorageRedb::open(&db_path).await {
		Ok(storage) => storage,
		Err(err) => {
			eprintln!("failed to open storage at {db_path}: {err}");
			std::process::exit(1);
		}
	};
	let store_config = StoreManagerConfig::new("weave", Arc::new(storage));
	info!(
		signal_urls = ?store_config.signal_urls,
		pairing_timeout_secs = store_config.pairing_timeout.as_secs(),
		"store configuration ready"
	);

	let signal_config = SignalServerConfig { pairing_timeout: store_config.pairing_timeout };
	let app = weave_signal::router(signal_config);

	let listener = match tokio::net::TcpListener::bind(&listen).await {
		Ok(listener) => listener,
		Err(err) => {
			eprintln!("failed to bind {listen}: {err}");
			std::process::exit(1);
		}
	};
	info!(%listen, "signal server listening");

	if let Err(err) = axum::serve(listener, app).await {
		eprintln!("server error: {err}");
		std::process::exit(1);
	}
}
