//! Crate-wide error type. One enum realizes the error table together with the
//! ambient I/O and serialization failures every adapter runs into.

use std::fmt;

pub type WeaveResult<T> = Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	/// `DocumentSync.validate`: the document clock is missing (not a CRDT replica, or a
	/// historical snapshot).
	NoClock,
	/// `DocumentSync.validate`: the local document's clock regressed relative to what we
	/// already advertised to this peer.
	OldClock,
	/// Peer socket closed or errored.
	Transport(String),
	/// Lost the signaling connection.
	Signal(String),
	/// Local store unavailable or corrupt.
	Persistence(String),
	/// `SignalServer` never saw the counterpart connection arrive in time.
	PairingTimeout,
	/// Requested document or peer is not known to this process.
	NotFound,
	/// Operation attempted after the owning component was closed.
	Closed,
	Io(std::io::Error),
	Serialization(serde_json::Error),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::NoClock => write!(f, "document has no clock (not a CRDT replica)"),
			Error::OldClock => write!(f, "document clock regressed"),
			Error::Transport(msg) => write!(f, "transport error: {msg}"),
			Error::Signal(msg) => write!(f, "signal error: {msg}"),
			Error::Persistence(msg) => write!(f, "persistence error: {msg}"),
			Error::PairingTimeout => write!(f, "signal pairing timed out"),
			Error::NotFound => write!(f, "not found"),
			Error::Closed => write!(f, "component is closed"),
			Error::Io(err) => write!(f, "I/O error: {err}"),
			Error::Serialization(err) => write!(f, "serialization error: {err}"),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Error::Io(err) => Some(err),
			Error::Serialization(err) => Some(err),
			_ => None,
		}
	}
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Error::Io(err)
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Error::Serialization(err)
	}
}

impl Error {
	/// `true` for errors the general policy says are transient / self-healing, i.e.
	/// the caller may retry or reconnect rather than tear anything down.
	pub fn is_transient(&self) -> bool {
		matches!(self, Error::Transport(_) | Error::Signal(_) | Error::PairingTimeout)
	}

	/// `true` for protocol violations that must tear down the offending `Connection`
	/// only, per the general policy in the error-handling design.
	pub fn is_protocol_violation(&self) -> bool {
		matches!(self, Error::NoClock | Error::OldClock)
	}
}

/// Recovers a poisoned lock by taking the inner guard and logging a warning,
/// rather than propagating the panic. Mirrors the reference server's `lock!` macro.
#[macro_export]
macro_rules! lock {
	($guard:expr) => {
		match $guard {
			Ok(g) => g,
			Err(poisoned) => {
				tracing::warn!("lock poisoned, recovering inner guard");
				poisoned.into_inner()
			}
		}
	};
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn classifies_transient_vs_protocol_errors() {
		assert!(Error::Transport("reset".into()).is_transient());
		assert!(Error::PairingTimeout.is_transient());
		assert!(Error::NoClock.is_protocol_violation());
		assert!(Error::OldClock.is_protocol_violation());
		assert!(!Error::Persistence("corrupt".into()).is_transient());
	}
}
