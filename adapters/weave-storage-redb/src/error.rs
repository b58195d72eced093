//! Converts redb and join errors into the shared `Error::Persistence` variant so
//! the Repository's degrade-not-terminate policy applies uniformly.

use weave_types::Error;

pub fn from_redb_error(err: impl std::fmt::Display) -> Error {
	Error::Persistence(err.to_string())
}

pub fn from_join_error(err: tokio::task::JoinError) -> Error {
	Error::Persistence(format!("blocking task panicked: {err}"))
}
