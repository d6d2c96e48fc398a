//! Error types for the capture manager.

use std::time::Duration;

use capture_runtime::{SyncResultError, TransportError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	/// The capture service could not be reached. Unrecoverable: callers
	/// abort the operation instead of retrying.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Caller is not the app that owns the capture service for its user.
	#[error("caller is not user's capture service")]
	NotService,

	#[error("no reply from capture service within {0:?}")]
	Timeout(Duration),

	/// The service answered with a code this client does not understand.
	#[error("received invalid result: {0}")]
	InvalidResult(i32),

	#[error("capture service failed the request: {0}")]
	Remote(String),

	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	#[error("failed to decode reply: {0}")]
	Decode(#[source] serde_json::Error),

	#[error("configuration error: {0}")]
	Config(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

impl Error {
	/// Errors after which the client should stop talking to the service.
	pub fn is_fatal(&self) -> bool {
		matches!(self, Error::Transport(_) | Error::InvalidResult(_))
	}

	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::Timeout(_))
	}

	pub fn is_security(&self) -> bool {
		matches!(self, Error::NotService)
	}
}

impl From<SyncResultError> for Error {
	fn from(err: SyncResultError) -> Self {
		match err {
			SyncResultError::Timeout(timeout) => Error::Timeout(timeout),
			SyncResultError::Remote(message) => Error::Remote(message),
			SyncResultError::Decode(e) => Error::Decode(e),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn transport_and_corruption_are_fatal() {
		assert!(Error::Transport(TransportError::Unreachable("gone".into())).is_fatal());
		assert!(Error::InvalidResult(7).is_fatal());
		assert!(!Error::NotService.is_fatal());
		assert!(!Error::Timeout(Duration::from_secs(5)).is_fatal());
	}

	#[test]
	fn sync_errors_map_to_matching_kinds() {
		let timeout: Error = SyncResultError::Timeout(Duration::from_millis(10)).into();
		assert!(timeout.is_timeout());

		let remote: Error = SyncResultError::Remote("x".into()).into();
		assert!(matches!(remote, Error::Remote(msg) if msg == "x"));
	}

	#[test]
	fn messages_name_the_problem() {
		assert_eq!(Error::InvalidResult(42).to_string(), "received invalid result: 42");
		assert_eq!(Error::NotService.to_string(), "caller is not user's capture service");
	}
}
