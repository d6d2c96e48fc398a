use std::time::Duration;

use thiserror::Error;

/// Failure to reach the capture service at all.
///
/// The service is a system-level component; when it is gone there is nothing
/// a client can do locally, so callers treat this as unrecoverable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
	#[error("capture service unreachable: {0}")]
	Unreachable(String),
}

/// Ways a [`SyncResultReceiver`](crate::SyncResultReceiver) wait can end
/// without a usable reply.
#[derive(Debug, Error)]
pub enum SyncResultError {
	#[error("no reply from capture service within {0:?}")]
	Timeout(Duration),

	#[error("capture service failed the request: {0}")]
	Remote(String),

	#[error("reply payload did not decode: {0}")]
	Decode(#[from] serde_json::Error),
}

impl SyncResultError {
	pub fn is_timeout(&self) -> bool {
		matches!(self, SyncResultError::Timeout(_))
	}
}
