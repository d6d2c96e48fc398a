//! The seam between the capture manager and the capture service.

use capture_protocol::{CaptureEvent, FlushReason, SessionId, SessionStart, UserDataRemovalRequest};

use crate::error::TransportError;
use crate::sync_result::ResultSink;

/// Client view of the remote capture service.
///
/// Every method is a one-way send: it returns as soon as the request has
/// been handed to the transport. Calls that need an answer take a
/// [`ResultSink`] which the service completes later. An `Err` means the
/// service could not be reached at all.
pub trait RemoteService: Send + Sync {
	/// Replies with `Option<ComponentName>` as a typed payload.
	fn get_service_component_name(&self, sink: ResultSink) -> Result<(), TransportError>;

	/// Replies with `RESULT_CODE_TRUE`, `RESULT_CODE_FALSE`, or
	/// `RESULT_CODE_NOT_SERVICE`.
	fn is_feature_enabled(&self, sink: ResultSink) -> Result<(), TransportError>;

	/// Replies with `RESULT_CODE_TRUE` or `RESULT_CODE_NOT_SERVICE`.
	fn set_feature_enabled(&self, enabled: bool, sink: ResultSink) -> Result<(), TransportError>;

	fn remove_user_data(&self, request: UserDataRemovalRequest) -> Result<(), TransportError>;

	/// Replies with the [`SessionState`](capture_protocol::SessionState) bits
	/// as the result code.
	fn start_session(&self, start: SessionStart, sink: ResultSink) -> Result<(), TransportError>;

	fn finish_session(&self, session_id: SessionId) -> Result<(), TransportError>;

	fn send_events(&self, session_id: SessionId, events: Vec<CaptureEvent>, reason: FlushReason) -> Result<(), TransportError>;

	/// Identity shown in diagnostics.
	fn describe(&self) -> String {
		std::any::type_name::<Self>().to_string()
	}
}
