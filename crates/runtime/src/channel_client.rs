//! [`RemoteService`] implementation over a tokio channel.
//!
//! Each call is wrapped in a [`ServiceEnvelope`] stamped with the caller's
//! package and pushed onto an unbounded channel; sending never blocks. A
//! closed channel is how an unreachable service shows up.

use capture_protocol::{CaptureEvent, FlushReason, SessionId, SessionStart, UserDataRemovalRequest};
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::TransportError;
use crate::service::RemoteService;
use crate::sync_result::ResultSink;

/// A request as seen by the service side.
#[derive(Debug)]
pub enum ServiceRequest {
	GetServiceComponentName { sink: ResultSink },
	IsFeatureEnabled { sink: ResultSink },
	SetFeatureEnabled { enabled: bool, sink: ResultSink },
	RemoveUserData { request: UserDataRemovalRequest },
	StartSession { start: SessionStart, sink: ResultSink },
	FinishSession { session_id: SessionId },
	SendEvents {
		session_id: SessionId,
		events: Vec<CaptureEvent>,
		reason: FlushReason,
	},
}

impl ServiceRequest {
	pub fn method(&self) -> &'static str {
		match self {
			ServiceRequest::GetServiceComponentName { .. } => "getServiceComponentName",
			ServiceRequest::IsFeatureEnabled { .. } => "isFeatureEnabled",
			ServiceRequest::SetFeatureEnabled { .. } => "setFeatureEnabled",
			ServiceRequest::RemoveUserData { .. } => "removeUserData",
			ServiceRequest::StartSession { .. } => "startSession",
			ServiceRequest::FinishSession { .. } => "finishSession",
			ServiceRequest::SendEvents { .. } => "sendEvents",
		}
	}
}

/// A request plus the identity of the client that sent it.
#[derive(Debug)]
pub struct ServiceEnvelope {
	pub caller_package: String,
	pub request: ServiceRequest,
}

/// Client end of a channel-connected service.
#[derive(Debug, Clone)]
pub struct ChannelServiceClient {
	caller_package: String,
	endpoint: String,
	tx: mpsc::UnboundedSender<ServiceEnvelope>,
}

impl ChannelServiceClient {
	pub fn new(caller_package: impl Into<String>, endpoint: impl Into<String>, tx: mpsc::UnboundedSender<ServiceEnvelope>) -> Self {
		Self {
			caller_package: caller_package.into(),
			endpoint: endpoint.into(),
			tx,
		}
	}

	pub fn caller_package(&self) -> &str {
		&self.caller_package
	}

	fn send(&self, request: ServiceRequest) -> Result<(), TransportError> {
		let method = request.method();
		trace!(target = "capture.service", endpoint = %self.endpoint, method, "sending request");
		self.tx
			.send(ServiceEnvelope {
				caller_package: self.caller_package.clone(),
				request,
			})
			.map_err(|_| TransportError::Unreachable(format!("{} closed while sending {method}", self.endpoint)))
	}
}

impl RemoteService for ChannelServiceClient {
	fn get_service_component_name(&self, sink: ResultSink) -> Result<(), TransportError> {
		self.send(ServiceRequest::GetServiceComponentName { sink })
	}

	fn is_feature_enabled(&self, sink: ResultSink) -> Result<(), TransportError> {
		self.send(ServiceRequest::IsFeatureEnabled { sink })
	}

	fn set_feature_enabled(&self, enabled: bool, sink: ResultSink) -> Result<(), TransportError> {
		self.send(ServiceRequest::SetFeatureEnabled { enabled, sink })
	}

	fn remove_user_data(&self, request: UserDataRemovalRequest) -> Result<(), TransportError> {
		self.send(ServiceRequest::RemoveUserData { request })
	}

	fn start_session(&self, start: SessionStart, sink: ResultSink) -> Result<(), TransportError> {
		self.send(ServiceRequest::StartSession { start, sink })
	}

	fn finish_session(&self, session_id: SessionId) -> Result<(), TransportError> {
		self.send(ServiceRequest::FinishSession { session_id })
	}

	fn send_events(&self, session_id: SessionId, events: Vec<CaptureEvent>, reason: FlushReason) -> Result<(), TransportError> {
		self.send(ServiceRequest::SendEvents { session_id, events, reason })
	}

	fn describe(&self) -> String {
		format!("ChannelServiceClient(endpoint={}, caller={})", self.endpoint, self.caller_package)
	}
}
