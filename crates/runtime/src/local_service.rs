//! In-process capture service.
//!
//! [`LocalService`] answers [`ServiceRequest`]s the way the system service
//! does from a client's point of view: it owns the per-user feature toggle,
//! only lets the owning service package flip it, tracks started sessions and
//! records everything it receives so callers can inspect it.
//!
//! # Example
//!
//! ```ignore
//! let (service, handle) = LocalService::new(LocalServiceConfig::default());
//! tokio::spawn(service.run());
//!
//! let client = handle.connect("com.example.app")?;
//! let manager = CaptureManager::new(context, Arc::new(client), Dispatcher::immediate());
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use capture_protocol::{
	CaptureEvent, ComponentName, FlushReason, RESULT_CODE_FALSE, RESULT_CODE_NOT_SERVICE, RESULT_CODE_TRUE, SessionId, SessionStart, SessionState,
	UserDataRemovalRequest,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, mpsc};
use tracing::{debug, info, warn};

use crate::channel_client::{ChannelServiceClient, ServiceEnvelope, ServiceRequest};
use crate::error::TransportError;
use crate::sync_result::ResultSink;

/// Behavior of a [`LocalService`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalServiceConfig {
	/// Component reported by `getServiceComponentName`.
	pub component: ComponentName,
	/// Initial state of the per-user feature toggle.
	pub feature_enabled: bool,
	/// Packages for which capture is disabled by service policy.
	pub disabled_packages: HashSet<String>,
	/// Kill switch. `Some(false)` refuses every connection.
	pub service_explicitly_enabled: Option<bool>,
	/// Hold reply sinks forever instead of answering.
	pub unresponsive: bool,
}

impl Default for LocalServiceConfig {
	fn default() -> Self {
		Self {
			component: ComponentName::new("com.example.capture", "com.example.capture.CaptureService"),
			feature_enabled: true,
			disabled_packages: HashSet::new(),
			service_explicitly_enabled: None,
			unresponsive: false,
		}
	}
}

/// What the service knows about one client session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
	pub caller_package: String,
	pub start: SessionStart,
	pub state: SessionState,
	pub finished: bool,
}

/// One batch of events received through `sendEvents`.
#[derive(Debug, Clone, PartialEq)]
pub struct EventBatch {
	pub session_id: SessionId,
	pub reason: FlushReason,
	pub events: Vec<CaptureEvent>,
}

#[derive(Debug, Default)]
struct ServiceState {
	feature_enabled: bool,
	sessions: HashMap<SessionId, SessionRecord>,
	batches: Vec<EventBatch>,
	removals: Vec<(String, UserDataRemovalRequest)>,
	parked: Vec<ResultSink>,
}

/// Service loop. Drive it with [`LocalService::run`].
pub struct LocalService {
	config: LocalServiceConfig,
	state: Arc<Mutex<ServiceState>>,
	rx: mpsc::UnboundedReceiver<ServiceEnvelope>,
	shutdown: Arc<Notify>,
}

/// Connects clients to a [`LocalService`] and inspects what it recorded.
#[derive(Debug, Clone)]
pub struct LocalServiceHandle {
	tx: mpsc::UnboundedSender<ServiceEnvelope>,
	state: Arc<Mutex<ServiceState>>,
	shutdown: Arc<Notify>,
	endpoint: String,
	explicitly_enabled: Option<bool>,
}

impl LocalService {
	pub fn new(config: LocalServiceConfig) -> (LocalService, LocalServiceHandle) {
		let (tx, rx) = mpsc::unbounded_channel();
		let state = Arc::new(Mutex::new(ServiceState {
			feature_enabled: config.feature_enabled,
			..ServiceState::default()
		}));
		let shutdown = Arc::new(Notify::new());

		let handle = LocalServiceHandle {
			tx,
			state: Arc::clone(&state),
			shutdown: Arc::clone(&shutdown),
			endpoint: config.component.to_short_string(),
			explicitly_enabled: config.service_explicitly_enabled,
		};
		let service = LocalService {
			config,
			state,
			rx,
			shutdown,
		};
		(service, handle)
	}

	/// Processes requests until [`LocalServiceHandle::shutdown`] is called.
	///
	/// Dropping the receiver on exit makes every client see
	/// [`TransportError::Unreachable`].
	pub async fn run(mut self) {
		info!(target = "capture.service", component = %self.config.component, "local capture service started");
		loop {
			tokio::select! {
				_ = self.shutdown.notified() => break,
				envelope = self.rx.recv() => match envelope {
					Some(envelope) => self.handle(envelope),
					None => break,
				},
			}
		}
		self.state.lock().parked.clear();
		info!(target = "capture.service", "local capture service stopped");
	}

	fn handle(&self, envelope: ServiceEnvelope) {
		let ServiceEnvelope { caller_package, request } = envelope;
		debug!(target = "capture.service", caller = %caller_package, method = request.method(), "request received");
		let mut state = self.state.lock();

		match request {
			ServiceRequest::GetServiceComponentName { sink } => {
				let component = state.feature_enabled.then(|| self.config.component.clone());
				self.reply(&mut state, sink, |sink| sink.send_typed(&component));
			}
			ServiceRequest::IsFeatureEnabled { sink } => {
				let code = if !self.is_owner(&caller_package) {
					RESULT_CODE_NOT_SERVICE
				} else if state.feature_enabled {
					RESULT_CODE_TRUE
				} else {
					RESULT_CODE_FALSE
				};
				self.reply(&mut state, sink, |sink| sink.send_int(code));
			}
			ServiceRequest::SetFeatureEnabled { enabled, sink } => {
				let code = if self.is_owner(&caller_package) {
					state.feature_enabled = enabled;
					info!(target = "capture.service", enabled, "feature toggled");
					RESULT_CODE_TRUE
				} else {
					warn!(target = "capture.service", caller = %caller_package, "feature toggle denied");
					RESULT_CODE_NOT_SERVICE
				};
				self.reply(&mut state, sink, |sink| sink.send_int(code));
			}
			ServiceRequest::RemoveUserData { request } => {
				state.removals.push((caller_package, request));
			}
			ServiceRequest::StartSession { start, sink } => {
				let session_state = self.session_state_for(&state, &caller_package, &start);
				state.sessions.insert(
					start.session_id,
					SessionRecord {
						caller_package,
						start,
						state: session_state,
						finished: false,
					},
				);
				self.reply(&mut state, sink, |sink| sink.send_int(session_state.bits() as i32));
			}
			ServiceRequest::FinishSession { session_id } => match state.sessions.get_mut(&session_id) {
				Some(record) => record.finished = true,
				None => warn!(target = "capture.service", %session_id, "finish for unknown session"),
			},
			ServiceRequest::SendEvents { session_id, events, reason } => {
				state.batches.push(EventBatch { session_id, reason, events });
			}
		}
	}

	fn reply(&self, state: &mut ServiceState, sink: ResultSink, answer: impl FnOnce(ResultSink)) {
		if self.config.unresponsive {
			state.parked.push(sink);
		} else {
			answer(sink);
		}
	}

	fn is_owner(&self, caller_package: &str) -> bool {
		caller_package == self.config.component.package_name
	}

	fn session_state_for(&self, state: &ServiceState, caller_package: &str, start: &SessionStart) -> SessionState {
		if state.sessions.get(&start.session_id).is_some_and(|record| !record.finished) {
			return SessionState::DISABLED | SessionState::DUPLICATED_ID;
		}
		if start.flags.is_disabled_by_app() {
			return SessionState::DISABLED | SessionState::BY_APP;
		}
		if start.flags.is_disabled_by_flag_secure() {
			return SessionState::DISABLED | SessionState::FLAG_SECURE;
		}
		if !state.feature_enabled || self.config.disabled_packages.contains(caller_package) {
			return SessionState::DISABLED | SessionState::NO_SERVICE;
		}
		SessionState::ACTIVE
	}
}

impl LocalServiceHandle {
	/// Opens a client connection on behalf of `caller_package`.
	pub fn connect(&self, caller_package: impl Into<String>) -> Result<ChannelServiceClient, TransportError> {
		if self.explicitly_enabled == Some(false) {
			return Err(TransportError::Unreachable(format!("{} disabled by service_explicitly_enabled", self.endpoint)));
		}
		if self.tx.is_closed() {
			return Err(TransportError::Unreachable(format!("{} is not running", self.endpoint)));
		}
		Ok(ChannelServiceClient::new(caller_package, self.endpoint.clone(), self.tx.clone()))
	}

	/// Stops the service loop.
	pub fn shutdown(&self) {
		self.shutdown.notify_one();
	}

	pub fn feature_enabled(&self) -> bool {
		self.state.lock().feature_enabled
	}

	pub fn session(&self, session_id: SessionId) -> Option<SessionRecord> {
		self.state.lock().sessions.get(&session_id).cloned()
	}

	pub fn sessions(&self) -> Vec<SessionRecord> {
		let mut sessions: Vec<_> = self.state.lock().sessions.values().cloned().collect();
		sessions.sort_by_key(|record| record.start.session_id);
		sessions
	}

	pub fn event_batches(&self) -> Vec<EventBatch> {
		self.state.lock().batches.clone()
	}

	pub fn removal_requests(&self) -> Vec<(String, UserDataRemovalRequest)> {
		self.state.lock().removals.clone()
	}
}
