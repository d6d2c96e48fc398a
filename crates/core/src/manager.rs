//! The per-context capture manager.
//!
//! # Locking
//!
//! One mutex guards the session slot and the merged flags. The session is
//! created at most once under that mutex and never replaced. The manager
//! lock is always taken before a session's own lock, never the other way
//! around.
//!
//! # Blocking calls
//!
//! [`is_feature_enabled`], [`set_feature_enabled`] and
//! [`get_service_component_name`] block the calling thread on a fresh
//! [`SyncResultReceiver`] for at most the configured timeout. Each call has
//! its own deadline and a timeout never touches session state. Everything
//! else is a one-way send or an in-memory update.
//!
//! [`is_feature_enabled`]: CaptureManager::is_feature_enabled
//! [`set_feature_enabled`]: CaptureManager::set_feature_enabled
//! [`get_service_component_name`]: CaptureManager::get_service_component_name

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use capture_protocol::{ActivityToken, CaptureFlags, ComponentName, FlushReason, ResultCode, UserDataRemovalRequest};
use capture_runtime::{Dispatcher, RemoteService, ResultSink, SyncResultReceiver, TransportError};
use parking_lot::Mutex;
use tracing::{debug, error, trace};

use crate::config::ManagerConfig;
use crate::context::CaptureContext;
use crate::error::{Error, Result};
use crate::session::MainSession;

#[derive(Default)]
struct ManagerState {
	flags: CaptureFlags,
	main_session: Option<Arc<MainSession>>,
}

pub struct CaptureManager {
	context: CaptureContext,
	service: Arc<dyn RemoteService>,
	dispatcher: Dispatcher,
	sync_timeout: Duration,
	state: Mutex<ManagerState>,
}

impl CaptureManager {
	/// Creates a manager with the default configuration.
	pub fn new(context: CaptureContext, service: Arc<dyn RemoteService>, dispatcher: Dispatcher) -> Self {
		Self::with_config(context, service, dispatcher, &ManagerConfig::default())
	}

	pub fn with_config(context: CaptureContext, service: Arc<dyn RemoteService>, dispatcher: Dispatcher, config: &ManagerConfig) -> Self {
		trace!(target = "capture.manager", package = context.package_name(), "creating capture manager");
		Self {
			context,
			service,
			dispatcher,
			sync_timeout: config.sync_calls_timeout(),
			state: Mutex::new(ManagerState::default()),
		}
	}

	pub fn context(&self) -> &CaptureContext {
		&self.context
	}

	pub fn sync_timeout(&self) -> Duration {
		self.sync_timeout
	}

	/// Currently merged flags.
	pub fn flags(&self) -> CaptureFlags {
		self.state.lock().flags
	}

	/// Returns the main session, creating it on first use.
	///
	/// Concurrent first callers serialize on the manager mutex, so exactly
	/// one session is ever constructed.
	pub fn get_or_create_session(&self) -> Arc<MainSession> {
		let mut state = self.state.lock();
		self.session_locked(&mut state)
	}

	/// Called when the hosting UI component starts.
	///
	/// Merges `flags` into the stored flags and starts the main session with
	/// the result. Must be called from the UI execution context.
	pub fn on_start(&self, token: ActivityToken, component: ComponentName, flags: CaptureFlags) -> Result<()> {
		if token.is_empty() {
			return Err(Error::InvalidArgument("activity token cannot be empty".to_string()));
		}
		if !component.is_valid() {
			return Err(Error::InvalidArgument(format!("invalid component name: {component:?}")));
		}

		let mut state = self.state.lock();
		state.flags.insert(flags);
		let merged = state.flags;
		debug!(target = "capture.manager", component = %component.to_short_string(), flags = %merged, "activity started");
		self.session_locked(&mut state).start(token, component, merged);
		Ok(())
	}

	/// Called when the hosting UI component stops.
	///
	/// A stop without a prior start still creates the session, only to
	/// destroy it right away.
	pub fn on_stop(&self) {
		debug!(target = "capture.manager", "activity stopped");
		self.get_or_create_session().destroy();
	}

	/// Flushes the main session. Typically called on pause/resume.
	pub fn flush(&self, reason: FlushReason) {
		self.get_or_create_session().flush(reason);
	}

	/// Whether content capture is enabled for this context.
	///
	/// The session only exists once the context has started, so until then
	/// capture is presumed enabled.
	pub fn is_enabled(&self) -> bool {
		let session = self.state.lock().main_session.clone();
		session.is_none_or(|session| !session.is_disabled())
	}

	/// Explicitly enables or disables capture for this context.
	///
	/// Only updates the stored flags; it takes effect at the next
	/// [`on_start`](Self::on_start). Not persisted.
	pub fn set_enabled(&self, enabled: bool) {
		debug!(target = "capture.manager", enabled, context = %self.context, "set_enabled");
		let mut state = self.state.lock();
		if enabled {
			state.flags.remove(CaptureFlags::DISABLED_BY_APP);
		} else {
			state.flags.insert(CaptureFlags::DISABLED_BY_APP);
		}
	}

	/// Component of the service consuming captured events for this user.
	///
	/// Returns `None` without contacting the service when capture is not
	/// enabled for this context.
	pub fn get_service_component_name(&self) -> Result<Option<ComponentName>> {
		if !self.is_enabled() {
			return Ok(None);
		}

		let receiver = self.issue("getServiceComponentName", |service, sink| service.get_service_component_name(sink))?;
		Ok(receiver.await_typed_result()?)
	}

	/// Whether the capture feature is enabled for the user.
	///
	/// Only the app owning the capture service may ask; anyone else gets
	/// [`Error::NotService`].
	pub fn is_feature_enabled(&self) -> Result<bool> {
		let receiver = self.issue("isFeatureEnabled", |service, sink| service.is_feature_enabled(sink))?;
		decode_result_code(receiver.await_int_result()?)
	}

	/// Turns the capture feature on or off for the user.
	///
	/// Returns whether the service acknowledged the change. Only the app
	/// owning the capture service may call this.
	pub fn set_feature_enabled(&self, enabled: bool) -> Result<bool> {
		debug!(target = "capture.manager", enabled, "set_feature_enabled");
		let receiver = self.issue("setFeatureEnabled", |service, sink| service.set_feature_enabled(enabled, sink))?;
		decode_result_code(receiver.await_int_result()?)
	}

	/// Asks the service to remove user data captured for this app.
	pub fn remove_user_data(&self, request: UserDataRemovalRequest) -> Result<()> {
		if request.is_empty() {
			return Err(Error::InvalidArgument("removal request names no data".to_string()));
		}
		self.service.remove_user_data(request).map_err(|e| self.transport_failure("removeUserData", e))
	}

	/// Writes an indented report of the manager and its session.
	///
	/// The manager lock is held only while snapshotting; the writer is fed
	/// without it.
	pub fn dump(&self, prefix: &str, out: &mut dyn fmt::Write) -> fmt::Result {
		writeln!(out, "{prefix}CaptureManager")?;
		let prefix2 = format!("{prefix}  ");

		let (flags, main_session) = {
			let state = self.state.lock();
			(state.flags, state.main_session.clone())
		};
		let enabled = main_session.as_ref().is_none_or(|session| !session.is_disabled());
		writeln!(out, "{prefix2}isEnabled(): {enabled}")?;
		writeln!(out, "{prefix2}Context: {}", self.context)?;
		writeln!(out, "{prefix2}User: {}", self.context.user_id())?;
		writeln!(out, "{prefix2}Service: {}", self.service.describe())?;
		writeln!(out, "{prefix2}Flags: {flags}")?;
		match &main_session {
			Some(session) => {
				writeln!(out, "{prefix2}Main session:")?;
				session.dump(&format!("{prefix2}  "), out)?;
			}
			None => writeln!(out, "{prefix2}No sessions")?,
		}
		Ok(())
	}

	pub fn dump_to_string(&self) -> String {
		let mut out = String::new();
		// writing into a String cannot fail
		let _ = self.dump("", &mut out);
		out
	}

	fn session_locked(&self, state: &mut ManagerState) -> Arc<MainSession> {
		let session = state.main_session.get_or_insert_with(|| {
			let session = Arc::new(MainSession::new(
				self.context.clone(),
				self.dispatcher.clone(),
				Arc::clone(&self.service),
				self.sync_timeout,
			));
			debug!(target = "capture.manager", session_id = %session.id(), "created main session");
			session
		});
		Arc::clone(session)
	}

	fn issue<F>(&self, method: &'static str, request: F) -> Result<SyncResultReceiver>
	where
		F: FnOnce(&dyn RemoteService, ResultSink) -> std::result::Result<(), TransportError>,
	{
		let (sink, receiver) = SyncResultReceiver::channel(self.sync_timeout);
		trace!(target = "capture.manager", method, timeout_ms = self.sync_timeout.as_millis() as u64, "sync call");
		request(self.service.as_ref(), sink).map_err(|e| self.transport_failure(method, e))?;
		Ok(receiver)
	}

	fn transport_failure(&self, method: &str, err: TransportError) -> Error {
		error!(target = "capture.manager", method, error = %err, "capture service unreachable");
		Error::Transport(err)
	}
}

impl fmt::Debug for CaptureManager {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CaptureManager")
			.field("context", &self.context)
			.field("sync_timeout", &self.sync_timeout)
			.field("dispatcher", &self.dispatcher)
			.finish_non_exhaustive()
	}
}

fn decode_result_code(code: i32) -> Result<bool> {
	match ResultCode::from(code) {
		ResultCode::True => Ok(true),
		ResultCode::False => Ok(false),
		ResultCode::NotService => Err(Error::NotService),
		ResultCode::Unknown(code) => Err(Error::InvalidResult(code)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn result_codes_translate() {
		assert!(decode_result_code(1).unwrap());
		assert!(!decode_result_code(2).unwrap());
		assert!(matches!(decode_result_code(-1), Err(Error::NotService)));
		assert!(matches!(decode_result_code(0), Err(Error::InvalidResult(0))));
		assert!(matches!(decode_result_code(3), Err(Error::InvalidResult(3))));
	}
}
