//! The main capture session of a manager.
//!
//! A [`MainSession`] is created lazily by its [`CaptureManager`] and reused
//! across every start/stop cycle of the context. It buffers lifecycle events
//! and ships them to the service when flushed. Service calls are posted to
//! the manager's [`Dispatcher`] so they leave in the order they were issued.
//!
//! Lifecycle calls are expected from a single execution context; the
//! internal lock only keeps the state consistent, it does not make
//! interleaved start/stop sequences meaningful.
//!
//! [`CaptureManager`]: crate::CaptureManager

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use capture_protocol::{ActivityToken, CaptureEvent, CaptureFlags, ComponentName, EventKind, FlushReason, SessionId, SessionStart, SessionState};
use capture_runtime::{Dispatcher, RemoteService, SyncResultReceiver};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::context::CaptureContext;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
	Created,
	Started,
	Destroyed,
}

impl Lifecycle {
	fn as_str(self) -> &'static str {
		match self {
			Lifecycle::Created => "created",
			Lifecycle::Started => "started",
			Lifecycle::Destroyed => "destroyed",
		}
	}
}

struct SessionInner {
	lifecycle: Lifecycle,
	token: Option<ActivityToken>,
	component: Option<ComponentName>,
	flags: CaptureFlags,
	state: SessionState,
	start_reply: Option<SyncResultReceiver>,
	/// The service was asked to start this session and not yet told it finished.
	announced: bool,
	buffer: Vec<CaptureEvent>,
}

pub struct MainSession {
	id: SessionId,
	context: CaptureContext,
	service: Arc<dyn RemoteService>,
	dispatcher: Dispatcher,
	sync_timeout: Duration,
	disabled: Arc<AtomicBool>,
	inner: Mutex<SessionInner>,
}

impl MainSession {
	pub(crate) fn new(context: CaptureContext, dispatcher: Dispatcher, service: Arc<dyn RemoteService>, sync_timeout: Duration) -> Self {
		Self {
			id: SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)),
			context,
			service,
			dispatcher,
			sync_timeout,
			disabled: Arc::new(AtomicBool::new(false)),
			inner: Mutex::new(SessionInner {
				lifecycle: Lifecycle::Created,
				token: None,
				component: None,
				flags: CaptureFlags::empty(),
				state: SessionState::UNKNOWN,
				start_reply: None,
				announced: false,
				buffer: Vec::new(),
			}),
		}
	}

	pub fn id(&self) -> SessionId {
		self.id
	}

	pub fn context(&self) -> &CaptureContext {
		&self.context
	}

	pub fn is_started(&self) -> bool {
		self.inner.lock().lifecycle == Lifecycle::Started
	}

	pub fn is_destroyed(&self) -> bool {
		self.inner.lock().lifecycle == Lifecycle::Destroyed
	}

	/// Flags the session was last started with.
	pub fn flags(&self) -> CaptureFlags {
		self.inner.lock().flags
	}

	/// Last state reported by the service, or derived locally.
	pub fn state(&self) -> SessionState {
		let mut inner = self.inner.lock();
		self.poll_start_reply(&mut inner);
		inner.state
	}

	pub fn buffered_events(&self) -> usize {
		self.inner.lock().buffer.len()
	}

	/// Activates the session for `token`/`component`.
	///
	/// A session that is already started ignores the call. Starting with a
	/// disabling flag disables the session locally without contacting the
	/// service.
	pub fn start(&self, token: ActivityToken, component: ComponentName, flags: CaptureFlags) {
		let mut inner = self.inner.lock();
		if inner.lifecycle == Lifecycle::Started {
			debug!(target = "capture.session", session_id = %self.id, "start ignored; already started");
			return;
		}

		debug!(
			target = "capture.session",
			session_id = %self.id,
			component = %component.to_short_string(),
			flags = %flags,
			"starting session"
		);

		inner.lifecycle = Lifecycle::Started;
		inner.token = Some(token.clone());
		inner.component = Some(component.clone());
		inner.flags = flags;
		inner.start_reply = None;
		inner.buffer.clear();

		if flags.is_disabled_by_app() || flags.is_disabled_by_flag_secure() {
			let reason = if flags.is_disabled_by_app() { SessionState::BY_APP } else { SessionState::FLAG_SECURE };
			inner.state = SessionState::DISABLED | reason;
			self.disabled.store(true, Ordering::SeqCst);
			debug!(target = "capture.session", session_id = %self.id, state = %inner.state, "session disabled locally");
			return;
		}

		self.disabled.store(false, Ordering::SeqCst);
		inner.state = SessionState::UNKNOWN;

		let (sink, receiver) = SyncResultReceiver::channel(self.sync_timeout);
		inner.start_reply = Some(receiver);
		inner.announced = true;

		let start = SessionStart {
			session_id: self.id,
			token: token.clone(),
			component: component.clone(),
			flags,
		};
		let service = Arc::clone(&self.service);
		let disabled = Arc::clone(&self.disabled);
		let session_id = self.id;
		self.dispatcher.post(move || {
			if let Err(e) = service.start_session(start, sink) {
				warn!(target = "capture.session", %session_id, error = %e, "error starting session");
				disabled.store(true, Ordering::SeqCst);
			}
		});

		inner.buffer.push(self.event(EventKind::SessionStarted { token, component }));
		self.flush_locked(&mut inner, FlushReason::SessionStarted);
	}

	/// Sends buffered events to the service.
	///
	/// Ignored unless the session is started. A disabled session drops its
	/// buffer instead of sending it.
	pub fn flush(&self, reason: FlushReason) {
		let mut inner = self.inner.lock();
		if inner.lifecycle != Lifecycle::Started {
			debug!(
				target = "capture.session",
				session_id = %self.id,
				%reason,
				lifecycle = inner.lifecycle.as_str(),
				"flush ignored; session not started"
			);
			return;
		}
		self.flush_locked(&mut inner, reason);
	}

	/// Finishes the session: sends what is buffered, then tells the service
	/// the session is over. Safe to call on a session that never started.
	///
	/// The service is told even when it disabled the session, so a restart
	/// under the same id is not taken for a duplicate.
	pub fn destroy(&self) {
		let mut inner = self.inner.lock();
		match inner.lifecycle {
			Lifecycle::Started => {}
			Lifecycle::Created | Lifecycle::Destroyed => {
				debug!(
					target = "capture.session",
					session_id = %self.id,
					lifecycle = inner.lifecycle.as_str(),
					"destroying session that is not started"
				);
				inner.lifecycle = Lifecycle::Destroyed;
				return;
			}
		}

		debug!(target = "capture.session", session_id = %self.id, "destroying session");
		if !self.is_disabled_locked(&mut inner) {
			inner.buffer.push(self.event(EventKind::SessionFinished));
			self.flush_locked(&mut inner, FlushReason::SessionFinished);
		}
		if inner.announced {
			let service = Arc::clone(&self.service);
			let session_id = self.id;
			self.dispatcher.post(move || {
				if let Err(e) = service.finish_session(session_id) {
					warn!(target = "capture.session", %session_id, error = %e, "error finishing session");
				}
			});
		}

		inner.lifecycle = Lifecycle::Destroyed;
		inner.start_reply = None;
		inner.announced = false;
		inner.buffer.clear();
	}

	/// Whether capture is disabled for this session, locally or by the
	/// service's answer to the start request.
	pub fn is_disabled(&self) -> bool {
		let mut inner = self.inner.lock();
		self.is_disabled_locked(&mut inner)
	}

	pub fn dump(&self, prefix: &str, out: &mut dyn fmt::Write) -> fmt::Result {
		let mut inner = self.inner.lock();
		let disabled = self.is_disabled_locked(&mut inner);

		writeln!(out, "{prefix}id: {}", self.id)?;
		writeln!(out, "{prefix}lifecycle: {}", inner.lifecycle.as_str())?;
		writeln!(out, "{prefix}state: {}", inner.state)?;
		writeln!(out, "{prefix}disabled: {disabled}")?;
		writeln!(out, "{prefix}flags: {}", inner.flags)?;
		match &inner.token {
			Some(token) => writeln!(out, "{prefix}token: {token}")?,
			None => writeln!(out, "{prefix}token: null")?,
		}
		match &inner.component {
			Some(component) => writeln!(out, "{prefix}component: {}", component.to_short_string())?,
			None => writeln!(out, "{prefix}component: null")?,
		}
		writeln!(out, "{prefix}buffered events: {}", inner.buffer.len())?;
		if inner.start_reply.is_some() {
			writeln!(out, "{prefix}waiting for service state")?;
		}
		Ok(())
	}

	fn is_disabled_locked(&self, inner: &mut SessionInner) -> bool {
		self.poll_start_reply(inner);
		self.disabled.load(Ordering::SeqCst)
	}

	fn poll_start_reply(&self, inner: &mut SessionInner) {
		let Some(result) = inner.start_reply.as_ref().and_then(|reply| reply.try_int_result()) else {
			return;
		};
		inner.start_reply = None;

		match result {
			Ok(bits) => {
				inner.state = SessionState::from_bits(bits as u32);
				trace!(target = "capture.session", session_id = %self.id, state = %inner.state, "service reported session state");
				if inner.state.is_disabled() {
					self.disabled.store(true, Ordering::SeqCst);
				}
			}
			Err(e) => {
				warn!(target = "capture.session", session_id = %self.id, error = %e, "no usable session state from service");
				inner.state = SessionState::DISABLED | SessionState::INTERNAL_ERROR;
				self.disabled.store(true, Ordering::SeqCst);
			}
		}
	}

	fn flush_locked(&self, inner: &mut SessionInner, reason: FlushReason) {
		if self.is_disabled_locked(inner) {
			if !inner.buffer.is_empty() {
				debug!(target = "capture.session", session_id = %self.id, dropped = inner.buffer.len(), "dropping events of disabled session");
				inner.buffer.clear();
			}
			return;
		}
		if inner.buffer.is_empty() {
			return;
		}

		let events = std::mem::take(&mut inner.buffer);
		trace!(target = "capture.session", session_id = %self.id, %reason, count = events.len(), "flushing events");

		let service = Arc::clone(&self.service);
		let disabled = Arc::clone(&self.disabled);
		let session_id = self.id;
		self.dispatcher.post(move || {
			if let Err(e) = service.send_events(session_id, events, reason) {
				warn!(target = "capture.session", %session_id, %reason, error = %e, "error sending events");
				disabled.store(true, Ordering::SeqCst);
			}
		});
	}

	fn event(&self, kind: EventKind) -> CaptureEvent {
		CaptureEvent {
			session_id: self.id,
			event_time_ms: now_ms(),
			kind,
		}
	}
}

impl fmt::Debug for MainSession {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MainSession")
			.field("id", &self.id)
			.field("context", &self.context)
			.field("disabled", &self.disabled.load(Ordering::SeqCst))
			.finish_non_exhaustive()
	}
}

fn now_ms() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|elapsed| elapsed.as_millis() as u64)
		.unwrap_or_default()
}
