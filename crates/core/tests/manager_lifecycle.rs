//! Manager behavior against a scripted in-memory service.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use capture::{
	ActivityToken, CaptureContext, CaptureEvent, CaptureFlags, CaptureManager, ComponentName, Dispatcher, Error, FlushReason, LocusId, ManagerConfig,
	RemoteService, ResultSink, SessionId, TransportError, UserDataRemovalRequest,
};
use capture_protocol::{RESULT_CODE_FALSE, RESULT_CODE_NOT_SERVICE, RESULT_CODE_TRUE, SessionStart, SessionState};
use parking_lot::Mutex;

/// Service double whose answers are fixed at construction.
struct ScriptedService {
	feature_code: i32,
	component: Option<ComponentName>,
	reachable: bool,
	respond: bool,
	parked: Mutex<Vec<ResultSink>>,
	sync_calls: AtomicUsize,
	starts: Mutex<Vec<SessionStart>>,
	finished: Mutex<Vec<SessionId>>,
	flushed: Mutex<Vec<FlushReason>>,
	removals: Mutex<Vec<UserDataRemovalRequest>>,
}

impl ScriptedService {
	fn new() -> Self {
		Self {
			feature_code: RESULT_CODE_TRUE,
			component: Some(ComponentName::new("com.example.capture", "com.example.capture.CaptureService")),
			reachable: true,
			respond: true,
			parked: Mutex::new(Vec::new()),
			sync_calls: AtomicUsize::new(0),
			starts: Mutex::new(Vec::new()),
			finished: Mutex::new(Vec::new()),
			flushed: Mutex::new(Vec::new()),
			removals: Mutex::new(Vec::new()),
		}
	}

	fn with_feature_code(mut self, code: i32) -> Self {
		self.feature_code = code;
		self
	}

	fn unreachable(mut self) -> Self {
		self.reachable = false;
		self
	}

	fn unresponsive(mut self) -> Self {
		self.respond = false;
		self
	}

	fn check(&self) -> Result<(), TransportError> {
		if self.reachable {
			Ok(())
		} else {
			Err(TransportError::Unreachable("scripted service is down".to_string()))
		}
	}

	fn answer(&self, sink: ResultSink, code: i32) -> Result<(), TransportError> {
		self.check()?;
		self.sync_calls.fetch_add(1, Ordering::SeqCst);
		if self.respond {
			sink.send_int(code);
		} else {
			self.parked.lock().push(sink);
		}
		Ok(())
	}
}

impl RemoteService for ScriptedService {
	fn get_service_component_name(&self, sink: ResultSink) -> Result<(), TransportError> {
		self.check()?;
		self.sync_calls.fetch_add(1, Ordering::SeqCst);
		sink.send_typed(&self.component);
		Ok(())
	}

	fn is_feature_enabled(&self, sink: ResultSink) -> Result<(), TransportError> {
		self.answer(sink, self.feature_code)
	}

	fn set_feature_enabled(&self, _enabled: bool, sink: ResultSink) -> Result<(), TransportError> {
		self.answer(sink, self.feature_code)
	}

	fn remove_user_data(&self, request: UserDataRemovalRequest) -> Result<(), TransportError> {
		self.check()?;
		self.removals.lock().push(request);
		Ok(())
	}

	fn start_session(&self, start: SessionStart, sink: ResultSink) -> Result<(), TransportError> {
		self.check()?;
		self.starts.lock().push(start);
		sink.send_int(SessionState::ACTIVE.bits() as i32);
		Ok(())
	}

	fn finish_session(&self, session_id: SessionId) -> Result<(), TransportError> {
		self.check()?;
		self.finished.lock().push(session_id);
		Ok(())
	}

	fn send_events(&self, _session_id: SessionId, _events: Vec<CaptureEvent>, reason: FlushReason) -> Result<(), TransportError> {
		self.check()?;
		self.flushed.lock().push(reason);
		Ok(())
	}

	fn describe(&self) -> String {
		"ScriptedService".to_string()
	}
}

fn manager_with(service: Arc<ScriptedService>) -> CaptureManager {
	CaptureManager::new(CaptureContext::new("com.example.notes", 10), service, Dispatcher::immediate())
}

fn token() -> ActivityToken {
	ActivityToken::new("activity-token")
}

fn component() -> ComponentName {
	ComponentName::new("com.example.notes", "com.example.notes.EditorActivity")
}

#[test]
fn enabled_by_default_before_any_start() {
	let manager = manager_with(Arc::new(ScriptedService::new()));
	assert!(manager.is_enabled());

	for enabled in [false, true, false, false, true, false] {
		manager.set_enabled(enabled);
		assert!(manager.is_enabled(), "set_enabled({enabled}) must not matter before start");
	}
}

#[test]
fn disabling_then_starting_disables_the_session() {
	let service = Arc::new(ScriptedService::new());
	let manager = manager_with(Arc::clone(&service));

	manager.set_enabled(false);
	manager.on_start(token(), component(), CaptureFlags::empty()).unwrap();

	let session = manager.get_or_create_session();
	assert!(session.is_disabled());
	assert!(session.flags().is_disabled_by_app());
	assert!(!manager.is_enabled());
	assert!(service.starts.lock().is_empty());
}

#[test]
fn start_merges_flags_with_stored_ones() {
	let manager = manager_with(Arc::new(ScriptedService::new()));
	let extra = CaptureFlags::from_bits(0x8);

	manager.set_enabled(false);
	manager.on_start(token(), component(), extra).unwrap();
	let session = manager.get_or_create_session();
	assert_eq!(session.flags(), CaptureFlags::DISABLED_BY_APP | extra);

	manager.on_stop();
	manager.on_start(token(), component(), CaptureFlags::DISABLED_BY_FLAG_SECURE).unwrap();
	assert_eq!(session.flags(), CaptureFlags::DISABLED_BY_APP | extra | CaptureFlags::DISABLED_BY_FLAG_SECURE);
	assert_eq!(manager.flags(), session.flags());
}

#[test]
fn re_enabling_clears_only_the_app_bit() {
	let service = Arc::new(ScriptedService::new());
	let manager = manager_with(Arc::clone(&service));
	let extra = CaptureFlags::from_bits(0x8);

	manager.set_enabled(false);
	manager.on_start(token(), component(), extra).unwrap();
	manager.on_stop();

	manager.set_enabled(true);
	manager.on_start(token(), component(), CaptureFlags::empty()).unwrap();

	assert_eq!(manager.flags(), extra);
	assert!(manager.is_enabled());
	assert_eq!(service.starts.lock().len(), 1);
}

#[test]
fn stop_before_start_materializes_and_destroys() {
	let service = Arc::new(ScriptedService::new());
	let manager = manager_with(Arc::clone(&service));

	manager.on_stop();

	let session = manager.get_or_create_session();
	assert!(session.is_destroyed());
	assert!(service.finished.lock().is_empty());
	assert!(manager.is_enabled());
}

#[test]
fn lifecycle_forwards_to_the_same_session() {
	let service = Arc::new(ScriptedService::new());
	let manager = manager_with(Arc::clone(&service));

	manager.on_start(token(), component(), CaptureFlags::empty()).unwrap();
	let first = manager.get_or_create_session();
	manager.flush(FlushReason::IdleTimeout);
	manager.on_stop();
	let second = manager.get_or_create_session();

	assert!(Arc::ptr_eq(&first, &second));
	assert_eq!(*service.flushed.lock(), vec![FlushReason::SessionStarted, FlushReason::SessionFinished]);
	assert_eq!(*service.finished.lock(), vec![first.id()]);
}

#[test]
fn concurrent_access_creates_one_session() {
	let manager = manager_with(Arc::new(ScriptedService::new()));

	let sessions: Vec<_> = std::thread::scope(|scope| {
		let handles: Vec<_> = (0..16).map(|_| scope.spawn(|| manager.get_or_create_session())).collect();
		handles.into_iter().map(|handle| handle.join().unwrap()).collect()
	});

	let first = &sessions[0];
	assert!(sessions.iter().all(|session| Arc::ptr_eq(first, session)));
}

#[test]
fn start_rejects_invalid_arguments() {
	let service = Arc::new(ScriptedService::new());
	let manager = manager_with(Arc::clone(&service));

	let err = manager.on_start(ActivityToken::new(""), component(), CaptureFlags::empty()).unwrap_err();
	assert!(matches!(err, Error::InvalidArgument(_)));

	let err = manager
		.on_start(token(), ComponentName::new("com.example.notes", ""), CaptureFlags::DISABLED_BY_APP)
		.unwrap_err();
	assert!(matches!(err, Error::InvalidArgument(_)));

	assert_eq!(manager.flags(), CaptureFlags::empty());
	assert!(service.starts.lock().is_empty());
}

#[test]
fn feature_query_translates_codes() {
	let on = manager_with(Arc::new(ScriptedService::new().with_feature_code(RESULT_CODE_TRUE)));
	assert!(on.is_feature_enabled().unwrap());

	let off = manager_with(Arc::new(ScriptedService::new().with_feature_code(RESULT_CODE_FALSE)));
	assert!(!off.is_feature_enabled().unwrap());

	let corrupt = manager_with(Arc::new(ScriptedService::new().with_feature_code(99)));
	let err = corrupt.is_feature_enabled().unwrap_err();
	assert!(matches!(err, Error::InvalidResult(99)));
	assert!(err.is_fatal());
}

#[test]
fn not_service_is_an_authorization_failure() {
	let manager = manager_with(Arc::new(ScriptedService::new().with_feature_code(RESULT_CODE_NOT_SERVICE)));

	let err = manager.set_feature_enabled(true).unwrap_err();
	assert!(err.is_security(), "expected authorization failure, got {err:?}");

	let err = manager.is_feature_enabled().unwrap_err();
	assert!(matches!(err, Error::NotService));
}

#[test]
fn set_feature_enabled_acknowledged() {
	let manager = manager_with(Arc::new(ScriptedService::new()));
	assert!(manager.set_feature_enabled(false).unwrap());
}

#[test]
fn feature_toggle_translates_codes() {
	let refused = manager_with(Arc::new(ScriptedService::new().with_feature_code(RESULT_CODE_FALSE)));
	assert!(!refused.set_feature_enabled(true).unwrap());

	let corrupt = manager_with(Arc::new(ScriptedService::new().with_feature_code(7)));
	let err = corrupt.set_feature_enabled(true).unwrap_err();
	assert!(matches!(err, Error::InvalidResult(7)));
	assert!(err.is_fatal());
}

#[test]
fn unanswered_query_times_out_at_the_bound() {
	let service = Arc::new(ScriptedService::new().unresponsive());
	let config = ManagerConfig {
		sync_calls_timeout_ms: 150,
		..ManagerConfig::default()
	};
	let manager = CaptureManager::with_config(CaptureContext::new("com.example.notes", 0), service, Dispatcher::immediate(), &config);

	let started = Instant::now();
	let err = manager.is_feature_enabled().unwrap_err();
	let elapsed = started.elapsed();

	assert!(err.is_timeout(), "expected timeout, got {err:?}");
	assert!(elapsed >= Duration::from_millis(150), "timed out early after {elapsed:?}");
	assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
}

#[test]
fn timeout_does_not_touch_session_state() {
	let service = Arc::new(ScriptedService::new().unresponsive());
	let config = ManagerConfig {
		sync_calls_timeout_ms: 20,
		..ManagerConfig::default()
	};
	let manager = CaptureManager::with_config(CaptureContext::new("com.example.notes", 0), service, Dispatcher::immediate(), &config);
	manager.on_start(token(), component(), CaptureFlags::empty()).unwrap();

	assert!(manager.set_feature_enabled(true).is_err());
	assert!(manager.is_enabled());
	assert!(manager.get_or_create_session().is_started());
}

#[test]
fn unreachable_service_is_fatal() {
	let manager = manager_with(Arc::new(ScriptedService::new().unreachable()));

	let err = manager.is_feature_enabled().unwrap_err();
	assert!(matches!(err, Error::Transport(TransportError::Unreachable(_))));
	assert!(err.is_fatal());

	let err = manager.remove_user_data(UserDataRemovalRequest::for_everything("com.example.notes")).unwrap_err();
	assert!(err.is_fatal());
}

#[test]
fn component_name_skips_service_when_disabled() {
	let service = Arc::new(ScriptedService::new());
	let manager = manager_with(Arc::clone(&service));

	assert_eq!(
		manager.get_service_component_name().unwrap(),
		Some(ComponentName::new("com.example.capture", "com.example.capture.CaptureService"))
	);
	assert_eq!(service.sync_calls.load(Ordering::SeqCst), 1);

	manager.set_enabled(false);
	manager.on_start(token(), component(), CaptureFlags::empty()).unwrap();

	assert_eq!(manager.get_service_component_name().unwrap(), None);
	assert_eq!(service.sync_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn remove_user_data_validates_before_sending() {
	let service = Arc::new(ScriptedService::new());
	let manager = manager_with(Arc::clone(&service));

	let err = manager.remove_user_data(UserDataRemovalRequest::for_locus_ids("com.example.notes")).unwrap_err();
	assert!(matches!(err, Error::InvalidArgument(_)));
	assert!(service.removals.lock().is_empty());

	let request = UserDataRemovalRequest::for_locus_ids("com.example.notes").with_locus_id(LocusId::new("note-7"), false);
	manager.remove_user_data(request.clone()).unwrap();
	assert_eq!(*service.removals.lock(), vec![request]);
}

#[test]
fn dump_reports_session_or_marker() {
	let manager = manager_with(Arc::new(ScriptedService::new()));

	let before = manager.dump_to_string();
	assert!(before.starts_with("CaptureManager\n"));
	assert!(before.contains("  isEnabled(): true\n"));
	assert!(before.contains("  Context: CaptureContext(com.example.notes, user=10)\n"));
	assert!(before.contains("  User: 10\n"));
	assert!(before.contains("  Service: ScriptedService\n"));
	assert!(before.contains("  Flags: 0\n"));
	assert!(before.contains("  No sessions\n"));

	manager.on_start(token(), component(), CaptureFlags::empty()).unwrap();

	let mut after = String::new();
	manager.dump("> ", &mut after).unwrap();
	assert!(after.starts_with("> CaptureManager\n"));
	assert!(after.contains(">   Main session:\n"));
	assert!(after.contains(">     lifecycle: started\n"));
	assert!(!after.contains("No sessions"));
}

/// Writer that reads the manager back while the dump is being written.
struct ReentrantWriter<'a> {
	manager: &'a CaptureManager,
	out: String,
	flag_reads: usize,
}

impl std::fmt::Write for ReentrantWriter<'_> {
	fn write_str(&mut self, s: &str) -> std::fmt::Result {
		let _ = self.manager.flags();
		self.flag_reads += 1;
		self.out.push_str(s);
		Ok(())
	}
}

#[test]
fn dump_releases_manager_lock_before_writing() {
	let manager = Arc::new(manager_with(Arc::new(ScriptedService::new())));
	manager.on_start(token(), component(), CaptureFlags::empty()).unwrap();

	let (tx, rx) = std::sync::mpsc::channel();
	let dumper = Arc::clone(&manager);
	std::thread::spawn(move || {
		let mut writer = ReentrantWriter {
			manager: &dumper,
			out: String::new(),
			flag_reads: 0,
		};
		dumper.dump("", &mut writer).unwrap();
		let _ = tx.send((writer.out, writer.flag_reads));
	});

	let (out, flag_reads) = rx
		.recv_timeout(Duration::from_secs(2))
		.expect("dump blocked while the writer called back into the manager");
	assert!(flag_reads > 0);
	assert!(out.contains("  Main session:\n"));
}
