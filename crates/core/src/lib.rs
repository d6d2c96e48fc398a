//! Client-side coordinator for content capture.
//!
//! A [`CaptureManager`] lives for the lifetime of one app context. It lazily
//! creates a single [`MainSession`], merges [`CaptureFlags`] across lifecycle
//! events, forwards start/stop/flush to the session, and turns the one-way
//! [`RemoteService`] transport into blocking calls with bounded timeouts.
//!
//! # Example
//!
//! ```ignore
//! use capture::{CaptureContext, CaptureManager, Dispatcher};
//!
//! let manager = CaptureManager::new(CaptureContext::new("com.example.notes", 0), service, Dispatcher::immediate());
//! manager.on_start(token, component, CaptureFlags::empty())?;
//! assert!(manager.is_enabled());
//! manager.on_stop();
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod manager;
pub mod session;

pub use capture_protocol::{
	ActivityToken, CaptureEvent, CaptureFlags, ComponentName, EventKind, FlushReason, LocusId, ResultCode, SessionId, SessionState,
	UserDataRemovalRequest,
};
pub use capture_runtime::{Dispatcher, RemoteService, ResultSink, SyncResultReceiver, TransportError};
pub use config::{DEFAULT_SYNC_CALLS_TIMEOUT_MS, ManagerConfig};
pub use context::CaptureContext;
pub use error::{Error, Result};
pub use manager::CaptureManager;
pub use session::MainSession;
