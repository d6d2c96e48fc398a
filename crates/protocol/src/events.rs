//! Session events and flush reasons.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::flags::CaptureFlags;
use crate::types::{ActivityToken, ComponentName};

/// Client-assigned session identifier, unique within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Why buffered session events should be sent now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushReason {
	FullBuffer,
	ViewRootEntered,
	SessionStarted,
	SessionFinished,
	IdleTimeout,
}

impl FlushReason {
	/// Wire code of the reason.
	pub fn code(self) -> i32 {
		match self {
			FlushReason::FullBuffer => 1,
			FlushReason::ViewRootEntered => 2,
			FlushReason::SessionStarted => 3,
			FlushReason::SessionFinished => 4,
			FlushReason::IdleTimeout => 5,
		}
	}

	pub fn from_code(code: i32) -> Option<Self> {
		Some(match code {
			1 => FlushReason::FullBuffer,
			2 => FlushReason::ViewRootEntered,
			3 => FlushReason::SessionStarted,
			4 => FlushReason::SessionFinished,
			5 => FlushReason::IdleTimeout,
			_ => return None,
		})
	}

	pub fn as_str(self) -> &'static str {
		match self {
			FlushReason::FullBuffer => "FULL",
			FlushReason::ViewRootEntered => "VIEW_ROOT",
			FlushReason::SessionStarted => "STARTED",
			FlushReason::SessionFinished => "FINISHED",
			FlushReason::IdleTimeout => "IDLE",
		}
	}
}

impl fmt::Display for FlushReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// What happened in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
	SessionStarted {
		token: ActivityToken,
		component: ComponentName,
	},
	SessionFinished,
}

/// A buffered session event as sent to the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureEvent {
	pub session_id: SessionId,
	/// Milliseconds since the Unix epoch when the event was recorded.
	pub event_time_ms: u64,
	#[serde(flatten)]
	pub kind: EventKind,
}

/// Parameters of a session start request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStart {
	pub session_id: SessionId,
	pub token: ActivityToken,
	pub component: ComponentName,
	pub flags: CaptureFlags,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn flush_reason_codes_are_stable() {
		for reason in [
			FlushReason::FullBuffer,
			FlushReason::ViewRootEntered,
			FlushReason::SessionStarted,
			FlushReason::SessionFinished,
			FlushReason::IdleTimeout,
		] {
			assert_eq!(FlushReason::from_code(reason.code()), Some(reason));
		}
		assert_eq!(FlushReason::from_code(0), None);
	}

	#[test]
	fn event_serializes_with_type_tag() {
		let event = CaptureEvent {
			session_id: SessionId(7),
			event_time_ms: 1,
			kind: EventKind::SessionFinished,
		};
		let json = serde_json::to_value(&event).unwrap();
		assert_eq!(json["type"], "session_finished");
		assert_eq!(json["session_id"], 7);
	}
}
