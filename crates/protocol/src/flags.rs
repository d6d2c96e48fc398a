//! Capture flags and session state bits.
//!
//! Both are plain bitsets on the wire. They are wrapped in newtypes so the
//! rest of the workspace talks in named predicates instead of raw integers.

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// Flags used when starting a capture session.
///
/// Flags only ever accumulate through [`CaptureFlags::merge`]; a bit goes
/// away only when explicitly [removed](CaptureFlags::remove).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaptureFlags(u32);

impl CaptureFlags {
	/// Capture was disabled by the app itself.
	pub const DISABLED_BY_APP: CaptureFlags = CaptureFlags(0x1);
	/// Capture was disabled because the window is marked secure.
	pub const DISABLED_BY_FLAG_SECURE: CaptureFlags = CaptureFlags(0x2);

	pub const fn empty() -> Self {
		CaptureFlags(0)
	}

	pub const fn from_bits(bits: u32) -> Self {
		CaptureFlags(bits)
	}

	pub const fn bits(self) -> u32 {
		self.0
	}

	pub const fn is_empty(self) -> bool {
		self.0 == 0
	}

	/// Bitwise union. Commutative and associative.
	#[must_use]
	pub const fn merge(self, other: CaptureFlags) -> Self {
		CaptureFlags(self.0 | other.0)
	}

	pub const fn contains(self, other: CaptureFlags) -> bool {
		self.0 & other.0 == other.0
	}

	pub fn insert(&mut self, other: CaptureFlags) {
		self.0 |= other.0;
	}

	pub fn remove(&mut self, other: CaptureFlags) {
		self.0 &= !other.0;
	}

	pub const fn is_disabled_by_app(self) -> bool {
		self.contains(Self::DISABLED_BY_APP)
	}

	pub const fn is_disabled_by_flag_secure(self) -> bool {
		self.contains(Self::DISABLED_BY_FLAG_SECURE)
	}
}

impl BitOr for CaptureFlags {
	type Output = CaptureFlags;

	fn bitor(self, rhs: Self) -> Self::Output {
		self.merge(rhs)
	}
}

impl fmt::Display for CaptureFlags {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)?;
		let mut names = Vec::new();
		if self.is_disabled_by_app() {
			names.push("DISABLED_BY_APP");
		}
		if self.is_disabled_by_flag_secure() {
			names.push("DISABLED_BY_FLAG_SECURE");
		}
		if !names.is_empty() {
			write!(f, " [{}]", names.join("|"))?;
		}
		Ok(())
	}
}

/// State bits reported by the service when a session starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionState(u32);

impl SessionState {
	pub const UNKNOWN: SessionState = SessionState(0);
	pub const ACTIVE: SessionState = SessionState(0x2);
	pub const DISABLED: SessionState = SessionState(0x4);
	pub const DUPLICATED_ID: SessionState = SessionState(0x8);
	pub const NO_SERVICE: SessionState = SessionState(0x10);
	pub const FLAG_SECURE: SessionState = SessionState(0x20);
	pub const BY_APP: SessionState = SessionState(0x40);
	pub const NO_RESPONSE: SessionState = SessionState(0x80);
	pub const INTERNAL_ERROR: SessionState = SessionState(0x100);

	pub const fn from_bits(bits: u32) -> Self {
		SessionState(bits)
	}

	pub const fn bits(self) -> u32 {
		self.0
	}

	pub const fn contains(self, other: SessionState) -> bool {
		other.0 != 0 && self.0 & other.0 == other.0
	}

	pub const fn is_disabled(self) -> bool {
		self.contains(Self::DISABLED)
	}
}

impl BitOr for SessionState {
	type Output = SessionState;

	fn bitor(self, rhs: Self) -> Self::Output {
		SessionState(self.0 | rhs.0)
	}
}

impl fmt::Display for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		const NAMES: [(SessionState, &str); 8] = [
			(SessionState::ACTIVE, "ACTIVE"),
			(SessionState::DISABLED, "DISABLED"),
			(SessionState::DUPLICATED_ID, "DUPLICATED_ID"),
			(SessionState::NO_SERVICE, "NO_SERVICE"),
			(SessionState::FLAG_SECURE, "FLAG_SECURE"),
			(SessionState::BY_APP, "BY_APP"),
			(SessionState::NO_RESPONSE, "NO_RESPONSE"),
			(SessionState::INTERNAL_ERROR, "INTERNAL_ERROR"),
		];

		if self.0 == 0 {
			return write!(f, "UNKNOWN");
		}
		let names: Vec<&str> = NAMES.iter().filter(|(bit, _)| self.contains(*bit)).map(|(_, name)| *name).collect();
		write!(f, "{} ({})", names.join("|"), self.0)
	}
}
