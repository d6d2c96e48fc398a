//! Result codes delivered through sync result channels.

/// The service answered "yes" (or acknowledged the request).
pub const RESULT_CODE_TRUE: i32 = 1;
/// The service answered "no".
pub const RESULT_CODE_FALSE: i32 = 2;
/// The caller is not the app that owns the capture service for its user.
pub const RESULT_CODE_NOT_SERVICE: i32 = -1;

/// Decoded form of a raw integer result code.
///
/// Any value outside the three known codes is kept as [`ResultCode::Unknown`]
/// so callers can report the corrupt value instead of guessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
	True,
	False,
	NotService,
	Unknown(i32),
}

impl ResultCode {
	/// Returns the raw wire value.
	pub fn code(self) -> i32 {
		match self {
			ResultCode::True => RESULT_CODE_TRUE,
			ResultCode::False => RESULT_CODE_FALSE,
			ResultCode::NotService => RESULT_CODE_NOT_SERVICE,
			ResultCode::Unknown(code) => code,
		}
	}
}

impl From<i32> for ResultCode {
	fn from(code: i32) -> Self {
		match code {
			RESULT_CODE_TRUE => ResultCode::True,
			RESULT_CODE_FALSE => ResultCode::False,
			RESULT_CODE_NOT_SERVICE => ResultCode::NotService,
			other => ResultCode::Unknown(other),
		}
	}
}

impl From<bool> for ResultCode {
	fn from(value: bool) -> Self {
		if value { ResultCode::True } else { ResultCode::False }
	}
}
