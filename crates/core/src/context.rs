use std::fmt;

/// Identity of the app context a manager serves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaptureContext {
	package_name: String,
	user_id: u32,
}

impl CaptureContext {
	pub fn new(package_name: impl Into<String>, user_id: u32) -> Self {
		Self {
			package_name: package_name.into(),
			user_id,
		}
	}

	pub fn package_name(&self) -> &str {
		&self.package_name
	}

	pub fn user_id(&self) -> u32 {
		self.user_id
	}
}

impl fmt::Display for CaptureContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "CaptureContext({}, user={})", self.package_name, self.user_id)
	}
}
