//! Identity and request types shared with the capture service.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fully qualified name of an app component (`package/class`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentName {
	pub package_name: String,
	pub class_name: String,
}

impl ComponentName {
	pub fn new(package_name: impl Into<String>, class_name: impl Into<String>) -> Self {
		Self {
			package_name: package_name.into(),
			class_name: class_name.into(),
		}
	}

	/// Returns `true` when both the package and class are non-empty.
	pub fn is_valid(&self) -> bool {
		!self.package_name.trim().is_empty() && !self.class_name.trim().is_empty()
	}

	/// Short form with the package prefix collapsed (`pkg/.Class`).
	pub fn to_short_string(&self) -> String {
		match self.class_name.strip_prefix(&self.package_name) {
			Some(rest) if rest.starts_with('.') => format!("{}/{}", self.package_name, rest),
			_ => self.to_string(),
		}
	}
}

impl fmt::Display for ComponentName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.package_name, self.class_name)
	}
}

/// Opaque token identifying the app window a session is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityToken(String);

impl ActivityToken {
	pub fn new(token: impl Into<String>) -> Self {
		Self(token.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl fmt::Display for ActivityToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Identifier the app uses to scope captured content (a chat, a document).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocusId(String);

impl LocusId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for LocusId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// One locus entry of a [`UserDataRemovalRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocusIdRequest {
	pub locus_id: LocusId,
	/// Also remove data for every locus nested under this one.
	pub recursive: bool,
}

/// Asks the service to delete user data it captured for this app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDataRemovalRequest {
	pub package_name: String,
	pub for_everything: bool,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub locus_ids: Vec<LocusIdRequest>,
}

impl UserDataRemovalRequest {
	/// Request removal of everything captured for `package_name`.
	pub fn for_everything(package_name: impl Into<String>) -> Self {
		Self {
			package_name: package_name.into(),
			for_everything: true,
			locus_ids: Vec::new(),
		}
	}

	/// Start an empty, locus-scoped request; add ids with [`Self::with_locus_id`].
	pub fn for_locus_ids(package_name: impl Into<String>) -> Self {
		Self {
			package_name: package_name.into(),
			for_everything: false,
			locus_ids: Vec::new(),
		}
	}

	pub fn with_locus_id(mut self, locus_id: LocusId, recursive: bool) -> Self {
		self.locus_ids.push(LocusIdRequest { locus_id, recursive });
		self
	}

	/// A request that names no data at all.
	pub fn is_empty(&self) -> bool {
		!self.for_everything && self.locus_ids.is_empty()
	}
}
