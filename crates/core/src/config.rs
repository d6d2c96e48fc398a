//! Manager configuration loaded from JSON.
//!
//! ```json
//! {
//!   "sync_calls_timeout_ms": 5000,
//!   "service_explicitly_enabled": null
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Timeout for blocking calls to the capture service.
pub const DEFAULT_SYNC_CALLS_TIMEOUT_MS: u64 = 5000;

/// Environment variable overriding [`ManagerConfig::sync_calls_timeout_ms`].
pub const SYNC_TIMEOUT_ENV: &str = "CAPTURE_SYNC_TIMEOUT_MS";

/// Property name of the service kill switch.
pub const SERVICE_EXPLICITLY_ENABLED_PROPERTY: &str = "service_explicitly_enabled";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManagerConfig {
	/// Upper bound for every blocking service call.
	pub sync_calls_timeout_ms: u64,
	/// `None` leaves the decision to whether a service implementation exists;
	/// `Some(false)` turns the service off, `Some(true)` forces it on.
	pub service_explicitly_enabled: Option<bool>,
}

impl Default for ManagerConfig {
	fn default() -> Self {
		Self {
			sync_calls_timeout_ms: DEFAULT_SYNC_CALLS_TIMEOUT_MS,
			service_explicitly_enabled: None,
		}
	}
}

impl ManagerConfig {
	pub fn from_json(json: &str) -> Result<Self> {
		let config: ManagerConfig = serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
		config.validate()
	}

	pub fn from_file(path: &Path) -> Result<Self> {
		debug!(target = "capture.config", path = %path.display(), "loading manager config");
		let json = std::fs::read_to_string(path)?;
		Self::from_json(&json)
	}

	/// Applies overrides from the process environment.
	pub fn with_env_overrides(self) -> Result<Self> {
		self.with_overrides(std::env::var(SYNC_TIMEOUT_ENV).ok().as_deref())
	}

	fn with_overrides(mut self, sync_timeout: Option<&str>) -> Result<Self> {
		if let Some(raw) = sync_timeout {
			self.sync_calls_timeout_ms = raw
				.trim()
				.parse()
				.map_err(|_| Error::Config(format!("{SYNC_TIMEOUT_ENV} must be a number of milliseconds, got {raw:?}")))?;
		}
		self.validate()
	}

	pub fn sync_calls_timeout(&self) -> Duration {
		Duration::from_millis(self.sync_calls_timeout_ms)
	}

	fn validate(self) -> Result<Self> {
		if self.sync_calls_timeout_ms == 0 {
			return Err(Error::Config("sync_calls_timeout_ms must be greater than zero".to_string()));
		}
		Ok(self)
	}
}
