use std::sync::Arc;

use capture::CaptureManager;
use serde_json::json;

use super::blocking;
use crate::error::Result;

pub async fn execute(manager: &Arc<CaptureManager>) -> Result<()> {
	let component = blocking(manager, |m| m.get_service_component_name()).await?;
	println!(
		"{}",
		json!({
			"component": component.as_ref().map(|name| name.to_string()),
			"enabled": manager.is_enabled(),
		})
	);
	Ok(())
}
