use std::sync::Arc;

use capture::CaptureManager;
use serde_json::json;

use super::blocking;
use crate::error::Result;

pub async fn get(manager: &Arc<CaptureManager>) -> Result<()> {
	let enabled = blocking(manager, |m| m.is_feature_enabled()).await?;
	println!("{}", json!({ "enabled": enabled }));
	Ok(())
}

pub async fn set(manager: &Arc<CaptureManager>, enabled: bool) -> Result<()> {
	let acknowledged = blocking(manager, move |m| m.set_feature_enabled(enabled)).await?;
	println!("{}", json!({ "enabled": enabled, "acknowledged": acknowledged }));
	Ok(())
}
