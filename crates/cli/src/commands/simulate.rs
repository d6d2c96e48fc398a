use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use capture::{ActivityToken, CaptureFlags, CaptureManager, ComponentName, FlushReason};
use capture_runtime::LocalServiceHandle;
use tracing::info;

use crate::error::Result;

const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);
const SETTLE_POLL: Duration = Duration::from_millis(10);

pub struct SimulateOptions<'a> {
	pub package: &'a str,
	pub activity: &'a str,
	pub disable: bool,
	pub stop: bool,
}

pub async fn execute(manager: &Arc<CaptureManager>, handle: &LocalServiceHandle, opts: SimulateOptions<'_>) -> Result<()> {
	let class_name = if opts.activity.starts_with('.') {
		format!("{}{}", opts.package, opts.activity)
	} else {
		opts.activity.to_string()
	};
	let component = ComponentName::new(opts.package, class_name);

	if opts.disable {
		manager.set_enabled(false);
	}

	info!(target = "capturectl", component = %component.to_short_string(), "starting activity");
	manager.on_start(ActivityToken::new(format!("{}@1", component.to_short_string())), component, CaptureFlags::empty())?;
	manager.flush(FlushReason::ViewRootEntered);

	let session = manager.get_or_create_session();
	let session_id = session.id();
	if !session.is_disabled() {
		settle(|| handle.session(session_id).is_some()).await?;
	}

	if opts.stop {
		manager.on_stop();
		if !session.is_disabled() {
			settle(|| handle.session(session_id).is_some_and(|record| record.finished)).await?;
		}
	}

	print!("{}", manager.dump_to_string());
	println!("LocalService");
	println!("  Feature enabled: {}", handle.feature_enabled());
	for record in handle.sessions() {
		println!(
			"  Session {}: caller={} state={} finished={}",
			record.start.session_id, record.caller_package, record.state, record.finished
		);
	}
	println!("  Event batches: {}", handle.event_batches().len());
	Ok(())
}

async fn settle(mut done: impl FnMut() -> bool) -> Result<()> {
	let poll = async {
		while !done() {
			tokio::time::sleep(SETTLE_POLL).await;
		}
	};
	tokio::time::timeout(SETTLE_TIMEOUT, poll)
		.await
		.map_err(|_| anyhow!("capture service did not observe the session within {SETTLE_TIMEOUT:?}").into())
}
