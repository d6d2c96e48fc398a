mod feature;
mod service;
mod simulate;

use std::sync::Arc;

use capture::{CaptureContext, CaptureManager, Dispatcher, ManagerConfig};
use capture_runtime::{LocalService, LocalServiceConfig, LocalServiceHandle};
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::cli::{Cli, Commands, FeatureAction};
use crate::error::Result;

pub async fn dispatch(cli: Cli) -> Result<()> {
	let config = load_config(&cli)?;
	let handle = start_service(&config);

	let result = run(cli, &config, &handle).await;
	handle.shutdown();
	result
}

async fn run(cli: Cli, config: &ManagerConfig, handle: &LocalServiceHandle) -> Result<()> {
	let client = handle.connect(cli.package.clone())?;
	let manager = Arc::new(CaptureManager::with_config(
		CaptureContext::new(cli.package.clone(), 0),
		Arc::new(client),
		Dispatcher::spawn(&Handle::current()),
		config,
	));

	match cli.command {
		Commands::Simulate { disable, stop, activity } => {
			simulate::execute(
				&manager,
				handle,
				simulate::SimulateOptions {
					package: &cli.package,
					activity: &activity,
					disable,
					stop,
				},
			)
			.await
		}
		Commands::Feature { action } => match action {
			FeatureAction::Get => feature::get(&manager).await,
			FeatureAction::Set { enabled } => feature::set(&manager, enabled).await,
		},
		Commands::Service => service::execute(&manager).await,
	}
}

fn load_config(cli: &Cli) -> Result<ManagerConfig> {
	let config = match &cli.config {
		Some(path) => ManagerConfig::from_file(path)?,
		None => ManagerConfig::default(),
	};
	let config = config.with_env_overrides()?;
	debug!(target = "capturectl", ?config, "configuration loaded");
	Ok(config)
}

fn start_service(config: &ManagerConfig) -> LocalServiceHandle {
	let (service, handle) = LocalService::new(LocalServiceConfig {
		service_explicitly_enabled: config.service_explicitly_enabled,
		..LocalServiceConfig::default()
	});
	tokio::spawn(service.run());
	info!(target = "capturectl", "in-process capture service spawned");
	handle
}

/// Runs a blocking manager call on the blocking pool.
async fn blocking<T, F>(manager: &Arc<CaptureManager>, call: F) -> Result<T>
where
	T: Send + 'static,
	F: FnOnce(&CaptureManager) -> capture::Result<T> + Send + 'static,
{
	let manager = Arc::clone(manager);
	Ok(tokio::task::spawn_blocking(move || call(&manager)).await??)
}
