use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error(transparent)]
	Capture(#[from] capture::Error),

	#[error(transparent)]
	Transport(#[from] capture::TransportError),

	#[error("background task failed: {0}")]
	Join(#[from] tokio::task::JoinError),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}
