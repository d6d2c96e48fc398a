//! Runtime plumbing between the capture manager and the capture service.
//!
//! * [`sync_result`]: single-use, timeout-bounded reply channel used to make
//!   blocking calls over the one-way transport
//! * [`service`]: the [`RemoteService`] seam the manager talks through
//! * [`dispatcher`]: serial executor for session work
//! * [`channel_client`] and [`local_service`]: an in-process service reached
//!   over a tokio channel, used by the CLI and by tests

pub mod channel_client;
pub mod dispatcher;
pub mod error;
pub mod local_service;
pub mod service;
pub mod sync_result;

pub use channel_client::{ChannelServiceClient, ServiceEnvelope, ServiceRequest};
pub use dispatcher::Dispatcher;
pub use error::{SyncResultError, TransportError};
pub use local_service::{LocalService, LocalServiceConfig, LocalServiceHandle};
pub use service::RemoteService;
pub use sync_result::{Reply, ResultSink, SyncResultReceiver};
