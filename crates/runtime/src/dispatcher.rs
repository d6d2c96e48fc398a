//! Serial executor for session work.
//!
//! Sessions post their one-way service calls here so that they run in the
//! order they were issued, off the caller's lifecycle path. Jobs must not
//! block: they share a single worker.

use std::fmt;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Clone)]
enum Inner {
	Immediate,
	Queue(mpsc::UnboundedSender<Job>),
}

/// Cheap, cloneable handle for posting jobs.
#[derive(Clone)]
pub struct Dispatcher {
	inner: Inner,
}

impl Dispatcher {
	/// Runs every job synchronously on the posting thread.
	pub fn immediate() -> Self {
		Self { inner: Inner::Immediate }
	}

	/// Spawns a worker task on `handle` that drains jobs in FIFO order.
	///
	/// The worker exits once every clone of the returned dispatcher is gone.
	pub fn spawn(handle: &Handle) -> Self {
		let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
		handle.spawn(async move {
			while let Some(job) = rx.recv().await {
				job();
			}
			debug!(target = "capture.dispatcher", "dispatcher worker stopped");
		});
		Self { inner: Inner::Queue(tx) }
	}

	/// Schedules `job`. Jobs posted after the worker has stopped are dropped.
	pub fn post<F>(&self, job: F)
	where
		F: FnOnce() + Send + 'static,
	{
		match &self.inner {
			Inner::Immediate => job(),
			Inner::Queue(tx) => {
				if tx.send(Box::new(job)).is_err() {
					warn!(target = "capture.dispatcher", "dispatcher worker is gone; dropping job");
				}
			}
		}
	}

	pub fn is_immediate(&self) -> bool {
		matches!(self.inner, Inner::Immediate)
	}
}

impl Default for Dispatcher {
	fn default() -> Self {
		Self::immediate()
	}
}

impl fmt::Debug for Dispatcher {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.inner {
			Inner::Immediate => f.write_str("Dispatcher(immediate)"),
			Inner::Queue(tx) => write!(f, "Dispatcher(queue, closed={})", tx.is_closed()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use parking_lot::Mutex;
	use std::sync::Arc;
	use std::time::Duration;

	#[test]
	fn immediate_runs_inline() {
		let hits = Arc::new(Mutex::new(0));
		let dispatcher = Dispatcher::immediate();
		let counter = Arc::clone(&hits);
		dispatcher.post(move || *counter.lock() += 1);
		assert_eq!(*hits.lock(), 1);
	}

	#[tokio::test]
	async fn queued_jobs_run_in_order() {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let dispatcher = Dispatcher::spawn(&Handle::current());

		for i in 0..16 {
			let seen = Arc::clone(&seen);
			dispatcher.post(move || seen.lock().push(i));
		}

		let (tx, rx) = tokio::sync::oneshot::channel();
		dispatcher.post(move || {
			let _ = tx.send(());
		});
		tokio::time::timeout(Duration::from_secs(1), rx).await.unwrap().unwrap();

		assert_eq!(*seen.lock(), (0..16).collect::<Vec<_>>());
	}
}
