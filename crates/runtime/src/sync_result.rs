//! Single-use, timeout-bounded reply channel.
//!
//! Requests to the capture service are one-way. To make a blocking call the
//! client allocates a channel, hands the [`ResultSink`] to the service along
//! with the request, and blocks on the [`SyncResultReceiver`] until the
//! service answers or the deadline passes.
//!
//! # Message Flow
//!
//! 1. Caller creates a channel with [`SyncResultReceiver::channel`]
//! 2. The sink travels with the request to the service
//! 3. The service completes the sink exactly once (or drops it)
//! 4. Caller wakes with the reply, a remote failure, or a timeout
//!
//! A sink dropped without a reply wakes the caller with
//! [`SyncResultError::Remote`] instead of leaving it to time out.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::SyncResultError;

/// A reply delivered by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
	/// Integer result code.
	pub code: i32,
	/// Optional structured payload.
	pub payload: Option<Value>,
}

#[derive(Debug, Clone)]
enum Outcome {
	Reply(Reply),
	Failed(String),
	Abandoned,
}

struct Shared {
	slot: Mutex<Option<Outcome>>,
	ready: Condvar,
}

impl Shared {
	fn complete(&self, outcome: Outcome) {
		let mut slot = self.slot.lock();
		if slot.is_none() {
			*slot = Some(outcome);
			self.ready.notify_all();
		}
	}
}

/// Receiving half. Consumed by the blocking `await_*` calls.
pub struct SyncResultReceiver {
	shared: Arc<Shared>,
	timeout: Duration,
}

impl SyncResultReceiver {
	/// Creates a connected sink/receiver pair with a fixed timeout.
	pub fn channel(timeout: Duration) -> (ResultSink, SyncResultReceiver) {
		let shared = Arc::new(Shared {
			slot: Mutex::new(None),
			ready: Condvar::new(),
		});
		let sink = ResultSink {
			shared: Some(Arc::clone(&shared)),
		};
		(sink, SyncResultReceiver { shared, timeout })
	}

	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	/// Blocks until the integer result code arrives.
	pub fn await_int_result(self) -> Result<i32, SyncResultError> {
		self.wait().map(|reply| reply.code)
	}

	/// Blocks until a reply arrives and decodes its payload.
	///
	/// A reply without a payload (or with a `null` one) yields `Ok(None)`.
	pub fn await_typed_result<T: DeserializeOwned>(self) -> Result<Option<T>, SyncResultError> {
		match self.wait()?.payload {
			None | Some(Value::Null) => Ok(None),
			Some(value) => Ok(Some(serde_json::from_value(value)?)),
		}
	}

	/// Non-blocking peek at the integer result.
	///
	/// Returns `None` while the service has not answered yet. The outcome is
	/// left in place, so repeated calls observe the same value.
	pub fn try_int_result(&self) -> Option<Result<i32, SyncResultError>> {
		let slot = self.shared.slot.lock();
		(*slot).clone().map(|outcome| resolve(outcome).map(|reply| reply.code))
	}

	fn wait(self) -> Result<Reply, SyncResultError> {
		let deadline = Instant::now() + self.timeout;
		let mut slot = self.shared.slot.lock();
		while slot.is_none() {
			if self.shared.ready.wait_until(&mut slot, deadline).timed_out() && slot.is_none() {
				debug!(target = "capture.sync", timeout_ms = self.timeout.as_millis() as u64, "sync call timed out");
				return Err(SyncResultError::Timeout(self.timeout));
			}
		}
		match slot.take() {
			Some(outcome) => resolve(outcome),
			None => Err(SyncResultError::Timeout(self.timeout)),
		}
	}
}

impl fmt::Debug for SyncResultReceiver {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SyncResultReceiver")
			.field("timeout", &self.timeout)
			.field("completed", &self.shared.slot.lock().is_some())
			.finish()
	}
}

fn resolve(outcome: Outcome) -> Result<Reply, SyncResultError> {
	match outcome {
		Outcome::Reply(reply) => Ok(reply),
		Outcome::Failed(message) => Err(SyncResultError::Remote(message)),
		Outcome::Abandoned => Err(SyncResultError::Remote("reply sink dropped without a result".to_string())),
	}
}

/// Sending half, handed to the service with the request.
///
/// Every completion method consumes the sink, so at most one reply is ever
/// delivered.
pub struct ResultSink {
	shared: Option<Arc<Shared>>,
}

impl ResultSink {
	/// Completes with a bare result code.
	pub fn send_int(mut self, code: i32) {
		self.complete(Outcome::Reply(Reply { code, payload: None }));
	}

	/// Completes with a result code and a structured payload.
	pub fn send_reply(mut self, reply: Reply) {
		self.complete(Outcome::Reply(reply));
	}

	/// Completes with a serialized payload and the `TRUE` result code.
	pub fn send_typed<T: Serialize>(mut self, value: &T) {
		let outcome = match serde_json::to_value(value) {
			Ok(payload) => Outcome::Reply(Reply {
				code: capture_protocol::RESULT_CODE_TRUE,
				payload: Some(payload),
			}),
			Err(e) => Outcome::Failed(format!("failed to encode reply: {e}")),
		};
		self.complete(outcome);
	}

	/// Completes with a remote failure.
	pub fn fail(mut self, message: impl Into<String>) {
		self.complete(Outcome::Failed(message.into()));
	}

	fn complete(&mut self, outcome: Outcome) {
		if let Some(shared) = self.shared.take() {
			shared.complete(outcome);
		}
	}
}

impl Drop for ResultSink {
	fn drop(&mut self) {
		self.complete(Outcome::Abandoned);
	}
}

impl fmt::Debug for ResultSink {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ResultSink").field("pending", &self.shared.is_some()).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use capture_protocol::ComponentName;
	use std::thread;

	#[test]
	fn reply_sent_before_wait_is_observed() {
		let (sink, receiver) = SyncResultReceiver::channel(Duration::from_secs(1));
		sink.send_int(2);
		assert_eq!(receiver.await_int_result().unwrap(), 2);
	}

	#[test]
	fn reply_from_another_thread_wakes_waiter() {
		let (sink, receiver) = SyncResultReceiver::channel(Duration::from_secs(5));
		let handle = thread::spawn(move || {
			thread::sleep(Duration::from_millis(20));
			sink.send_int(1);
		});
		assert_eq!(receiver.await_int_result().unwrap(), 1);
		handle.join().unwrap();
	}

	#[test]
	fn timeout_fires_no_earlier_than_deadline() {
		let timeout = Duration::from_millis(60);
		let (sink, receiver) = SyncResultReceiver::channel(timeout);

		let started = Instant::now();
		let err = receiver.await_int_result().unwrap_err();
		let elapsed = started.elapsed();

		assert!(err.is_timeout());
		assert!(elapsed >= timeout, "returned after {elapsed:?}");
		assert!(elapsed < Duration::from_secs(5));
		drop(sink);
	}

	#[test]
	fn dropped_sink_reports_remote_failure() {
		let (sink, receiver) = SyncResultReceiver::channel(Duration::from_secs(5));
		drop(sink);
		match receiver.await_int_result() {
			Err(SyncResultError::Remote(msg)) => assert!(msg.contains("dropped")),
			other => panic!("expected remote failure, got {other:?}"),
		}
	}

	#[test]
	fn failed_sink_reports_message() {
		let (sink, receiver) = SyncResultReceiver::channel(Duration::from_secs(1));
		sink.fail("boom");
		match receiver.await_int_result() {
			Err(SyncResultError::Remote(msg)) => assert_eq!(msg, "boom"),
			other => panic!("expected remote failure, got {other:?}"),
		}
	}

	#[test]
	fn typed_result_round_trips_payload() {
		let (sink, receiver) = SyncResultReceiver::channel(Duration::from_secs(1));
		sink.send_typed(&Some(ComponentName::new("pkg", "pkg.Service")));
		let name: Option<ComponentName> = receiver.await_typed_result().unwrap();
		assert_eq!(name, Some(ComponentName::new("pkg", "pkg.Service")));
	}

	#[test]
	fn typed_result_null_payload_is_none() {
		let (sink, receiver) = SyncResultReceiver::channel(Duration::from_secs(1));
		sink.send_typed(&Option::<ComponentName>::None);
		let name: Option<ComponentName> = receiver.await_typed_result().unwrap();
		assert!(name.is_none());
	}

	#[test]
	fn typed_result_mismatch_is_decode_error() {
		let (sink, receiver) = SyncResultReceiver::channel(Duration::from_secs(1));
		sink.send_typed(&"not a component");
		let result: Result<Option<ComponentName>, _> = receiver.await_typed_result();
		assert!(matches!(result, Err(SyncResultError::Decode(_))));
	}

	#[test]
	fn try_int_result_peeks_without_consuming() {
		let (sink, receiver) = SyncResultReceiver::channel(Duration::from_secs(1));
		assert!(receiver.try_int_result().is_none());

		sink.send_int(0x4);
		assert_eq!(receiver.try_int_result().unwrap().unwrap(), 0x4);
		assert_eq!(receiver.try_int_result().unwrap().unwrap(), 0x4);
	}
}
