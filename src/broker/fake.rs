//! In-memory broker used to exercise the connection and publish paths.

use super::{BrokerError, Connector, Envelope, Session};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub enum Failure {
	Connection,
	Protocol,
}

#[derive(Clone, Default)]
pub struct FakeBroker {
	inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
	unreachable: bool,
	// Sessions opened under an older generation are dead
	generation: u64,
	connections: usize,
	open_sessions: usize,
	declarations: usize,
	queues: HashMap<String, Vec<Envelope>>,
	send_failures: VecDeque<Failure>,
	open_delay: Option<Duration>,
}

impl FakeBroker {
	fn lock(&self) -> MutexGuard<'_, Inner> {
		self.inner.lock().unwrap()
	}

	/// Taking the broker down also kills every session.
	pub fn set_reachable(&self, reachable: bool) {
		let mut inner = self.lock();
		inner.unreachable = !reachable;
		if !reachable {
			inner.generation += 1;
		}
	}

	pub fn kill_sessions(&self) {
		self.lock().generation += 1;
	}

	/// Makes every following `open` take this long.
	pub fn set_open_delay(&self, delay: Duration) {
		self.lock().open_delay = Some(delay);
	}

	pub fn fail_next_send(&self, failure: Failure) {
		self.lock().send_failures.push_back(failure);
	}

	pub fn messages(&self, queue: &str) -> Vec<Envelope> {
		self.lock().queues.get(queue).cloned().unwrap_or_default()
	}

	pub fn has_queue(&self, queue: &str) -> bool {
		self.lock().queues.contains_key(queue)
	}

	pub fn connections(&self) -> usize {
		self.lock().connections
	}

	pub fn open_sessions(&self) -> usize {
		self.lock().open_sessions
	}

	pub fn declarations(&self) -> usize {
		self.lock().declarations
	}
}

impl Connector for FakeBroker {
	type Session = FakeSession;

	async fn open(&self) -> Result<FakeSession, BrokerError> {
		let delay = self.lock().open_delay;
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}

		let mut inner = self.lock();
		if inner.unreachable {
			return Err(BrokerError::connection("connection refused"));
		}
		inner.connections += 1;
		inner.open_sessions += 1;

		Ok(FakeSession {
			broker: self.clone(),
			generation: inner.generation,
		})
	}
}

pub struct FakeSession {
	broker: FakeBroker,
	generation: u64,
}

impl Session for FakeSession {
	fn is_open(&self) -> bool {
		let inner = self.broker.lock();
		!inner.unreachable && inner.generation == self.generation
	}

	async fn declare_queue(&self, name: &str) -> Result<(), BrokerError> {
		if !self.is_open() {
			return Err(BrokerError::connection("channel closed"));
		}
		let mut inner = self.broker.lock();
		inner.declarations += 1;
		inner.queues.entry(name.to_owned()).or_default();
		Ok(())
	}

	async fn send(&self, envelope: &Envelope) -> Result<(), BrokerError> {
		if !self.is_open() {
			return Err(BrokerError::connection("channel closed"));
		}
		let mut inner = self.broker.lock();
		let failure = inner.send_failures.pop_front();
		match failure {
			Some(Failure::Connection) => Err(BrokerError::connection("connection reset by peer")),
			Some(Failure::Protocol) => Err(BrokerError::Protocol(String::from("ACCESS_REFUSED"))),
			None => match inner.queues.get_mut(&envelope.routing_key) {
				Some(messages) => {
					messages.push(envelope.clone());
					Ok(())
				}
				None => Err(BrokerError::Protocol(String::from("NOT_FOUND"))),
			},
		}
	}

	async fn close(self) {
		self.broker.lock().open_sessions -= 1;
	}
}
