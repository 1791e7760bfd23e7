use super::{BrokerError, Connector, Envelope, Session};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Owns the single connection/channel pair to the broker.
///
/// The pair is (re)established lazily. At most one session is held at a time: a new
/// [`connect`](Self::connect) always closes the previous session first.
pub struct ConnectionManager<C: Connector> {
	connector: C,
	queue: String,
	session: Option<C::Session>,
	// Cleared while no session is installed, including during a reconnect
	live: Arc<AtomicBool>,
}

impl<C: Connector> ConnectionManager<C> {
	pub fn new(connector: C, queue: String) -> Self {
		Self {
			connector,
			queue,
			session: None,
			live: Arc::new(AtomicBool::new(false)),
		}
	}

	/// Last known liveness, readable without access to the manager.
	///
	/// Only reflects connects and disconnects. A session dropped by the broker stays `true`
	/// until the next [`ensure_live`](Self::ensure_live).
	pub fn live_flag(&self) -> Arc<AtomicBool> {
		Arc::clone(&self.live)
	}

	pub fn queue(&self) -> &str {
		&self.queue
	}

	/// Opens a new session and declares the queue on it.
	pub async fn connect(&mut self) -> Result<(), BrokerError> {
		self.disconnect().await;

		info!(queue = self.queue, "Connecting to broker");
		let session = self.connector.open().await?;
		if let Err(err) = session.declare_queue(&self.queue).await {
			session.close().await;
			return Err(err);
		}

		self.session = Some(session);
		self.live.store(true, Ordering::Release);
		info!(queue = self.queue, "Connected to broker");
		Ok(())
	}

	/// Closes the current session, if any.
	pub async fn disconnect(&mut self) {
		self.live.store(false, Ordering::Release);
		if let Some(session) = self.session.take() {
			session.close().await;
			info!("Closed broker connection");
		}
	}

	pub fn is_live(&self) -> bool {
		self.session.as_ref().is_some_and(Session::is_open)
	}

	/// Reconnects unless the current session is still open.
	pub async fn ensure_live(&mut self) -> Result<(), BrokerError> {
		if self.is_live() {
			return Ok(());
		}

		if self.session.is_some() {
			warn!("Broker connection lost, reconnecting");
		}
		self.connect().await
	}

	pub async fn send(&self, envelope: &Envelope) -> Result<(), BrokerError> {
		match &self.session {
			Some(session) => session.send(envelope).await,
			None => Err(BrokerError::connection("not connected")),
		}
	}
}
