use super::{BrokerError, ConnectionManager, Connector, Envelope, SeriesMessage};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

/// The first attempt plus exactly one reconnect-and-retry.
pub const MAX_ATTEMPTS: usize = 2;

/// Publishes series identifiers to the queue.
///
/// Implementations never propagate errors: every failure collapses to `false`.
#[async_trait]
pub trait SeriesPublisher: Send + Sync {
	async fn publish(&self, message: &SeriesMessage) -> bool;

	async fn is_live(&self) -> bool;
}

/// Publishes messages over the connection held by a [`ConnectionManager`].
///
/// The manager sits behind a mutex, so concurrent publishes are serialized and never
/// interleave writes on the shared channel. Liveness checks never wait for a publish.
pub struct Publisher<C: Connector> {
	manager: Mutex<ConnectionManager<C>>,
	live: Arc<AtomicBool>,
}

impl<C: Connector> Publisher<C> {
	pub fn new(manager: ConnectionManager<C>) -> Self {
		Self {
			live: manager.live_flag(),
			manager: Mutex::new(manager),
		}
	}

	pub(super) async fn connect(&self) -> Result<(), BrokerError> {
		self.manager.lock().await.connect().await
	}

	pub(super) async fn disconnect(&self) {
		self.manager.lock().await.disconnect().await;
	}

	async fn attempt(
		manager: &mut ConnectionManager<C>,
		envelope: &Envelope,
		attempt: usize,
	) -> Result<(), BrokerError> {
		if attempt == 1 {
			manager.ensure_live().await?;
		} else {
			// The session may claim to be open although the broker dropped it
			manager.connect().await?;
		}
		manager.send(envelope).await
	}
}

#[async_trait]
impl<C: Connector> SeriesPublisher for Publisher<C> {
	#[instrument(skip_all, fields(serie = %message.serie))]
	async fn publish(&self, message: &SeriesMessage) -> bool {
		let mut manager = self.manager.lock().await;

		let envelope = match Envelope::json(manager.queue(), message) {
			Ok(envelope) => envelope,
			Err(err) => {
				error!("Failed to publish series: {err}");
				return false;
			}
		};

		for attempt in 1..=MAX_ATTEMPTS {
			match Self::attempt(&mut manager, &envelope, attempt).await {
				Ok(()) => {
					info!(attempt, queue = envelope.routing_key, "Published series");
					return true;
				}
				Err(err) if err.is_connection() && attempt < MAX_ATTEMPTS => {
					warn!(attempt, "Connection error while publishing, retrying: {err}");
				}
				Err(err) => {
					error!(attempt, "Failed to publish series: {err}");
					return false;
				}
			}
		}

		false
	}

	async fn is_live(&self) -> bool {
		match self.manager.try_lock() {
			Ok(manager) => manager.is_live(),
			// A publish holds the manager, possibly while reconnecting
			Err(_) => self.live.load(Ordering::Acquire),
		}
	}
}
