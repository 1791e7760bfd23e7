use super::{BrokerError, Connector, Publisher};
use async_trait::async_trait;

/// Process-wide hooks bracketing the request-serving lifetime.
#[async_trait]
pub trait Lifecycle: Send + Sync {
	/// Connects to the broker. A failure here is fatal for the process.
	async fn on_startup(&self) -> Result<(), BrokerError>;

	async fn on_shutdown(&self);
}

#[async_trait]
impl<C: Connector> Lifecycle for Publisher<C> {
	async fn on_startup(&self) -> Result<(), BrokerError> {
		self.connect().await
	}

	async fn on_shutdown(&self) {
		self.disconnect().await;
	}
}
