use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;

pub mod amqp;
pub mod connection;
pub mod lifecycle;
pub mod publisher;

#[cfg(test)]
pub(crate) mod fake;

pub use connection::ConnectionManager;
pub use lifecycle::Lifecycle;
pub use publisher::{Publisher, SeriesPublisher};

const CONTENT_TYPE_JSON: &str = "application/json";

#[derive(Debug, Error)]
pub enum BrokerError {
	/// The transport or session is unusable: broker unreachable, credentials rejected,
	/// connection or channel closed.
	#[error("Broker connection error: {0}")]
	Connection(String),
	#[error("Failed to serialize message: {0}")]
	Serialization(#[from] serde_json::Error),
	/// The broker rejected an operation on an otherwise healthy session.
	#[error("Broker rejected the operation: {0}")]
	Protocol(String),
}

impl BrokerError {
	pub fn connection(error: impl ToString) -> Self {
		Self::Connection(error.to_string())
	}

	/// Connection-class errors are the only ones worth a reconnect.
	pub const fn is_connection(&self) -> bool {
		matches!(self, Self::Connection(_))
	}
}

/// The payload published for a selected series.
///
/// Patient demographics are never part of the payload, they are persisted separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesMessage {
	pub serie: String,
}

impl SeriesMessage {
	pub fn new(serie: impl Into<String>) -> Self {
		Self {
			serie: serie.into(),
		}
	}
}

/// A serialized message ready to be handed to a [`Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
	pub routing_key: String,
	pub payload: Vec<u8>,
	pub content_type: &'static str,
	/// Survive a broker restart (delivery mode 2).
	pub persistent: bool,
}

impl Envelope {
	pub fn json<T: Serialize>(routing_key: &str, message: &T) -> Result<Self, BrokerError> {
		Ok(Self {
			routing_key: routing_key.to_owned(),
			payload: serde_json::to_vec(message)?,
			content_type: CONTENT_TYPE_JSON,
			persistent: true,
		})
	}
}

/// An open connection/channel pair.
pub trait Session: Send + Sync + Sized {
	/// Local check whether both the connection and the channel are open.
	fn is_open(&self) -> bool;

	/// Creates the durable queue if it does not exist yet.
	fn declare_queue(&self, name: &str) -> impl Future<Output = Result<(), BrokerError>> + Send;

	/// Publishes the envelope through the default exchange.
	fn send(&self, envelope: &Envelope) -> impl Future<Output = Result<(), BrokerError>> + Send;

	/// Closes the channel, then the connection. Never fails.
	fn close(self) -> impl Future<Output = ()> + Send;
}

/// Opens new sessions to the broker.
pub trait Connector: Send + Sync {
	type Session: Session;

	fn open(&self) -> impl Future<Output = Result<Self::Session, BrokerError>> + Send;
}
