use super::{BrokerError, Connector, Envelope, Session};
use crate::config::BrokerConfig;
use lapin::options::{BasicPublishOptions, QueueDeclareOptions};
use lapin::protocol::constants::REPLY_SUCCESS;
use lapin::protocol::{AMQPErrorKind, AMQPHardError};
use lapin::types::FieldTable;
use lapin::uri::{AMQPAuthority, AMQPQueryString, AMQPScheme, AMQPUri, AMQPUserInfo};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tracing::{debug, warn};

/// AMQP delivery mode for messages that survive a broker restart.
const PERSISTENT: u8 = 2;

/// The default (nameless) exchange routes by queue name.
const DEFAULT_EXCHANGE: &str = "";

/// Opens AMQP connections with the configured credentials and heartbeat.
pub struct AmqpConnector {
	config: BrokerConfig,
}

impl AmqpConnector {
	pub const fn new(config: BrokerConfig) -> Self {
		Self { config }
	}

	fn uri(&self) -> AMQPUri {
		// Timeouts beyond u64::MAX milliseconds are clamped, lapin takes milliseconds as u64
		let timeout_ms = u64::try_from(self.config.blocked_connection_timeout().as_millis())
			.unwrap_or(u64::MAX);
		AMQPUri {
			scheme: AMQPScheme::AMQP,
			authority: AMQPAuthority {
				userinfo: AMQPUserInfo {
					username: self.config.user.clone(),
					password: self.config.password.clone(),
				},
				host: self.config.host.clone(),
				port: self.config.port,
			},
			vhost: self.config.vhost.clone(),
			query: AMQPQueryString {
				heartbeat: Some(self.config.heartbeat),
				connection_timeout: Some(timeout_ms),
				..AMQPQueryString::default()
			},
		}
	}
}

impl Connector for AmqpConnector {
	type Session = AmqpSession;

	async fn open(&self) -> Result<AmqpSession, BrokerError> {
		let properties = ConnectionProperties::default()
			.with_connection_name(crate::SERVER_NAME.into());

		// Unreachable brokers and rejected credentials are both connection-class
		let connection = Connection::connect_uri(self.uri(), properties)
			.await
			.map_err(BrokerError::connection)?;
		let channel = connection
			.create_channel()
			.await
			.map_err(BrokerError::connection)?;

		debug!(
			address = self.config.address(),
			channel = channel.id(),
			"Opened AMQP channel"
		);
		Ok(AmqpSession {
			connection,
			channel,
		})
	}
}

pub struct AmqpSession {
	connection: Connection,
	channel: Channel,
}

impl Session for AmqpSession {
	fn is_open(&self) -> bool {
		self.connection.status().connected() && self.channel.status().connected()
	}

	async fn declare_queue(&self, name: &str) -> Result<(), BrokerError> {
		let queue = self
			.channel
			.queue_declare(name, queue_options(), FieldTable::default())
			.await?;

		debug!(
			queue = name,
			messages = queue.message_count(),
			"Declared durable queue"
		);
		Ok(())
	}

	async fn send(&self, envelope: &Envelope) -> Result<(), BrokerError> {
		self.channel
			.basic_publish(
				DEFAULT_EXCHANGE,
				&envelope.routing_key,
				BasicPublishOptions::default(),
				&envelope.payload,
				properties(envelope),
			)
			.await?
			.await?;
		Ok(())
	}

	async fn close(self) {
		if self.channel.status().connected() {
			if let Err(err) = self.channel.close(REPLY_SUCCESS, "Gateway disconnecting").await {
				warn!("Failed to close AMQP channel: {err}");
			}
		}
		if self.connection.status().connected() {
			if let Err(err) = self
				.connection
				.close(REPLY_SUCCESS, "Gateway disconnecting")
				.await
			{
				warn!("Failed to close AMQP connection: {err}");
			}
		}
	}
}

fn queue_options() -> QueueDeclareOptions {
	QueueDeclareOptions {
		durable: true,
		..QueueDeclareOptions::default()
	}
}

fn properties(envelope: &Envelope) -> BasicProperties {
	let properties = BasicProperties::default().with_content_type(envelope.content_type.into());
	if envelope.persistent {
		properties.with_delivery_mode(PERSISTENT)
	} else {
		properties
	}
}

impl From<lapin::Error> for BrokerError {
	fn from(error: lapin::Error) -> Self {
		let message = error.to_string();
		match &error {
			lapin::Error::IOError(_)
			| lapin::Error::InvalidConnectionState(_)
			| lapin::Error::InvalidChannelState(_)
			| lapin::Error::InvalidChannel(_) => Self::Connection(message),
			lapin::Error::ProtocolError(amqp_error) => match amqp_error.kind() {
				AMQPErrorKind::Hard(
					AMQPHardError::CONNECTIONFORCED
					| AMQPHardError::CHANNELERROR
					| AMQPHardError::FRAMEERROR
					| AMQPHardError::UNEXPECTEDFRAME
					| AMQPHardError::RESOURCEERROR
					| AMQPHardError::INTERNALERROR,
				) => Self::Connection(message),
				// Access refused, not found, precondition failed, ...
				_ => Self::Protocol(message),
			},
			_ => Self::Protocol(message),
		}
	}
}
