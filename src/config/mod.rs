use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Deserializer};
use std::net::IpAddr;
use std::time::Duration;
use tracing::Level;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
	pub telemetry: TelemetryConfig,
	pub server: HttpServerConfig,
	pub broker: BrokerConfig,
	pub orthanc: ArchiveConfig,
	pub database: DatabaseConfig,
}

impl AppConfig {
	/// Loads the configuration from the built-in defaults, an optional `config.toml` in the
	/// working directory and the environment (in that order of precedence).
	pub fn new() -> Result<Self, ConfigError> {
		Self::builder()
			.add_source(File::with_name("config.toml").required(false))
			.add_source(gateway_environment())
			// BROKER_HOST, ORTHANC_URL, DATABASE_NAME, ... map onto their sections
			.add_source(section_environment("BROKER"))
			.add_source(section_environment("ORTHANC"))
			.add_source(section_environment("DATABASE"))
			.build()?
			.try_deserialize()
	}

	fn builder() -> ConfigBuilder<DefaultState> {
		Config::builder().add_source(File::from_str(
			include_str!("defaults.toml"),
			FileFormat::Toml,
		))
	}
}

fn gateway_environment() -> Environment {
	Environment::with_prefix("GATEWAY")
		.separator("_")
		.try_parsing(true)
}

fn section_environment(prefix: &str) -> Environment {
	Environment::with_prefix(prefix)
		.keep_prefix(true)
		.separator("_")
		.try_parsing(true)
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
	/// Default log level. `RUST_LOG` takes precedence if set.
	#[serde(deserialize_with = "deserialize_level")]
	pub level: Level,
	/// Sentry DSN. Error tracking is disabled if absent.
	pub sentry: Option<String>,
}

fn deserialize_level<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Level, D::Error> {
	let value = String::deserialize(deserializer)?;
	value.parse().map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
	// The interface the HTTP server will be listening on
	pub interface: IpAddr,
	// The port for the HTTP server
	pub port: u16,
	/// Request timeout in seconds.
	pub request_timeout: u64,
	pub graceful_shutdown: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
	pub host: String,
	pub port: u16,
	pub user: String,
	pub password: String,
	pub vhost: String,
	/// The durable queue series identifiers are published to.
	pub queue: String,
	/// Heartbeat interval in seconds.
	pub heartbeat: u16,
	/// Seconds to wait on a blocked or unresponsive broker.
	pub blocked_connection_timeout: u64,
}

impl BrokerConfig {
	pub fn address(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}

	pub const fn blocked_connection_timeout(&self) -> Duration {
		Duration::from_secs(self.blocked_connection_timeout)
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
	/// Base URL of the Orthanc REST API.
	pub url: Url,
	pub user: String,
	pub password: String,
	/// Timeout for a single archive request in milliseconds.
	pub timeout: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
	pub host: String,
	pub port: u16,
	pub name: String,
	pub user: String,
	pub password: String,
	/// The maximum permitted amount of connections in the pool
	pub max_connections: u32,
}
