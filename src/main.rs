pub(crate) mod api;
pub(crate) mod backend;
pub(crate) mod broker;
pub(crate) mod config;

use crate::api::pacs::ArchiveService;
use crate::api::series::PatientRepository;
use crate::backend::{OrthancClient, PostgresPatientRepository};
use crate::broker::amqp::AmqpConnector;
use crate::broker::{ConnectionManager, Lifecycle, Publisher, SeriesPublisher};
use crate::config::{AppConfig, HttpServerConfig};
use anyhow::Context;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::Response;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace;
use tracing::{error, info, level_filters::LevelFilter, warn, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Name announced in the `Server` header and to the broker.
pub const SERVER_NAME: &str = concat!("series-gateway/", env!("CARGO_PKG_VERSION"));

fn init_logger(level: tracing::Level) {
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::fmt::layer()
				.compact()
				.with_ansi(true)
				.with_file(false)
				.with_line_number(false)
				.with_target(false),
		)
		.with(
			EnvFilter::builder()
				.with_default_directive(LevelFilter::from_level(level).into())
				.from_env_lossy(),
		)
		.with(sentry::integrations::tracing::layer())
		.init();
}

#[derive(Clone)]
pub struct AppState {
	pub publisher: Arc<dyn SeriesPublisher>,
	pub patients: Arc<dyn PatientRepository>,
	pub archive: Arc<dyn ArchiveService>,
}

fn init_sentry(config: &AppConfig) -> sentry::ClientInitGuard {
	let guard = sentry::init((
		// An empty string will disable Sentry
		config.telemetry.sentry.as_deref().unwrap_or_default(),
		sentry::ClientOptions {
			release: sentry::release_name!(),
			traces_sample_rate: 1.0,
			..Default::default()
		},
	));

	if let Some(dsn) = &config.telemetry.sentry {
		info!(dsn, "Enabled Sentry for tracing and error tracking");
	};

	guard
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
	let config = AppConfig::new()?;
	init_logger(config.telemetry.level);

	// The Sentry client has to exist before the Tokio runtime, so #[tokio::main] is not an option.
	// See https://docs.sentry.io/platforms/rust/#async-main-function
	let sentry = init_sentry(&config);

	let result = tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()?
		.block_on(run(config));

	if let Err(error) = result {
		error!("Failed to run application due to error: {error:#}");
		// Flush pending events, process::exit skips destructors
		drop(sentry);
		std::process::exit(1);
	}
	Ok(())
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
	let publisher = Arc::new(Publisher::new(ConnectionManager::new(
		AmqpConnector::new(config.broker.clone()),
		config.broker.queue.clone(),
	)));
	publisher
		.on_startup()
		.await
		.with_context(|| format!("Failed to connect to broker at {}", config.broker.address()))?;

	let patients = Arc::new(PostgresPatientRepository::new(&config.database));
	if let Err(err) = patients.ensure_schema().await {
		warn!("Could not prepare patient table, saving patients will fail until the database is reachable: {err}");
	}

	let app_state = AppState {
		publisher: publisher.clone(),
		patients: patients.clone(),
		archive: Arc::new(OrthancClient::new(&config.orthanc)),
	};

	let app = with_layers(api::routes(), &config.server).with_state(app_state);

	let HttpServerConfig {
		interface: host,
		port,
		graceful_shutdown,
		..
	} = config.server;
	let addr = SocketAddr::from((host, port));
	let listener = TcpListener::bind(addr).await?;

	info!("Started series gateway on http://{addr}");
	let served = if graceful_shutdown {
		axum::serve(listener, app)
			.with_graceful_shutdown(shutdown_signal())
			.await
	} else {
		axum::serve(listener, app).await
	};

	publisher.on_shutdown().await;
	patients.close().await;
	info!("Stopped series gateway");

	Ok(served?)
}

fn with_layers(router: Router<AppState>, config: &HttpServerConfig) -> Router<AppState> {
	router
		.layer(CorsLayer::permissive())
		.layer(axum::middleware::from_fn(add_common_headers))
		.layer(
			tower_http::trace::TraceLayer::new_for_http()
				.make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
				.on_request(trace::DefaultOnRequest::new().level(Level::INFO))
				.on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
		)
		.layer(TimeoutLayer::with_status_code(
			StatusCode::REQUEST_TIMEOUT,
			Duration::from_secs(config.request_timeout),
		))
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(err) = signal::ctrl_c().await {
			error!("Failed to listen for Ctrl+C: {err}");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			}
			Err(err) => {
				error!("Failed to listen for SIGTERM: {err}");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		() = ctrl_c => {},
		() = terminate => {},
	}
	info!("Received shutdown signal");
}

async fn add_common_headers(req: Request, next: axum::middleware::Next) -> Response {
	let mut response = next.run(req).await;
	let headers = response.headers_mut();
	headers.insert("Server", axum::http::HeaderValue::from_static(SERVER_NAME));
	response
}
