use crate::api::series::{Patient, PatientRepository, RepositoryError};
use crate::config::DatabaseConfig;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::{debug, info};

const CREATE_TABLE: &str = r"
	CREATE TABLE IF NOT EXISTS paciente (
		id SERIAL PRIMARY KEY,
		patient_id TEXT NOT NULL UNIQUE,
		nombre TEXT NOT NULL,
		apellido TEXT NOT NULL
	)";

const UPSERT: &str = r"
	INSERT INTO paciente (patient_id, nombre, apellido)
	VALUES ($1, $2, $3)
	ON CONFLICT (patient_id)
	DO UPDATE SET nombre = EXCLUDED.nombre, apellido = EXCLUDED.apellido
	RETURNING id";

/// Patient records in PostgreSQL, keyed by the DICOM patient id.
pub struct PostgresPatientRepository {
	pool: PgPool,
}

impl PostgresPatientRepository {
	/// Creates the pool without connecting. Connections are opened on first use.
	pub fn new(config: &DatabaseConfig) -> Self {
		let options = PgConnectOptions::new()
			.host(&config.host)
			.port(config.port)
			.database(&config.name)
			.username(&config.user)
			.password(&config.password);

		let pool = PgPoolOptions::new()
			.max_connections(config.max_connections)
			.connect_lazy_with(options);

		info!(
			host = config.host,
			database = config.name,
			max_connections = config.max_connections,
			"Created database pool"
		);
		Self { pool }
	}

	pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
		sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
		debug!("Patient table is present");
		Ok(())
	}

	pub async fn close(&self) {
		self.pool.close().await;
		info!("Closed database pool");
	}
}

#[async_trait]
impl PatientRepository for PostgresPatientRepository {
	async fn upsert(&self, patient: &Patient) -> Result<i32, RepositoryError> {
		let id: i32 = sqlx::query_scalar(UPSERT)
			.bind(&patient.patient_id)
			.bind(&patient.first_name)
			.bind(&patient.last_name)
			.fetch_one(&self.pool)
			.await?;

		Ok(id)
	}

	fn is_connected(&self) -> bool {
		!self.pool.is_closed()
	}
}
