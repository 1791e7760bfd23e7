use async_trait::async_trait;
use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Read access to the imaging archive.
#[async_trait]
pub trait ArchiveService: Send + Sync {
	/// Lists every series of every study in the archive.
	async fn list_series(&self) -> Result<Vec<SeriesSummary>, ArchiveError>;

	/// Finds patients whose name contains `name`.
	///
	/// The match is a wildcard pattern against the DICOM person name `LAST^FIRST`, so a
	/// name that is a substring of another one matches both.
	async fn search_patients(&self, name: &str) -> Result<Vec<PatientSummary>, ArchiveError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesSummary {
	/// The archive's identifier of the series, the value published to the queue.
	pub uuid: String,
	pub patient_name: String,
	pub study_id: String,
	pub series_number: String,
	pub description: String,
	pub modality: String,
	pub num_instances: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientSummary {
	pub uuid: String,
	pub patient_id: String,
	pub patient_name: String,
	pub first_name: String,
	pub last_name: String,
}

#[derive(Debug, Error)]
pub enum ArchiveError {
	#[error("Could not connect to the archive: {0}")]
	Unreachable(String),
	#[error("Archive request timed out")]
	Timeout,
	#[error("Archive responded with status {status}")]
	Status { status: StatusCode },
	#[error("Failed to decode archive response: {0}")]
	Decode(#[from] serde_json::Error),
	#[error("Invalid archive request: {0}")]
	Request(String),
}

impl ArchiveError {
	/// The status code reported to the caller of the gateway.
	pub const fn status_code(&self) -> StatusCode {
		match self {
			Self::Unreachable(_) | Self::Timeout => StatusCode::SERVICE_UNAVAILABLE,
			Self::Status { status } => *status,
			Self::Decode(_) | Self::Request(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}
