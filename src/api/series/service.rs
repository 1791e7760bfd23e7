use crate::broker::{SeriesMessage, SeriesPublisher};
use async_trait::async_trait;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Persists patient demographics.
#[async_trait]
pub trait PatientRepository: Send + Sync {
	/// Inserts the patient or updates the names of the existing record with the same
	/// `patient_id`. Returns the record id.
	async fn upsert(&self, patient: &Patient) -> Result<i32, RepositoryError>;

	fn is_connected(&self) -> bool;
}

#[derive(Debug, Error)]
pub enum RepositoryError {
	#[error("Failed to save patient: {0}")]
	Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Patient {
	/// Record id assigned by the repository.
	pub id: Option<i32>,
	pub patient_id: String,
	pub first_name: String,
	pub last_name: String,
}

/// Body of `POST /serie`.
///
/// The patient fields are optional, but must be given all together.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishSeriesRequest {
	pub serie: String,
	pub patient_id: Option<String>,
	pub first_name: Option<String>,
	pub last_name: Option<String>,
}

impl PublishSeriesRequest {
	fn into_parts(self) -> Result<(SeriesMessage, Option<Patient>), PublishSeriesError> {
		let patient = match (self.patient_id, self.first_name, self.last_name) {
			(None, None, None) => None,
			(Some(patient_id), Some(first_name), Some(last_name)) => Some(Patient {
				id: None,
				patient_id,
				first_name,
				last_name,
			}),
			_ => return Err(PublishSeriesError::IncompletePatient),
		};

		Ok((SeriesMessage::new(self.serie), patient))
	}
}

#[derive(Debug)]
pub struct PublishedSeries {
	pub message: SeriesMessage,
	pub patient: Option<Patient>,
}

#[derive(Debug, Error)]
pub enum PublishSeriesError {
	#[error("patientId, firstName and lastName must be provided together")]
	IncompletePatient,
	#[error(transparent)]
	Patient(#[from] RepositoryError),
	#[error("Failed to publish series to the queue")]
	Publish,
}

impl PublishSeriesError {
	pub const fn status_code(&self) -> StatusCode {
		match self {
			Self::IncompletePatient => StatusCode::UNPROCESSABLE_ENTITY,
			Self::Patient(_) | Self::Publish => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

/// Saves the patient (if any) and publishes the series.
///
/// Nothing is published unless the patient was saved.
pub async fn publish_series(
	publisher: &dyn SeriesPublisher,
	patients: &dyn PatientRepository,
	request: PublishSeriesRequest,
) -> Result<PublishedSeries, PublishSeriesError> {
	let (message, patient) = request.into_parts()?;

	let patient = match patient {
		Some(mut patient) => {
			let id = patients.upsert(&patient).await.inspect_err(|err| {
				warn!(patient_id = patient.patient_id, "{err}");
			})?;
			info!(id, patient_id = patient.patient_id, "Saved patient");
			patient.id = Some(id);
			Some(patient)
		}
		None => None,
	};

	if publisher.publish(&message).await {
		Ok(PublishedSeries { message, patient })
	} else {
		Err(PublishSeriesError::Publish)
	}
}
