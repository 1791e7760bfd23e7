//! In-memory collaborators and request helpers for the HTTP tests.

use crate::api::pacs::{ArchiveError, ArchiveService, PatientSummary, SeriesSummary};
use crate::api::series::{Patient, PatientRepository, RepositoryError};
use crate::broker::fake::FakeBroker;
use crate::broker::{ConnectionManager, Publisher};
use crate::AppState;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const QUEUE: &str = "series_queue";

type ErrorFactory = Box<dyn Fn() -> ArchiveError + Send + Sync>;

#[derive(Default)]
pub struct FakeArchive {
	failure: Mutex<Option<ErrorFactory>>,
	searched: Mutex<Vec<String>>,
}

impl FakeArchive {
	pub fn fail_with(&self, error: impl Fn() -> ArchiveError + Send + Sync + 'static) {
		*self.failure.lock().unwrap() = Some(Box::new(error));
	}

	pub fn searched(&self) -> Vec<String> {
		self.searched.lock().unwrap().clone()
	}

	fn check(&self) -> Result<(), ArchiveError> {
		match &*self.failure.lock().unwrap() {
			Some(error) => Err(error()),
			None => Ok(()),
		}
	}
}

#[async_trait]
impl ArchiveService for FakeArchive {
	async fn list_series(&self) -> Result<Vec<SeriesSummary>, ArchiveError> {
		self.check()?;
		Ok(vec![SeriesSummary {
			uuid: String::from("series-1"),
			patient_name: String::from("DOE^JOHN"),
			study_id: String::from("study-1"),
			series_number: String::from("1"),
			description: String::from("Thorax"),
			modality: String::from("CT"),
			num_instances: 120,
		}])
	}

	async fn search_patients(&self, name: &str) -> Result<Vec<PatientSummary>, ArchiveError> {
		self.check()?;
		self.searched.lock().unwrap().push(name.to_owned());
		Ok(vec![PatientSummary {
			uuid: String::from("patient-1"),
			patient_id: String::from("P-1"),
			patient_name: String::from("DOE^JOHN"),
			first_name: String::from("JOHN"),
			last_name: String::from("DOE"),
		}])
	}
}

#[derive(Default)]
pub struct FakePatients {
	failing: Mutex<bool>,
	saved: Mutex<Vec<Patient>>,
}

impl FakePatients {
	pub fn set_failing(&self, failing: bool) {
		*self.failing.lock().unwrap() = failing;
	}

	pub fn saved(&self) -> Vec<Patient> {
		self.saved.lock().unwrap().clone()
	}
}

#[async_trait]
impl PatientRepository for FakePatients {
	async fn upsert(&self, patient: &Patient) -> Result<i32, RepositoryError> {
		if *self.failing.lock().unwrap() {
			return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
		}
		let mut saved = self.saved.lock().unwrap();
		saved.push(patient.clone());
		Ok(i32::try_from(saved.len()).unwrap())
	}

	fn is_connected(&self) -> bool {
		!*self.failing.lock().unwrap()
	}
}

pub struct TestState {
	pub broker: FakeBroker,
	pub publisher: Arc<Publisher<FakeBroker>>,
	pub patients: Arc<FakePatients>,
	pub archive: Arc<FakeArchive>,
}

impl Default for TestState {
	fn default() -> Self {
		let broker = FakeBroker::default();
		let publisher = Arc::new(Publisher::new(ConnectionManager::new(
			broker.clone(),
			String::from(QUEUE),
		)));

		Self {
			broker,
			publisher,
			patients: Arc::default(),
			archive: Arc::default(),
		}
	}
}

impl TestState {
	pub fn app_state(&self) -> AppState {
		AppState {
			publisher: self.publisher.clone(),
			patients: self.patients.clone(),
			archive: self.archive.clone(),
		}
	}
}

async fn send(state: &TestState, request: Request<Body>) -> Response<Body> {
	crate::api::routes()
		.with_state(state.app_state())
		.oneshot(request)
		.await
		.unwrap()
}

pub async fn get(state: &TestState, uri: &str) -> Response<Body> {
	let request = Request::get(uri).body(Body::empty()).unwrap();
	send(state, request).await
}

pub async fn post_json(state: &TestState, uri: &str, body: serde_json::Value) -> Response<Body> {
	let request = Request::post(uri)
		.header(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
		.body(Body::from(body.to_string()))
		.unwrap();
	send(state, request).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
	let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
		.await
		.unwrap();
	serde_json::from_slice(&bytes).unwrap()
}
