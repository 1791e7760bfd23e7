mod model;

use crate::api::pacs::{ArchiveError, ArchiveService, PatientSummary, SeriesSummary};
use crate::config::ArchiveConfig;
use async_trait::async_trait;
use axum_extra::headers::authorization::Basic;
use axum_extra::headers::{Authorization, HeaderMapExt};
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use http_body_util::{BodyExt, Full};
use hyper::{header, Method, Request};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use model::{patient_name_pattern, Patient, Series, Study};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Upper bound of studies whose series are fetched at the same time.
const CONCURRENT_STUDIES: usize = 8;

/// Client for the Orthanc REST API.
pub struct OrthancClient {
	client: Client<HttpConnector, Full<Bytes>>,
	base_url: Url,
	authorization: Authorization<Basic>,
	timeout: Duration,
}

impl OrthancClient {
	pub fn new(config: &ArchiveConfig) -> Self {
		let mut base_url = config.url.clone();
		// Url::join would otherwise replace the last path segment
		if !base_url.path().ends_with('/') {
			let path = format!("{}/", base_url.path());
			base_url.set_path(&path);
		}

		Self {
			client: Client::builder(TokioExecutor::new()).build_http(),
			base_url,
			authorization: Authorization::basic(&config.user, &config.password),
			timeout: Duration::from_millis(config.timeout),
		}
	}

	async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ArchiveError> {
		self.send(Method::GET, path, Bytes::new()).await
	}

	async fn post<T: DeserializeOwned>(
		&self,
		path: &str,
		body: &serde_json::Value,
	) -> Result<T, ArchiveError> {
		self.send(Method::POST, path, Bytes::from(body.to_string()))
			.await
	}

	async fn send<T: DeserializeOwned>(
		&self,
		method: Method,
		path: &str,
		body: Bytes,
	) -> Result<T, ArchiveError> {
		let url = self
			.base_url
			.join(path)
			.map_err(|err| ArchiveError::Request(err.to_string()))?;

		let mut request = Request::builder()
			.method(method)
			.uri(url.as_str())
			.header(header::ACCEPT, mime::APPLICATION_JSON.as_ref())
			.header(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
			.body(Full::new(body))
			.map_err(|err| ArchiveError::Request(err.to_string()))?;
		request.headers_mut().typed_insert(self.authorization.clone());

		let body = tokio::time::timeout(self.timeout, async {
			let response = self
				.client
				.request(request)
				.await
				.map_err(|err| ArchiveError::Unreachable(err.to_string()))?;

			let status = response.status();
			if !status.is_success() {
				return Err(ArchiveError::Status { status });
			}

			response
				.into_body()
				.collect()
				.await
				.map(|collected| collected.to_bytes())
				.map_err(|err| ArchiveError::Unreachable(err.to_string()))
		})
		.await
		.map_err(|_| ArchiveError::Timeout)??;

		debug!(url = url.as_str(), bytes = body.len(), "Archive responded");
		Ok(serde_json::from_slice(&body)?)
	}

	async fn study_series(&self, study_id: &str) -> Result<Vec<SeriesSummary>, ArchiveError> {
		let study: Study = self.get(&format!("studies/{study_id}")).await?;
		let series: Vec<Series> = self.get(&format!("studies/{study_id}/series")).await?;

		Ok(series
			.into_iter()
			.map(|series| series.summarize(study_id, &study))
			.collect())
	}
}

#[async_trait]
impl ArchiveService for OrthancClient {
	#[instrument(skip_all)]
	async fn list_series(&self) -> Result<Vec<SeriesSummary>, ArchiveError> {
		let studies: Vec<String> = self.get("studies").await?;

		let series: Vec<Vec<SeriesSummary>> = futures::stream::iter(studies)
			.map(|study_id| async move { self.study_series(&study_id).await })
			.buffered(CONCURRENT_STUDIES)
			.try_collect()
			.await?;

		Ok(series.into_iter().flatten().collect())
	}

	#[instrument(skip_all, fields(name = %name))]
	async fn search_patients(&self, name: &str) -> Result<Vec<PatientSummary>, ArchiveError> {
		let query = json!({
			"Level": "Patient",
			"Expand": true,
			"Query": { "PatientName": patient_name_pattern(name) },
		});
		let patients: Vec<Patient> = self.post("tools/find", &query).await?;

		Ok(patients.into_iter().map(PatientSummary::from).collect())
	}
}
