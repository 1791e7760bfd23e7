use crate::api::error_response;
use crate::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{instrument, warn};

/// HTTP Router for the archive lookups.
#[rustfmt::skip]
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/series", get(all_series))
        .route("/patients", get(search_patients))
}

#[derive(Debug, Deserialize)]
struct PatientQuery {
	#[serde(default)]
	name: String,
}

#[instrument(skip_all)]
async fn all_series(State(state): State<AppState>) -> Response {
	match state.archive.list_series().await {
		Ok(series) => Json(json!({
			"total": series.len(),
			"series": series,
		}))
		.into_response(),
		Err(err) => {
			warn!("Failed to list series: {err}");
			error_response(err.status_code(), err.to_string())
		}
	}
}

#[instrument(skip_all, fields(name = %query.name))]
async fn search_patients(
	State(state): State<AppState>,
	Query(query): Query<PatientQuery>,
) -> Response {
	let name = query.name.trim();
	if name.is_empty() {
		return error_response(StatusCode::BAD_REQUEST, "Query parameter 'name' is required");
	}

	match state.archive.search_patients(name).await {
		Ok(patients) => Json(json!({
			"total": patients.len(),
			"patients": patients,
		}))
		.into_response(),
		Err(err) => {
			warn!("Failed to search patients: {err}");
			error_response(err.status_code(), err.to_string())
		}
	}
}
