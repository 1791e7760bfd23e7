use crate::AppState;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};

mod health;
mod home;
pub mod pacs;
pub mod series;

#[cfg(test)]
pub(crate) mod testing;

pub fn routes() -> Router<AppState> {
	Router::new()
		.merge(home::routes())
		.merge(health::routes())
		.merge(series::routes())
		.nest("/api/pacs", pacs::routes())
}

/// Error body shared by all endpoints: `{"detail": "..."}`.
pub(crate) fn error_response(status: StatusCode, detail: impl Into<String>) -> Response {
	let detail: String = detail.into();
	(status, Json(serde_json::json!({ "detail": detail }))).into_response()
}

pub(crate) const fn connection_status(connected: bool) -> &'static str {
	if connected {
		"connected"
	} else {
		"disconnected"
	}
}
