use crate::api::connection_status;
use crate::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

pub fn routes() -> Router<AppState> {
	Router::new().route("/health", get(health))
}

/// Reports the state of the broker connection and the patient database.
///
/// Always answers 200, the `status` field carries the verdict.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
	let broker = state.publisher.is_live().await;
	let database = state.patients.is_connected();

	Json(json!({
		"status": if broker && database { "healthy" } else { "unhealthy" },
		"broker": connection_status(broker),
		"database": connection_status(database),
	}))
}
