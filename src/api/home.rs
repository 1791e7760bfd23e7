use crate::api::connection_status;
use crate::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

pub fn routes() -> Router<AppState> {
	Router::new().route("/", get(index))
}

async fn index(State(state): State<AppState>) -> impl IntoResponse {
	Json(json!({
		"service": env!("CARGO_PKG_NAME"),
		"version": env!("CARGO_PKG_VERSION"),
		"status": "running",
		"broker": connection_status(state.publisher.is_live().await),
	}))
}
