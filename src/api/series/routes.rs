use crate::api::error_response;
use crate::api::series::{publish_series, PublishSeriesRequest};
use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use tracing::instrument;

/// HTTP Router for publishing series to the queue.
#[rustfmt::skip]
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/serie", post(publish))
}

#[instrument(skip_all, fields(serie = %request.serie))]
async fn publish(
	State(state): State<AppState>,
	Json(request): Json<PublishSeriesRequest>,
) -> Response {
	match publish_series(state.publisher.as_ref(), state.patients.as_ref(), request).await {
		Ok(published) => {
			let mut data = json!({ "serie": published.message.serie });
			if let Some(patient) = published.patient {
				data["patient"] = json!(patient);
			}

			(
				StatusCode::CREATED,
				Json(json!({
					"status": "success",
					"message": "Series published",
					"data": data,
				})),
			)
				.into_response()
		}
		Err(err) => error_response(err.status_code(), err.to_string()),
	}
}

#[cfg(test)]
mod tests {
	use crate::api::testing::{body_json, post_json, TestState, QUEUE};
	use axum::http::StatusCode;
	use serde_json::json;

	#[tokio::test]
	async fn publishes_series() {
		let state = TestState::default();
		let response = post_json(&state, "/serie", json!({ "serie": "abc-123" })).await;

		assert_eq!(response.status(), StatusCode::CREATED);
		let body = body_json(response).await;
		assert_eq!(body["status"], json!("success"));
		assert_eq!(body["data"], json!({ "serie": "abc-123" }));

		let messages = state.broker.messages(QUEUE);
		assert_eq!(messages.len(), 1);
		assert_eq!(messages[0].payload, br#"{"serie":"abc-123"}"#);
		assert!(state.patients.saved().is_empty());
	}

	#[tokio::test]
	async fn publish_failure_is_internal_error() {
		let state = TestState::default();
		state.broker.set_reachable(false);

		let response = post_json(&state, "/serie", json!({ "serie": "abc-123" })).await;

		assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
		let body = body_json(response).await;
		assert!(body["detail"].is_string());
		assert!(state.broker.messages(QUEUE).is_empty());
	}

	#[tokio::test]
	async fn saves_patient_before_publishing_series_only() {
		let state = TestState::default();
		let response = post_json(
			&state,
			"/serie",
			json!({
				"serie": "abc-123",
				"patientId": "P-1",
				"firstName": "John",
				"lastName": "Doe",
			}),
		)
		.await;

		assert_eq!(response.status(), StatusCode::CREATED);
		let body = body_json(response).await;
		assert_eq!(body["data"]["patient"]["id"], json!(1));

		let saved = state.patients.saved();
		assert_eq!(saved.len(), 1);
		assert_eq!(saved[0].patient_id, "P-1");

		let messages = state.broker.messages(QUEUE);
		assert_eq!(messages.len(), 1);
		let payload: serde_json::Value = serde_json::from_slice(&messages[0].payload).unwrap();
		assert_eq!(payload, json!({ "serie": "abc-123" }));
	}

	#[tokio::test]
	async fn failed_patient_upsert_publishes_nothing() {
		let state = TestState::default();
		state.patients.set_failing(true);

		let response = post_json(
			&state,
			"/serie",
			json!({
				"serie": "abc-123",
				"patientId": "P-1",
				"firstName": "John",
				"lastName": "Doe",
			}),
		)
		.await;

		assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
		assert!(state.broker.messages(QUEUE).is_empty());
	}

	#[tokio::test]
	async fn incomplete_patient_is_rejected() {
		let state = TestState::default();
		let response = post_json(
			&state,
			"/serie",
			json!({ "serie": "abc-123", "firstName": "John" }),
		)
		.await;

		assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
		assert!(state.patients.saved().is_empty());
		assert!(state.broker.messages(QUEUE).is_empty());
	}

	#[tokio::test]
	async fn missing_serie_is_rejected() {
		let state = TestState::default();
		let response = post_json(&state, "/serie", json!({ "series": "abc-123" })).await;

		assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
		assert!(state.broker.messages(QUEUE).is_empty());
	}
}
