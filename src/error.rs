//! Request-boundary errors.
//!
//! Every failure a handler can hit is turned into a 400 response with a
//! `{"status": "error", "message": ...}` body.

use crate::chart::ChartError;
use crate::models::BirthDataError;
use crate::narrative::NarrativeError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid birth data: {0}")]
    InvalidBirthData(#[from] BirthDataError),

    #[error(transparent)]
    Chart(#[from] ChartError),

    #[error(transparent)]
    Narrative(#[from] NarrativeError),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        warn!("Request failed: {}", message);

        let body = json!({
            "status": "error",
            "message": message,
        });
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_status() {
        let response = ApiError::BadRequest("expected JSON".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_error_response_body() {
        let response = ApiError::from(BirthDataError::Missing("year")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "status": "error",
                "message": "invalid birth data: missing required field 'year'"
            })
        );
    }

    #[test]
    fn test_error_messages() {
        let err = ApiError::from(BirthDataError::Missing("year"));
        assert_eq!(
            err.to_string(),
            "invalid birth data: missing required field 'year'"
        );

        let err = ApiError::from(ChartError::MissingPoint("Sun"));
        assert_eq!(err.to_string(), "chart has no 'Sun' point");

        let err = ApiError::from(NarrativeError::Exhausted(vec![
            "a: down".to_string(),
            "b: down".to_string(),
        ]));
        assert_eq!(
            err.to_string(),
            "all narrative backends failed: a: down; b: down"
        );
    }
}
