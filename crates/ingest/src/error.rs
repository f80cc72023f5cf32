//! Client-visible ingest error kinds, per spec.md §7.
//!
//! An oversized body never reaches this enum: `RequestBodyLimitLayer`
//! rejects it with its own 413 response before the handler runs.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("subscription not found")]
    SubscriptionNotFound,

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("job store unavailable: {0}")]
    QueueUnavailable(#[source] anyhow::Error),

    #[error("internal error: {0}")]
    Internal(#[from] hookrelay_common::Error),
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            IngestError::SubscriptionNotFound => {
                (StatusCode::NOT_FOUND, "SubscriptionNotFound".to_string())
            }
            IngestError::InvalidPayload(msg) => {
                (StatusCode::BAD_REQUEST, format!("InvalidPayload: {msg}"))
            }
            IngestError::QueueUnavailable(err) => {
                tracing::error!(%err, "ingest job store unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, "job store unavailable".to_string())
            }
            IngestError::Internal(err) => {
                tracing::error!(%err, "ingest internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        (status, Json(json!({ "error": error }))).into_response()
    }
}
