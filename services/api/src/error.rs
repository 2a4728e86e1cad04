//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how it is
//! rendered as an HTTP response (`{ "message": ... }`).

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use learning_module_core::ingest::IngestError;
use learning_module_core::pipeline::PipelineError;
use learning_module_core::lifecycle::LifecycleError;
use learning_module_core::ports::PortError;
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// A status change the module lifecycle does not allow.
    #[error("Lifecycle Error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// Raw content was rejected before any module was created.
    #[error("Ingest Error: {0}")]
    Ingest(#[from] IngestError),

    /// The module exists but no generation run is active for it.
    #[error("No generation run is active for module {0}")]
    NoActiveRun(uuid::Uuid),

    /// A request that is malformed independently of any stored state.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents an error related to the WebSocket connection.
    #[error("WebSocket Error: {0}")]
    Websocket(#[from] axum::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Store(e) => ApiError::Port(e),
            PipelineError::Lifecycle(e) => ApiError::Lifecycle(e),
        }
    }
}

/// The JSON body of every error response.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub message: String,
}

impl ApiError {
    pub(crate) fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Port(PortError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "Module not found".to_string())
            }
            ApiError::Port(PortError::Invalid(message)) => {
                (StatusCode::BAD_REQUEST, message.clone())
            }
            ApiError::Lifecycle(LifecycleError::Store(PortError::NotFound(_))) => {
                (StatusCode::NOT_FOUND, "Module not found".to_string())
            }
            ApiError::Lifecycle(e @ LifecycleError::InvalidTransition { .. }) => {
                (StatusCode::CONFLICT, e.to_string())
            }
            ApiError::Ingest(e @ IngestError::UnsupportedContentType(_)) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, e.to_string())
            }
            ApiError::Ingest(e @ IngestError::InvalidText)
            | ApiError::Ingest(e @ IngestError::Extraction(_)) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            e @ ApiError::NoActiveRun(_) => (StatusCode::NOT_FOUND, e.to_string()),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            error!("Request failed: {:?}", self);
        }
        (status, Json(ErrorBody { message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_domain_errors_to_status_codes() {
        let cases = [
            (ApiError::Port(PortError::NotFound("x".into())), StatusCode::NOT_FOUND),
            (ApiError::Port(PortError::Invalid("title".into())), StatusCode::BAD_REQUEST),
            (
                ApiError::Ingest(IngestError::UnsupportedContentType("image/png".into())),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (
                ApiError::Ingest(IngestError::Extraction(PortError::Invalid("scan".into()))),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::NoActiveRun(uuid::Uuid::nil()), StatusCode::NOT_FOUND),
            (ApiError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            assert_eq!(error.status_and_message().0, expected);
        }
    }
}
