//! Error responses for the HTTP service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use barista_core::AgentError;
use serde_json::json;
use thiserror::Error;

/// Result type alias for request handlers.
pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    /// A component the endpoint needs failed to initialize
    #[error("Service not ready: {0}")]
    NotReady(String),

    /// Missing or unusable request input
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Agent(#[from] AgentError),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Agent(err) => match err {
                AgentError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                AgentError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                AgentError::UpstreamModel(_) | AgentError::MaxStepsReached => {
                    StatusCode::BAD_GATEWAY
                }
                err if err.is_client_error() => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed with {}: {}", status, self);
        } else {
            log::debug!("Request rejected with {}: {}", status, self);
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
