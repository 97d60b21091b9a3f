//! services/gateway/src/error.rs
//!
//! Defines the primary error type for the gateway and its JSON envelope.

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use file_search_core::{AccessDenied, PortError};
use tracing::error;

use crate::config::ConfigError;
use crate::web::protocol::ErrorEnvelope;

/// The primary error type for the `gateway` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from the core or one of its ports.
    #[error(transparent)]
    Port(#[from] PortError),

    /// Represents a standard Input/Output error (e.g., staging an upload).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The multipart body could not be read.
    #[error("Invalid upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("File exceeds the {0} byte upload limit")]
    PayloadTooLarge(usize),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl From<AccessDenied> for ApiError {
    fn from(denied: AccessDenied) -> Self {
        if denied.is_unauthenticated() {
            ApiError::Unauthenticated(denied.to_string())
        } else {
            ApiError::Forbidden(denied.to_string())
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Multipart(e) => e.status(),
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Port(port) => match port {
                PortError::Validation(_) => StatusCode::BAD_REQUEST,
                PortError::NotFound(_) => StatusCode::NOT_FOUND,
                PortError::Conflict(_) => StatusCode::CONFLICT,
                PortError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                PortError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                PortError::RemoteOperationFailed(_)
                | PortError::Transport(_)
                | PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Config(_) | ApiError::Io(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {:?}", self);
        }
        let body = ErrorEnvelope {
            success: false,
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
