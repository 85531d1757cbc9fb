use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::photo::NormalizeError;

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0:#}")]
    Upstream(#[from] anyhow::Error),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

impl GalleryError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GalleryError::Validation(_) => StatusCode::BAD_REQUEST,
            GalleryError::NotFound(_) => StatusCode::NOT_FOUND,
            GalleryError::Upstream(_) | GalleryError::Normalize(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// An error as it goes out over HTTP: status plus `{"error": ...}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    }

    /// Server-side failures get `context` prepended, client mistakes keep
    /// their own message.
    pub fn from_gallery(err: GalleryError, context: &str) -> Self {
        let status = err.status_code();
        let message = if status.is_server_error() {
            format!("{context}: {err}")
        } else {
            err.to_string()
        };
        Self::new(status, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, "request failed: {}", self.message);
        } else {
            warn!(status = %self.status, "request rejected: {}", self.message);
        }
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}
