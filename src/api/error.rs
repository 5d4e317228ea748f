use crate::services::storage::StorageError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Why a file registry operation failed
#[derive(Error, Debug)]
pub enum FailureCause {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Storage did not answer within {0:?}")]
    Timeout(Duration),
}

impl FailureCause {
    pub fn status(&self) -> StatusCode {
        match self {
            FailureCause::BadRequest(_) => StatusCode::BAD_REQUEST,
            FailureCause::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            FailureCause::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
            FailureCause::Storage(StorageError::AlreadyExists(_)) => StatusCode::CONFLICT,
            FailureCause::Storage(StorageError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            FailureCause::Storage(StorageError::Backend(_)) => StatusCode::BAD_GATEWAY,
            FailureCause::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Upload failed: {0}")]
    Upload(#[source] FailureCause),

    #[error("Failed to list files: {0}")]
    List(#[source] FailureCause),

    #[error("Download failed: {0}")]
    Download(#[source] FailureCause),

    #[error("Delete failed: {0}")]
    Delete(#[source] FailureCause),
}

impl AppError {
    /// Generic message shown to the caller; details stay in the server log.
    pub fn public_message(&self) -> &'static str {
        match self {
            AppError::Upload(_) => "Upload failed",
            AppError::List(_) => "Failed to list files",
            AppError::Download(_) => "Download failed",
            AppError::Delete(_) => "Delete failed",
        }
    }

    pub fn cause(&self) -> &FailureCause {
        match self {
            AppError::Upload(c) | AppError::List(c) | AppError::Download(c) | AppError::Delete(c) => c,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.cause().status()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::warn!("{}", self);
        }

        let body = Json(json!({
            "error": self.public_message()
        }));

        (status, body).into_response()
    }
}
