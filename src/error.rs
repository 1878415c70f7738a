use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::{models::ErrorBody, openai::UpstreamError, storage::StorageError};

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed client input
    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid multipart payload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Not found")]
    NotFound,

    /// The image-edit API failed or returned nothing usable
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Multipart(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Upstream(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("❌ Request failed: {}", self);
        } else {
            tracing::info!("⚠️ Rejected request ({}): {}", status, self);
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn status_mapping() {
        assert_eq!(AppError::bad_request("No image uploaded").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::from(UpstreamError::NoImage).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(AppError::from(StorageError::from(io)).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn upstream_message_is_passed_through() {
        let err = AppError::from(UpstreamError::Status { status: 400, body: "bad size".into() });
        assert_eq!(err.to_string(), "OpenAI error 400: bad size");
    }
}
