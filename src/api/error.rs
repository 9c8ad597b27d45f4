use axum::{
    Json,
    extract::rejection::FormRejection,
    http::{StatusCode, header},
    response::IntoResponse,
};
use thiserror::Error;

use super::models::{ErrorResponse, NO_CACHE};
use crate::dispatch::SubmitError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidUrl(String),
    #[error("forbidden host")]
    ForbiddenHost,
    #[error("payload invalid: {0}")]
    InvalidPayload(String),
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("{0} not found")]
    NotFound(String),
    #[error("forbidden path: {0}")]
    ForbiddenPath(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            ApiError::ForbiddenHost => StatusCode::FORBIDDEN,
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ForbiddenPath(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidUrl(_) => "INVALID_URL",
            ApiError::ForbiddenHost => "FORBIDDEN_HOST",
            ApiError::InvalidPayload(_) => "INVALID_PAYLOAD",
            ApiError::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::ForbiddenPath(_) => "FORBIDDEN_PATH",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };

        (status, [(header::CACHE_CONTROL, NO_CACHE)], Json(body)).into_response()
    }
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::MissingUrl | SubmitError::InvalidUrl => {
                ApiError::InvalidUrl(err.to_string())
            }
            SubmitError::ForbiddenHost => ApiError::ForbiddenHost,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Forbidden(path) => ApiError::ForbiddenPath(path),
            StorageError::NotFound(_) => ApiError::NotFound("file".to_string()),
            StorageError::Io(_) | StorageError::Walk(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge;
        }
        ApiError::InvalidPayload(rejection.body_text())
    }
}
