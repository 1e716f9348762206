//! HTTP error mapping
//!
//! Storage codes map onto statuses as follows:
//!
//! | Code | Status |
//! |---|---|
//! | `NOT_FOUND` | 404 |
//! | `PERMISSION_DENIED` | 403 |
//! | `INVALID_FILE` | 400 |
//! | `SIZE_EXCEEDED` | 413 |
//! | `TYPE_NOT_ALLOWED` | 415 |
//! | `UNKNOWN` | 500, generic message |
//!
//! Internal failures are logged with their full cause chain and answered
//! with a message that names no paths and carries no causes.

use super::responses::ErrorResponse;
use crate::storage::{ErrorCode, StorageError};
use axum::{
    http::{header::CONTENT_RANGE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Message returned in place of internal failure details
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal storage error";

/// Errors returned by the HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// Storage operation failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Malformed request (missing field, unknown upload type, ...)
    #[error("{0}")]
    BadRequest(String),

    /// The multipart body could not be read
    #[error("Multipart error: {message}")]
    Multipart {
        /// Status suggested by the multipart parser
        status: StatusCode,
        /// Parser message
        message: String,
    },

    /// Unparseable `Range` header
    #[error("Invalid range request")]
    InvalidRange,

    /// `Range` outside the object
    #[error("Range not satisfiable (file size: {0})")]
    RangeNotSatisfiable(u64),
}

impl ApiError {
    /// HTTP status for this error
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Storage(e) => match e.code() {
                ErrorCode::NotFound => StatusCode::NOT_FOUND,
                ErrorCode::PermissionDenied => StatusCode::FORBIDDEN,
                ErrorCode::InvalidFile => StatusCode::BAD_REQUEST,
                ErrorCode::SizeExceeded => StatusCode::PAYLOAD_TOO_LARGE,
                ErrorCode::TypeNotAllowed => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                ErrorCode::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Multipart { status, .. } => *status,
            Self::BadRequest(_) | Self::InvalidRange => StatusCode::BAD_REQUEST,
            Self::RangeNotSatisfiable(_) => StatusCode::RANGE_NOT_SATISFIABLE,
        }
    }

    /// Storage error code exposed to the client, if any
    #[must_use]
    pub const fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Storage(e) => Some(e.code()),
            Self::Multipart { status, .. } if status.as_u16() == 413 => {
                Some(ErrorCode::SizeExceeded)
            }
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = if status.is_server_error() {
            tracing::error!(error = ?self, "request failed with internal error");
            INTERNAL_ERROR_MESSAGE.to_string()
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
            self.to_string()
        };

        let mut response = (status, Json(ErrorResponse::new(message, code))).into_response();

        if let Self::RangeNotSatisfiable(size) = self {
            if let Ok(value) = format!("bytes */{size}").parse() {
                response.headers_mut().insert(CONTENT_RANGE, value);
            }
        }

        response
    }
}
