//! JSON bodies exchanged with the upload endpoints
//!
//! Shared by the server handlers and [`UploadClient`](crate::client::UploadClient).

use crate::storage::{ErrorCode, UploadResult};
use serde::{Deserialize, Serialize};

/// Successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Always `true`
    pub success: bool,
    /// The stored object
    pub file: UploadResult,
}

/// Successful delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    /// Always `true`
    pub success: bool,
}

/// Any failed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `false`
    pub success: bool,
    /// Human readable message
    pub error: String,
    /// Storage error code, when the failure maps onto one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl ErrorResponse {
    /// Builds a failure body
    #[must_use]
    pub fn new(error: impl Into<String>, code: Option<ErrorCode>) -> Self {
        Self {
            success: false,
            error: error.into(),
            code,
        }
    }
}
