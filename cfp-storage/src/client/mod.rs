//! Upload client for the HTTP upload endpoint
//!
//! Sends a file as multipart form data (`file`, `type`, optional `targetId`)
//! and reports progress as the body is streamed. Callers never learn which
//! storage backend sits behind the server.
//!
//! Failures fall into four classes, see [`UploadError`]:
//! - no response at all (`Network`)
//! - the server answered with a non-2xx status (`Rejected`, carrying the
//!   storage error code when the server sent one)
//! - the server answered 2xx with a body that does not decode
//!   (`InvalidResponse`)
//! - the caller's [`AbortSignal`] fired (`Aborted`)
//! - the request could not be built locally (`InvalidRequest`)
//!
//! # Examples
//!
//! ```rust,no_run
//! use cfp_storage::client::{UploadClient, UploadRequest};
//! use cfp_storage::storage::ResourceKind;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = UploadClient::new("http://localhost:3000");
//! let request = UploadRequest::new(ResourceKind::Avatar, "me.png", std::fs::read("me.png")?)
//!     .with_target_id("user-123")
//!     .with_content_type("image/png");
//!
//! let stored = client
//!     .upload(request, |p| println!("{}%", p.percentage), None)
//!     .await?;
//! println!("stored at {}", stored.url);
//!
//! assert!(client.delete(&stored.path).await?);
//! # Ok(())
//! # }
//! ```

mod abort;

pub use abort::AbortSignal;

use crate::http::{DeleteResponse, ErrorResponse, UploadResponse, UPLOAD_ROUTE};
use crate::storage::{ErrorCode, ResourceKind, UploadResult};
use bytes::Bytes;
use futures_util::stream;
use http::StatusCode;
use parking_lot::Mutex;
use reqwest::{multipart, Body};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Default number of bytes sent between progress reports
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Upload progress snapshot
///
/// Successive snapshots for one upload never decrease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    /// Bytes handed to the transport so far
    pub loaded: u64,
    /// Total file size
    pub total: u64,
    /// `loaded / total` as a whole percentage
    pub percentage: u8,
}

impl UploadProgress {
    /// Builds a snapshot; an empty file is complete by definition
    #[must_use]
    pub fn new(loaded: u64, total: u64) -> Self {
        let percentage = if total == 0 {
            100
        } else {
            u8::try_from(loaded.min(total) * 100 / total).unwrap_or(100)
        };
        Self {
            loaded,
            total,
            percentage,
        }
    }
}

/// Errors returned by [`UploadClient`]
#[derive(Debug, Error)]
pub enum UploadError {
    /// No usable response from the server
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a failure
    #[error("Upload rejected ({status}): {message}")]
    Rejected {
        /// HTTP status
        status: StatusCode,
        /// Storage error code, when the server supplied one
        code: Option<ErrorCode>,
        /// Server message
        message: String,
    },

    /// The server answered with success but the body was not understood
    #[error("Unreadable server response ({status}): {message}")]
    InvalidResponse {
        /// HTTP status
        status: StatusCode,
        /// Decoding failure
        message: String,
    },

    /// The caller's abort signal fired
    #[error("Upload aborted")]
    Aborted,

    /// The request could not be built
    #[error("Invalid upload request: {0}")]
    InvalidRequest(String),
}

impl UploadError {
    /// Storage error code for a server rejection
    #[must_use]
    pub const fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Rejected { code, .. } => *code,
            _ => None,
        }
    }
}

/// A file to upload
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Which resource the file is for
    pub kind: ResourceKind,
    /// Owning entity id
    pub target_id: Option<String>,
    /// Filename sent with the file part
    pub filename: String,
    /// Declared content type; the server sniffs when absent
    pub content_type: Option<String>,
    /// File contents
    pub data: Bytes,
}

impl UploadRequest {
    /// Creates a request with no target and no declared type
    #[must_use]
    pub fn new(kind: ResourceKind, filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            kind,
            target_id: None,
            filename: filename.into(),
            content_type: None,
            data: data.into(),
        }
    }

    /// Reads a local file, guessing its content type from the extension
    pub async fn from_path(kind: ResourceKind, path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut request = Self::new(kind, filename, data);
        request.content_type = mime_guess::from_path(path).first().map(|m| m.to_string());
        Ok(request)
    }

    /// Sets the owning entity id
    #[must_use]
    pub fn with_target_id(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    /// Sets the declared content type
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Client for the upload and delete endpoints
#[derive(Debug, Clone)]
pub struct UploadClient {
    http: reqwest::Client,
    base_url: String,
    chunk_size: usize,
}

impl UploadClient {
    /// Creates a client for the server at `base_url`
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Creates a client reusing an existing `reqwest` client
    #[must_use]
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Sets how many bytes are sent between progress reports
    #[must_use]
    pub const fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = if chunk_size == 0 { 1 } else { chunk_size };
        self
    }

    fn endpoint(&self) -> String {
        format!("{}{UPLOAD_ROUTE}", self.base_url)
    }

    /// Uploads a file, reporting progress as the body is sent
    ///
    /// `on_progress` receives non-decreasing snapshots ending at 100%. An
    /// empty file reports a single `(0, 0, 100)` once the server accepts it.
    pub async fn upload<F>(
        &self,
        request: UploadRequest,
        on_progress: F,
        abort: Option<&AbortSignal>,
    ) -> Result<UploadResult, UploadError>
    where
        F: FnMut(UploadProgress) + Send + 'static,
    {
        if abort.is_some_and(AbortSignal::is_aborted) {
            return Err(UploadError::Aborted);
        }

        let total = request.data.len() as u64;
        let on_progress = Arc::new(Mutex::new(on_progress));
        let form = self.build_form(request, Arc::clone(&on_progress))?;

        let stored = tokio::select! {
            biased;
            () = wait_for_abort(abort) => return Err(UploadError::Aborted),
            result = self.send_form(form) => result?,
        };

        if total == 0 {
            (*on_progress.lock())(UploadProgress::new(0, 0));
        }
        tracing::debug!(path = %stored.path, size = stored.size, "upload accepted");

        Ok(stored)
    }

    async fn send_form(&self, form: multipart::Form) -> Result<UploadResult, UploadError> {
        let response = self.http.post(self.endpoint()).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(rejection(status, response).await);
        }
        let body: UploadResponse = decode(status, response).await?;
        Ok(body.file)
    }

    fn build_form<F>(
        &self,
        request: UploadRequest,
        on_progress: Arc<Mutex<F>>,
    ) -> Result<multipart::Form, UploadError>
    where
        F: FnMut(UploadProgress) + Send + 'static,
    {
        let UploadRequest {
            kind,
            target_id,
            filename,
            content_type,
            data,
        } = request;
        let total = data.len() as u64;

        let chunks: Vec<Bytes> = (0..data.len())
            .step_by(self.chunk_size)
            .map(|start| data.slice(start..(start + self.chunk_size).min(data.len())))
            .collect();

        let mut loaded = 0_u64;
        let body = Body::wrap_stream(stream::iter(chunks.into_iter().map(move |chunk| {
            loaded += chunk.len() as u64;
            (*on_progress.lock())(UploadProgress::new(loaded, total));
            Ok::<_, std::io::Error>(chunk)
        })));

        let mut part = multipart::Part::stream_with_length(body, total).file_name(filename);
        if let Some(content_type) = content_type {
            part = part
                .mime_str(&content_type)
                .map_err(|e| UploadError::InvalidRequest(format!("{content_type:?}: {e}")))?;
        }

        let mut form = multipart::Form::new()
            .text("type", kind.as_str())
            .part("file", part);
        if let Some(target_id) = target_id {
            form = form.text("targetId", target_id);
        }
        Ok(form)
    }

    /// Deletes the object at `path`
    ///
    /// Returns `Ok(false)` when the server refuses (including when nothing
    /// is stored there).
    pub async fn delete(&self, path: &str) -> Result<bool, UploadError> {
        let response = self
            .http
            .delete(self.endpoint())
            .query(&[("path", path)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(path, %status, "delete rejected");
            return Ok(false);
        }

        let body: DeleteResponse = decode(status, response).await?;
        Ok(body.success)
    }
}

async fn wait_for_abort(abort: Option<&AbortSignal>) {
    match abort {
        Some(signal) => signal.aborted().await,
        None => std::future::pending().await,
    }
}

/// Reads a success body; transport failures stay `Network`
async fn decode<T: DeserializeOwned>(
    status: StatusCode,
    response: reqwest::Response,
) -> Result<T, UploadError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| UploadError::InvalidResponse {
        status,
        message: e.to_string(),
    })
}

async fn rejection(status: StatusCode, response: reqwest::Response) -> UploadError {
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&text) {
        Ok(body) => UploadError::Rejected {
            status,
            code: body.code,
            message: body.error,
        },
        Err(_) => UploadError::Rejected {
            status,
            code: None,
            message: status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        },
    }
}
