//! Core types for file storage

use super::paths::normalize_path;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Content type recorded when an upload does not declare one
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Machine-readable error codes exposed across the storage contract
///
/// This is a closed set: every backend translates its native failures into
/// one of these before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No object exists at the requested path
    NotFound,
    /// The backend refused access to the object
    PermissionDenied,
    /// The file or path is malformed
    InvalidFile,
    /// The file is larger than the permitted ceiling
    SizeExceeded,
    /// The declared content type is not on the allow-list
    TypeNotAllowed,
    /// Any other backend failure
    Unknown,
}

impl ErrorCode {
    /// Returns the wire representation of the code
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cfp_storage::storage::ErrorCode;
    ///
    /// assert_eq!(ErrorCode::SizeExceeded.as_str(), "SIZE_EXCEEDED");
    /// ```
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::InvalidFile => "INVALID_FILE",
            Self::SizeExceeded => "SIZE_EXCEEDED",
            Self::TypeNotAllowed => "TYPE_NOT_ALLOWED",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Whether retrying the same call can succeed
    ///
    /// Validation and not-found failures are deterministic; only `UNKNOWN`
    /// (disk full, network partition, ...) is worth a caller-level retry.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognised error code
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unrecognised storage error code: {0}")]
pub struct ParseErrorCodeError(pub String);

impl FromStr for ErrorCode {
    type Err = ParseErrorCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_FOUND" => Ok(Self::NotFound),
            "PERMISSION_DENIED" => Ok(Self::PermissionDenied),
            "INVALID_FILE" => Ok(Self::InvalidFile),
            "SIZE_EXCEEDED" => Ok(Self::SizeExceeded),
            "TYPE_NOT_ALLOWED" => Ok(Self::TypeNotAllowed),
            "UNKNOWN" => Ok(Self::Unknown),
            other => Err(ParseErrorCodeError(other.to_string())),
        }
    }
}

/// Errors that can occur during file storage operations
///
/// Every variant maps onto exactly one [`ErrorCode`]. Messages refer to
/// logical storage paths, never to locations on disk.
#[derive(Debug, Error)]
pub enum StorageError {
    /// File not found in storage
    #[error("File not found: {0}")]
    NotFound(String),

    /// Access to the object was refused by the backend
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Malformed file, content type, or storage path
    #[error("Invalid file: {0}")]
    InvalidFile(String),

    /// File size exceeds limit
    #[error("File size {actual} exceeds limit of {limit} bytes")]
    SizeExceeded {
        /// Actual file size
        actual: u64,
        /// Maximum allowed size
        limit: u64,
    },

    /// Content type is not on the allow-list
    #[error("File type {actual} is not allowed (allowed: {})", .allowed.join(", "))]
    TypeNotAllowed {
        /// Declared content type
        actual: String,
        /// Permitted content types
        allowed: Vec<String>,
    },

    /// Generic storage error, optionally wrapping the backend failure
    #[error("Storage error: {message}")]
    Unknown {
        /// Human readable description
        message: String,
        /// Underlying backend error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StorageError {
    /// Returns the machine-readable code for this error
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cfp_storage::storage::{ErrorCode, StorageError};
    ///
    /// let err = StorageError::NotFound("avatars/u1".to_string());
    /// assert_eq!(err.code(), ErrorCode::NotFound);
    /// ```
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::PermissionDenied(_) => ErrorCode::PermissionDenied,
            Self::InvalidFile(_) => ErrorCode::InvalidFile,
            Self::SizeExceeded { .. } => ErrorCode::SizeExceeded,
            Self::TypeNotAllowed { .. } => ErrorCode::TypeNotAllowed,
            Self::Unknown { .. } => ErrorCode::Unknown,
        }
    }

    /// Creates an `UNKNOWN` error without an underlying cause
    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an `UNKNOWN` error wrapping a backend failure
    #[must_use]
    pub fn wrap(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Unknown {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Translates an OS error raised while operating on `path`
    ///
    /// "Does not exist" (including a directory standing where an object is
    /// expected) becomes `NOT_FOUND`; every other failure is wrapped
    /// as `UNKNOWN` with the original error kept as the source.
    #[must_use]
    pub fn from_io(err: std::io::Error, path: &str) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound
            | std::io::ErrorKind::NotADirectory
            | std::io::ErrorKind::IsADirectory => Self::NotFound(path.to_string()),
            _ => Self::wrap(format!("I/O failure on {path}"), err),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Per-call constraints for an upload
///
/// Options are never persisted on their own; the relevant parts end up in
/// the object's [`FileMetadata`].
///
/// # Examples
///
/// ```rust
/// use cfp_storage::storage::UploadOptions;
///
/// let options = UploadOptions::new()
///     .with_content_type("image/png")
///     .with_max_size(1024)
///     .with_allowed_types(["image/png", "image/jpeg"])
///     .public();
///
/// assert!(options.is_public);
/// assert_eq!(options.max_size, Some(1024));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOptions {
    /// Declared MIME type of the payload
    pub content_type: Option<String>,

    /// Byte ceiling
    pub max_size: Option<u64>,

    /// MIME allow-list (`None` accepts every type)
    pub allowed_types: Option<Vec<String>>,

    /// Whether the object may be served without access checks
    #[serde(default)]
    pub is_public: bool,

    /// Opaque caller metadata stored with the object
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl UploadOptions {
    /// Creates options with no constraints
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the declared content type
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets the byte ceiling
    #[must_use]
    pub const fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = Some(max_size);
        self
    }

    /// Restricts the accepted content types
    #[must_use]
    pub fn with_allowed_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    /// Marks the object as publicly readable
    #[must_use]
    pub const fn public(mut self) -> Self {
        self.is_public = true;
        self
    }

    /// Adds one opaque metadata entry
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Declared content type, or the generic binary type when absent
    #[must_use]
    pub fn content_type_or_default(&self) -> &str {
        self.content_type
            .as_deref()
            .map(str::trim)
            .filter(|ct| !ct.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
    }
}

/// Durable description of a stored object
///
/// Created at upload time and overwritten by a later upload to the same
/// path. The filesystem backend persists it as a sidecar file; object stores
/// map it onto native object metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    /// Logical storage path
    pub path: String,

    /// Object size in bytes
    pub size: u64,

    /// MIME content type
    pub content_type: String,

    /// Time of the last write
    pub last_modified: DateTime<Utc>,

    /// Whether the object may be served without access checks
    #[serde(default)]
    pub is_public: bool,

    /// Opaque caller metadata
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl FileMetadata {
    /// Metadata synthesized for an object that has no explicit record
    ///
    /// Used for files placed in storage outside the API: generic content
    /// type, private.
    #[must_use]
    pub fn fallback(path: impl Into<String>, size: u64, last_modified: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            size,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            last_modified,
            is_public: false,
            metadata: HashMap::new(),
        }
    }
}

impl fmt::Display for FileMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FileMetadata(path={}, size={}, content_type={})",
            self.path, self.size, self.content_type
        )
    }
}

/// Value returned from a successful upload
///
/// Derived rather than stored: it can always be recomputed from
/// [`FileMetadata`] plus the backend's URL rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    /// Resolved (normalized) storage path
    pub path: String,

    /// URL the object can be fetched from
    pub url: String,

    /// Size in bytes
    pub size: u64,

    /// MIME content type
    pub content_type: String,
}

impl UploadResult {
    /// Builds the result for an object from its metadata
    #[must_use]
    pub fn from_metadata(metadata: &FileMetadata, url: impl Into<String>) -> Self {
        Self {
            path: metadata.path.clone(),
            url: url.into(),
            size: metadata.size,
            content_type: metadata.content_type.clone(),
        }
    }
}

/// Route prefix that serves public objects
pub const PUBLIC_ROUTE: &str = "/uploads";

/// Route prefix that serves objects through the access-controlled endpoint
pub const INTERNAL_ROUTE: &str = "/api/files";

/// Pure URL construction for stored objects
///
/// Public URLs are for direct, cache-friendly access; internal URLs route
/// through the access-controlled file endpoint. Neither touches the backend.
///
/// # Examples
///
/// ```rust
/// use cfp_storage::storage::UrlResolver;
///
/// let urls = UrlResolver::default();
/// assert_eq!(urls.public_url("avatars/u1"), "/uploads/avatars/u1");
/// assert_eq!(urls.internal_url("avatars/u1"), "/api/files/avatars/u1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlResolver {
    /// Base for public URLs (path or absolute URL)
    pub public_base_url: String,

    /// Base for internal URLs (path or absolute URL)
    pub internal_base_url: String,
}

impl Default for UrlResolver {
    fn default() -> Self {
        Self {
            public_base_url: PUBLIC_ROUTE.to_string(),
            internal_base_url: INTERNAL_ROUTE.to_string(),
        }
    }
}

impl UrlResolver {
    /// Creates a resolver with explicit bases
    #[must_use]
    pub fn new(public_base_url: impl Into<String>, internal_base_url: impl Into<String>) -> Self {
        Self {
            public_base_url: public_base_url.into(),
            internal_base_url: internal_base_url.into(),
        }
    }

    /// URL for direct access to `path`
    #[must_use]
    pub fn public_url(&self, path: &str) -> String {
        join_url(&self.public_base_url, path)
    }

    /// URL for access-controlled access to `path`
    #[must_use]
    pub fn internal_url(&self, path: &str) -> String {
        join_url(&self.internal_base_url, path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), normalize_path(path))
}
