//! File storage abstraction and implementations
//!
//! This module provides a trait-based abstraction for file storage with multiple backends:
//! - Local filesystem storage (default)
//! - S3-compatible storage (AWS S3, MinIO, etc.) behind the `s3` feature
//!
//! # Architecture
//!
//! The [`StorageProvider`] trait is the only thing callers depend on. A
//! caller picks a logical resource, builds its canonical path with
//! [`paths`], and hands bytes to the active provider, which validates,
//! persists bytes plus metadata, and returns an [`UploadResult`]. The
//! backend is chosen once from [`StorageConfig`] by [`create_provider`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use cfp_storage::storage::{paths, FilesystemStorage, ResourceKind, StorageProvider, UrlResolver};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let storage = FilesystemStorage::new("/var/uploads", UrlResolver::default())?;
//!
//! let path = paths::avatar_path("user-123");
//! let options = ResourceKind::Avatar
//!     .upload_options()
//!     .with_content_type("image/png");
//!
//! let stored = storage.upload(&path, vec![/* ... */], options).await?;
//! println!("Stored file at {}", stored.url);
//!
//! // Retrieve the file
//! let data = storage.download(&stored.path).await?;
//!
//! // Delete the file
//! storage.delete(&stored.path).await?;
//! # Ok(())
//! # }
//! ```

mod local;
pub mod paths;
mod provider;
#[cfg(feature = "s3")]
mod s3;
pub mod sidecar;
mod traits;
mod types;
pub mod validation;

pub use local::FilesystemStorage;
pub use paths::{normalize_path, ResourceKind};
pub use provider::{
    create_provider, init, reinitialize, reset, storage, BackendSettings, LocalSettings,
    S3Settings, StorageConfig,
};
#[cfg(feature = "s3")]
pub use s3::{S3Storage, VISIBILITY_KEY};
pub use traits::{copy_then_delete, StorageProvider};
pub use types::{
    ErrorCode, FileMetadata, ParseErrorCodeError, StorageError, StorageResult, UploadOptions,
    UploadResult, UrlResolver, DEFAULT_CONTENT_TYPE, INTERNAL_ROUTE, PUBLIC_ROUTE,
};

#[cfg(test)]
pub use traits::MockStorageProvider;
