//! cfp-storage: backend-agnostic file storage for conference call-for-papers uploads
//!
//! Speaker avatars, submission materials, organization logos and event
//! banners all flow through a single [`StorageProvider`](storage::StorageProvider)
//! contract. The backend (local filesystem, or an S3-compatible object store
//! with the `s3` feature) is chosen once from configuration; everything
//! downstream is backend-agnostic.
//!
//! # Layers
//!
//! - [`storage`]: the provider contract, path builders, validation and the
//!   backends
//! - [`http`]: `axum` routes for upload, delete and file serving
//! - [`client`]: a progress-reporting upload client for those routes
//! - [`config`] and [`observability`]: layered configuration and logging
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use cfp_storage::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     cfp_storage::observability::init()?;
//!
//!     let config = CfpStorageConfig::load_for_service("cfp-storage")?;
//!     let provider = cfp_storage::storage::init(&config.storage).await?;
//!
//!     let app = router(provider, config.server.max_body_bytes);
//!     let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `s3` - S3-compatible object storage backend (AWS S3, `MinIO`, ...)

// Lint configuration is handled at the workspace level in Cargo.toml
// Additional crate-specific allows:
#![allow(clippy::missing_errors_doc)]

pub mod client;
pub mod config;
pub mod http;
pub mod observability;
pub mod storage;

pub mod prelude {
    //! Convenience re-exports for common types and traits
    //!
    //! ```rust
    //! use cfp_storage::prelude::*;
    //! ```

    pub use crate::client::{AbortSignal, UploadClient, UploadError, UploadProgress, UploadRequest};
    pub use crate::config::CfpStorageConfig;
    pub use crate::http::{router, ApiError, SharedStorage};
    pub use crate::storage::{
        paths, ErrorCode, FileMetadata, FilesystemStorage, ResourceKind, StorageError,
        StorageProvider, StorageResult, UploadOptions, UploadResult, UrlResolver,
    };
}
