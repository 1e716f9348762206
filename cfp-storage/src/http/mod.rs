//! HTTP surface for uploads and file serving
//!
//! | Method | Route | Handler |
//! |---|---|---|
//! | `POST` | `/api/upload` | [`upload::upload_file`] |
//! | `DELETE` | `/api/upload?path=...` | [`upload::delete_file`] |
//! | `GET` | `/api/files/{*path}` | [`files::serve_internal`] |
//! | `GET` | `/uploads/{*path}` | [`files::serve_public`] |
//!
//! Every failure answers `{ "success": false, "error": ..., "code": ... }`
//! (see [`error::ApiError`]).
//!
//! # Example
//!
//! ```rust,no_run
//! use cfp_storage::http::router;
//! use cfp_storage::storage::{FilesystemStorage, UrlResolver};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let storage = Arc::new(FilesystemStorage::new("./uploads", UrlResolver::default())?);
//! let app = router(storage, 110 * 1024 * 1024);
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod extract;
pub mod files;
pub mod responses;
pub mod upload;

use crate::storage::{StorageProvider, INTERNAL_ROUTE, PUBLIC_ROUTE};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use responses::{DeleteResponse, ErrorResponse, UploadResponse};

/// Route accepting uploads and deletes
pub const UPLOAD_ROUTE: &str = "/api/upload";

/// Router state: the active storage provider
pub type SharedStorage = Arc<dyn StorageProvider>;

/// Builds the application router
///
/// `max_body_bytes` caps the whole request body; it should sit above the
/// largest per-kind upload ceiling so policy violations surface as
/// `SIZE_EXCEEDED` from validation rather than a transport error.
pub fn router(storage: SharedStorage, max_body_bytes: usize) -> Router {
    Router::new()
        .route(
            UPLOAD_ROUTE,
            post(upload::upload_file).delete(upload::delete_file),
        )
        .route(&format!("{INTERNAL_ROUTE}/{{*path}}"), get(files::serve_internal))
        .route(&format!("{PUBLIC_ROUTE}/{{*path}}"), get(files::serve_public))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(max_body_bytes)),
        )
        .with_state(storage)
}
