//! Storage provider contract

use super::types::{FileMetadata, StorageResult, UploadOptions, UploadResult};
use async_trait::async_trait;

/// Abstraction over where uploaded bytes live
///
/// Every backend (local filesystem, S3-compatible object store, ...)
/// implements this trait, and callers depend only on it. The active backend
/// is chosen once from configuration (see [`create_provider`]); nothing
/// downstream branches on the concrete type.
///
/// # Contract
///
/// - Paths are logical, root-relative [`StoragePath`] strings. Backends
///   normalize them and can never be made to touch anything outside their
///   root.
/// - Only [`StorageError`] crosses this boundary. Native errors are
///   translated, with the original kept as the source of `UNKNOWN`.
/// - `upload` validates before any I/O and never leaves a partial object.
///   Readers never observe bytes without metadata.
/// - There is no locking: concurrent writes to the same path race and the
///   last writer wins.
///
/// # Examples
///
/// ```rust,no_run
/// use cfp_storage::storage::{FilesystemStorage, StorageProvider, UploadOptions, UrlResolver};
///
/// # async fn example() -> anyhow::Result<()> {
/// let storage = FilesystemStorage::new("/var/uploads", UrlResolver::default())?;
///
/// let options = UploadOptions::new()
///     .with_content_type("image/png")
///     .with_max_size(1024);
/// let result = storage.upload("avatars/u1", vec![0; 12], options).await?;
/// assert_eq!(result.size, 12);
///
/// storage.copy("avatars/u1", "avatars/u1-backup").await?;
/// storage.delete("avatars/u1").await?;
/// assert!(storage.exists("avatars/u1-backup").await?);
/// # Ok(())
/// # }
/// ```
///
/// [`create_provider`]: super::create_provider
/// [`StoragePath`]: super::paths
/// [`StorageError`]: super::StorageError
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Validates and stores `data` at `path`, replacing any existing object
    ///
    /// # Errors
    ///
    /// - `SIZE_EXCEEDED` / `TYPE_NOT_ALLOWED` / `INVALID_FILE` from
    ///   validation, before any write
    /// - `INVALID_FILE` if `path` cannot name an object
    /// - `UNKNOWN` if the backend write fails
    async fn upload(
        &self,
        path: &str,
        data: Vec<u8>,
        options: UploadOptions,
    ) -> StorageResult<UploadResult>;

    /// Reads the bytes stored at `path`
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` if nothing is stored at `path`, including paths
    /// that can never name an object (empty, or a reserved internal name)
    async fn download(&self, path: &str) -> StorageResult<Vec<u8>>;

    /// Removes the object and its metadata
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` if nothing is stored at `path`, including paths
    /// that can never name an object (empty, or a reserved internal name)
    async fn delete(&self, path: &str) -> StorageResult<()>;

    /// Checks whether an object is stored at `path`
    ///
    /// # Errors
    ///
    /// Only for genuine backend failures; a missing object, or a path that
    /// can never name one, is `Ok(false)`
    async fn exists(&self, path: &str) -> StorageResult<bool>;

    /// Returns the object's metadata, synthesized from stat data when no
    /// explicit record exists
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` if nothing is stored at `path`, including paths
    /// that can never name an object (empty, or a reserved internal name)
    async fn get_metadata(&self, path: &str) -> StorageResult<FileMetadata>;

    /// Lists every object under `prefix`, recursively
    ///
    /// The prefix is directory-like: `list("a")` matches `a/1` and `a/x/2`
    /// but not `ab/1`. An empty prefix lists everything. Results are sorted
    /// and never include internal metadata artifacts.
    ///
    /// # Errors
    ///
    /// Only for genuine backend failures; no matches is an empty list
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Duplicates an object and its metadata to `dest`
    ///
    /// # Errors
    ///
    /// - `NOT_FOUND` if `source` does not exist
    /// - `INVALID_FILE` if `dest` cannot name an object
    async fn copy(&self, source: &str, dest: &str) -> StorageResult<()>;

    /// Moves an object by copying it then deleting the source
    ///
    /// This is not atomic. If the delete step fails the object exists at
    /// both paths; the failure is logged and returned so the caller can
    /// retry the delete. The copy is never rolled back.
    ///
    /// # Errors
    ///
    /// Any error from [`copy`](Self::copy) or [`delete`](Self::delete)
    async fn move_object(&self, source: &str, dest: &str) -> StorageResult<()> {
        copy_then_delete(self, source, dest).await
    }

    /// URL for direct, unauthenticated access
    fn public_url(&self, path: &str) -> String;

    /// URL routed through the access-controlled file endpoint
    fn internal_url(&self, path: &str) -> String;

    /// URL matching the object's visibility
    fn url_for(&self, path: &str, is_public: bool) -> String {
        if is_public {
            self.public_url(path)
        } else {
            self.internal_url(path)
        }
    }

    /// Short backend identifier, for logs and diagnostics only
    fn backend_name(&self) -> &'static str;
}

/// Shared implementation of [`StorageProvider::move_object`]
///
/// Backends that override `move_object` with a native rename can still fall
/// back to this.
///
/// # Errors
///
/// Any error from the provider's `copy` or `delete`
pub async fn copy_then_delete<P>(provider: &P, source: &str, dest: &str) -> StorageResult<()>
where
    P: StorageProvider + ?Sized,
{
    provider.copy(source, dest).await?;

    if let Err(e) = provider.delete(source).await {
        tracing::warn!(
            source,
            dest,
            code = %e.code(),
            error = %e,
            "move copied object but failed to delete source; object now exists at both paths"
        );
        return Err(e);
    }

    tracing::debug!(source, dest, "moved object");
    Ok(())
}
