//! Local filesystem storage implementation

use super::paths::normalize_path;
use super::sidecar::{is_reserved_name, sidecar_path, staging_path, Sidecar};
use super::traits::StorageProvider;
use super::types::{
    FileMetadata, StorageError, StorageResult, UploadOptions, UploadResult, UrlResolver,
};
use super::validation::validate_file;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use walkdir::WalkDir;

/// Local filesystem storage backend
///
/// Stores each object as a plain file at `root/<path>`, with its metadata in
/// a sidecar next to it (see [`sidecar`](super::sidecar)).
///
/// # Directory Structure
///
/// ```text
/// /var/uploads/
/// ├── avatars/
/// │   ├── user-123
/// │   └── user-123.meta.json
/// └── submissions/
///     └── 42/
///         ├── slides.pdf
///         └── slides.pdf.meta.json
/// ```
///
/// Writes go to hidden `.upload-tmp` staging files first. Only once both
/// the bytes and the sidecar are flushed to disk are they renamed into
/// place, sidecar before object, so a reader that finds the object always
/// finds its metadata.
///
/// # Examples
///
/// ```rust,no_run
/// use cfp_storage::storage::{FilesystemStorage, StorageProvider, UploadOptions, UrlResolver};
///
/// # async fn example() -> anyhow::Result<()> {
/// // Create storage (creates directory if it doesn't exist)
/// let storage = FilesystemStorage::new("/var/uploads", UrlResolver::default())?;
///
/// let options = UploadOptions::new().with_content_type("application/pdf");
/// let stored = storage
///     .upload("submissions/42/slides.pdf", b"%PDF-1.7".to_vec(), options)
///     .await?;
///
/// // File is now at: /var/uploads/submissions/42/slides.pdf
/// assert_eq!(stored.url, "/api/files/submissions/42/slides.pdf");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FilesystemStorage {
    /// Base directory for file storage
    root: PathBuf,
    urls: UrlResolver,
}

impl FilesystemStorage {
    /// Creates a new filesystem storage instance
    ///
    /// The root directory is created if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The root exists but is not a directory (`INVALID_FILE`)
    /// - The root cannot be created (`UNKNOWN`)
    pub fn new(root: impl Into<PathBuf>, urls: UrlResolver) -> StorageResult<Self> {
        let root = root.into();

        // Synchronous checks are fine at startup
        if root.exists() && !root.is_dir() {
            return Err(StorageError::InvalidFile(
                "storage root is not a directory".to_string(),
            ));
        }
        std::fs::create_dir_all(&root)
            .map_err(|e| StorageError::wrap("Failed to create storage root", e))?;

        tracing::debug!(root = %root.display(), "filesystem storage ready");
        Ok(Self { root, urls })
    }

    /// The configured root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Confines `path` to the root
    ///
    /// Returns the normalized storage key and its location on disk.
    fn resolve(&self, path: &str) -> StorageResult<(String, PathBuf)> {
        let key = normalize_path(path);
        if key.is_empty() {
            return Err(StorageError::InvalidFile(format!(
                "{path:?} does not name an object"
            )));
        }

        let name = key.rsplit('/').next().unwrap_or_default();
        if is_reserved_name(name) {
            return Err(StorageError::InvalidFile(format!(
                "{key} uses a reserved suffix"
            )));
        }

        let location = self.root.join(&key);
        Ok((key, location))
    }

    /// [`resolve`](Self::resolve) for reads: a path that can never name an
    /// object is simply not found
    fn lookup(&self, path: &str) -> StorageResult<(String, PathBuf)> {
        self.resolve(path).map_err(|e| match e {
            StorageError::InvalidFile(_) => StorageError::NotFound(path.to_string()),
            other => other,
        })
    }

    async fn ensure_parent(location: &Path, key: &str) -> StorageResult<()> {
        if let Some(parent) = location.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::wrap(format!("Failed to create directories for {key}"), e))?;
        }
        Ok(())
    }

    /// Stats the object file, treating anything but a regular file as absent
    async fn stat_object(location: &Path, key: &str) -> StorageResult<std::fs::Metadata> {
        let stat = fs::metadata(location)
            .await
            .map_err(|e| StorageError::from_io(e, key))?;
        if stat.is_file() {
            Ok(stat)
        } else {
            Err(StorageError::NotFound(key.to_string()))
        }
    }

    async fn read_sidecar(location: &Path, key: &str) -> StorageResult<Option<Sidecar>> {
        match fs::read(sidecar_path(location)).await {
            Ok(bytes) => Sidecar::from_json(&bytes, key).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::wrap(
                format!("Failed to read metadata for {key}"),
                e,
            )),
        }
    }
}

/// Writes `data` to `path`, surfacing deferred write errors before syncing
async fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut f = fs::File::create(path).await?;
    f.write_all(data).await?;
    f.flush().await?;
    f.sync_all().await
}

/// A fully written hidden file waiting to be renamed over `target`
#[derive(Debug)]
struct Staged {
    staged: PathBuf,
    target: PathBuf,
}

impl Staged {
    async fn bytes(target: &Path, data: &[u8]) -> std::io::Result<Self> {
        let staged = staging_path(target);
        match write_synced(&staged, data).await {
            Ok(()) => Ok(Self {
                staged,
                target: target.to_path_buf(),
            }),
            Err(e) => {
                let _ = fs::remove_file(&staged).await;
                Err(e)
            }
        }
    }

    async fn copy_of(source: &Path, target: &Path) -> std::io::Result<Self> {
        let staged = staging_path(target);
        let result = async {
            fs::copy(source, &staged).await?;
            fs::File::open(&staged).await?.sync_all().await
        }
        .await;
        match result {
            Ok(()) => Ok(Self {
                staged,
                target: target.to_path_buf(),
            }),
            Err(e) => {
                let _ = fs::remove_file(&staged).await;
                Err(e)
            }
        }
    }

    async fn commit(self) -> std::io::Result<()> {
        let result = fs::rename(&self.staged, &self.target).await;
        if result.is_err() {
            self.discard().await;
        }
        result
    }

    async fn discard(self) {
        let _ = fs::remove_file(&self.staged).await;
    }
}

/// Puts a staged object and its metadata in place
///
/// Both files are already on disk. The sidecar is renamed first (or a stale
/// one removed when `sidecar` is `None`). If the object rename then fails
/// the previous sidecar is restored.
async fn publish(object: Staged, sidecar: Option<Staged>) -> std::io::Result<()> {
    let sidecar_target = sidecar_path(&object.target);

    let previous = match fs::read(&sidecar_target).await {
        Ok(bytes) => Some(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => {
            object.discard().await;
            if let Some(sidecar) = sidecar {
                sidecar.discard().await;
            }
            return Err(e);
        }
    };

    let placed = match sidecar {
        Some(sidecar) => sidecar.commit().await,
        None => remove_if_present(&sidecar_target).await,
    };
    if let Err(e) = placed {
        object.discard().await;
        return Err(e);
    }

    let target = object.target.clone();
    if let Err(e) = object.commit().await {
        if let Err(restore) = restore_sidecar(&sidecar_target, previous.as_deref()).await {
            tracing::warn!(
                path = %target.display(),
                error = %restore,
                "failed to restore metadata after aborted write"
            );
        }
        return Err(e);
    }
    Ok(())
}

async fn restore_sidecar(location: &Path, previous: Option<&[u8]>) -> std::io::Result<()> {
    match previous {
        Some(bytes) => Staged::bytes(location, bytes).await?.commit().await,
        None => remove_if_present(location).await,
    }
}

async fn remove_if_present(location: &Path) -> std::io::Result<()> {
    match fs::remove_file(location).await {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Collects object keys under `root/prefix`, skipping storage internals
fn walk(root: &Path, prefix: &str) -> StorageResult<Vec<String>> {
    let start = if prefix.is_empty() {
        root.to_path_buf()
    } else {
        root.join(prefix)
    };

    let mut keys = Vec::new();
    for entry in WalkDir::new(&start).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            // Missing prefix, or an entry removed mid-walk
            Err(e)
                if e.io_error().is_some_and(|io| {
                    matches!(io.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory)
                }) =>
            {
                continue
            }
            Err(e) => return Err(StorageError::wrap(format!("Failed to list {prefix:?}"), e)),
        };

        if !entry.file_type().is_file() || is_reserved_name(&entry.file_name().to_string_lossy()) {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        keys.push(key);
    }

    keys.sort();
    Ok(keys)
}

#[async_trait]
impl StorageProvider for FilesystemStorage {
    async fn upload(
        &self,
        path: &str,
        data: Vec<u8>,
        options: UploadOptions,
    ) -> StorageResult<UploadResult> {
        let (key, location) = self.resolve(path)?;
        let content_type = options.content_type_or_default().to_string();

        // Nothing touches the disk until the upload is known to be acceptable
        validate_file(&data, &content_type, &options)?;

        Self::ensure_parent(&location, &key).await?;

        let metadata = FileMetadata {
            path: key.clone(),
            size: data.len() as u64,
            content_type,
            last_modified: Utc::now(),
            is_public: options.is_public,
            metadata: options.metadata,
        };
        let record = Sidecar::new(metadata.clone()).to_json()?;

        let sidecar = Staged::bytes(&sidecar_path(&location), &record)
            .await
            .map_err(|e| StorageError::wrap(format!("Failed to write metadata for {key}"), e))?;
        let object = match Staged::bytes(&location, &data).await {
            Ok(object) => object,
            Err(e) => {
                sidecar.discard().await;
                return Err(StorageError::wrap(format!("Failed to write {key}"), e));
            }
        };
        publish(object, Some(sidecar))
            .await
            .map_err(|e| StorageError::wrap(format!("Failed to write {key}"), e))?;

        tracing::debug!(
            path = %key,
            size = metadata.size,
            content_type = %metadata.content_type,
            public = metadata.is_public,
            "stored object"
        );

        let url = self.url_for(&key, metadata.is_public);
        Ok(UploadResult::from_metadata(&metadata, url))
    }

    async fn download(&self, path: &str) -> StorageResult<Vec<u8>> {
        let (key, location) = self.lookup(path)?;
        fs::read(&location)
            .await
            .map_err(|e| StorageError::from_io(e, &key))
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        let (key, location) = self.lookup(path)?;
        Self::stat_object(&location, &key).await?;

        fs::remove_file(&location)
            .await
            .map_err(|e| StorageError::from_io(e, &key))?;

        // The object is gone; a leftover sidecar is harmless and gets
        // replaced by the next upload to this path
        if let Err(e) = remove_if_present(&sidecar_path(&location)).await {
            tracing::warn!(path = %key, error = %e, "failed to remove metadata sidecar");
        }

        tracing::debug!(path = %key, "deleted object");
        Ok(())
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let Ok((key, location)) = self.lookup(path) else {
            return Ok(false);
        };
        match fs::metadata(&location).await {
            Ok(stat) => Ok(stat.is_file()),
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                Ok(false)
            }
            Err(e) => Err(StorageError::wrap(format!("Failed to check {key}"), e)),
        }
    }

    async fn get_metadata(&self, path: &str) -> StorageResult<FileMetadata> {
        let (key, location) = self.lookup(path)?;
        let stat = Self::stat_object(&location, &key).await?;

        if let Some(sidecar) = Self::read_sidecar(&location, &key).await? {
            return Ok(sidecar.metadata);
        }

        // Placed outside the API: synthesize from the file itself
        let modified = stat
            .modified()
            .map_or_else(|_| Utc::now(), DateTime::<Utc>::from);
        Ok(FileMetadata::fallback(key, stat.len(), modified))
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let prefix = normalize_path(prefix);
        let root = self.root.clone();

        tokio::task::spawn_blocking(move || walk(&root, &prefix))
            .await
            .map_err(|e| StorageError::wrap("Listing task failed", e))?
    }

    async fn copy(&self, source: &str, dest: &str) -> StorageResult<()> {
        let (source_key, source_location) = self.lookup(source)?;
        let (dest_key, dest_location) = self.resolve(dest)?;

        Self::stat_object(&source_location, &source_key).await?;
        if source_key == dest_key {
            return Ok(());
        }

        Self::ensure_parent(&dest_location, &dest_key).await?;

        let sidecar = match Self::read_sidecar(&source_location, &source_key).await? {
            Some(sidecar) => {
                let mut metadata = sidecar.metadata;
                metadata.path.clone_from(&dest_key);
                let record = Sidecar::new(metadata).to_json()?;
                let staged = Staged::bytes(&sidecar_path(&dest_location), &record)
                    .await
                    .map_err(|e| {
                        StorageError::wrap(format!("Failed to write metadata for {dest_key}"), e)
                    })?;
                Some(staged)
            }
            // Legacy source: publishing without a sidecar clears any stale one
            None => None,
        };

        let object = match Staged::copy_of(&source_location, &dest_location).await {
            Ok(object) => object,
            Err(e) => {
                if let Some(sidecar) = sidecar {
                    sidecar.discard().await;
                }
                return Err(match e.kind() {
                    ErrorKind::NotFound => StorageError::NotFound(source_key),
                    _ => StorageError::wrap(format!("Failed to copy {source_key} to {dest_key}"), e),
                });
            }
        };
        publish(object, sidecar).await.map_err(|e| {
            StorageError::wrap(format!("Failed to copy {source_key} to {dest_key}"), e)
        })?;

        tracing::debug!(source = %source_key, dest = %dest_key, "copied object");
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        self.urls.public_url(path)
    }

    fn internal_url(&self, path: &str) -> String {
        self.urls.internal_url(path)
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}
