//! Backend selection and the process-wide provider
//!
//! The backend is chosen once, from configuration, by [`create_provider`].
//! Prefer passing the returned `Arc<dyn StorageProvider>` explicitly (the
//! HTTP router takes it as state). [`init`] / [`storage`] exist for code
//! that cannot be threaded through, and [`reinitialize`] / [`reset`] let
//! tests swap the instance.
//!
//! # Example Configuration
//!
//! ```toml
//! [storage.urls]
//! public_base_url = "/uploads"
//! internal_base_url = "/api/files"
//!
//! [storage.backend]
//! provider = "local"
//! root = "./uploads"
//!
//! # or
//! # [storage.backend]
//! # provider = "s3"
//! # bucket = "cfp-uploads"
//! # region = "eu-west-1"
//! # endpoint = "http://localhost:9000"
//! # force_path_style = true
//! ```

use super::local::FilesystemStorage;
use super::traits::StorageProvider;
use super::types::{StorageError, StorageResult, UrlResolver};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Storage configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// URL bases for public and internal access
    pub urls: UrlResolver,

    /// Which backend holds the bytes
    pub backend: BackendSettings,
}

/// Backend selection, tagged by `provider`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum BackendSettings {
    /// Local filesystem
    Local(LocalSettings),
    /// S3-compatible object store
    S3(S3Settings),
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self::Local(LocalSettings::default())
    }
}

/// Filesystem backend settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalSettings {
    /// Storage root directory
    pub root: PathBuf,
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./uploads"),
        }
    }
}

/// Object store backend settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Settings {
    /// Bucket name
    pub bucket: String,

    /// Region
    pub region: String,

    /// Custom endpoint for S3-compatible services
    pub endpoint: Option<String>,

    /// Use path-style addressing (needed by most self-hosted services)
    pub force_path_style: bool,

    /// Key prefix every object is stored under
    pub key_prefix: String,

    /// Public base URL (e.g. a CDN) overriding `storage.urls.public_base_url`
    pub public_base_url: Option<String>,
}

impl Default for S3Settings {
    fn default() -> Self {
        Self {
            bucket: "cfp-uploads".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            force_path_style: false,
            key_prefix: String::new(),
            public_base_url: None,
        }
    }
}

/// Builds the configured backend
///
/// # Errors
///
/// - The filesystem root cannot be prepared
/// - The S3 backend is configured but the crate was built without the `s3`
///   feature (`UNKNOWN`)
///
/// # Examples
///
/// ```rust,no_run
/// use cfp_storage::storage::{create_provider, StorageConfig};
///
/// # async fn example() -> anyhow::Result<()> {
/// let provider = create_provider(&StorageConfig::default()).await?;
/// println!("using {} storage", provider.backend_name());
/// # Ok(())
/// # }
/// ```
#[cfg_attr(not(feature = "s3"), allow(clippy::unused_async))]
pub async fn create_provider(config: &StorageConfig) -> StorageResult<Arc<dyn StorageProvider>> {
    match &config.backend {
        BackendSettings::Local(local) => {
            let storage = FilesystemStorage::new(local.root.clone(), config.urls.clone())?;
            Ok(Arc::new(storage))
        }
        #[cfg(feature = "s3")]
        BackendSettings::S3(s3) => {
            let storage = super::s3::S3Storage::connect(s3, config.urls.clone()).await;
            Ok(Arc::new(storage))
        }
        #[cfg(not(feature = "s3"))]
        BackendSettings::S3(_) => Err(StorageError::unknown(
            "S3 storage is configured but cfp-storage was built without the `s3` feature",
        )),
    }
}

static PROVIDER: Lazy<RwLock<Option<Arc<dyn StorageProvider>>>> = Lazy::new(|| RwLock::new(None));

/// Builds the configured backend and installs it as the process-wide provider
///
/// Call once at startup.
///
/// # Errors
///
/// - A provider is already installed (`UNKNOWN`); use [`reinitialize`] to
///   replace it deliberately
/// - Any error from [`create_provider`]
pub async fn init(config: &StorageConfig) -> StorageResult<Arc<dyn StorageProvider>> {
    if PROVIDER.read().is_some() {
        return Err(StorageError::unknown("storage provider already initialized"));
    }

    let provider = create_provider(config).await?;

    let mut slot = PROVIDER.write();
    if slot.is_some() {
        return Err(StorageError::unknown("storage provider already initialized"));
    }
    *slot = Some(Arc::clone(&provider));
    drop(slot);

    tracing::info!(backend = provider.backend_name(), "storage provider initialized");
    Ok(provider)
}

/// The process-wide provider
///
/// # Errors
///
/// Returns `UNKNOWN` if [`init`] has not been called
pub fn storage() -> StorageResult<Arc<dyn StorageProvider>> {
    PROVIDER
        .read()
        .clone()
        .ok_or_else(|| StorageError::unknown("storage provider not initialized"))
}

/// Replaces the process-wide provider, returning the previous one
pub fn reinitialize(provider: Arc<dyn StorageProvider>) -> Option<Arc<dyn StorageProvider>> {
    tracing::debug!(backend = provider.backend_name(), "storage provider replaced");
    PROVIDER.write().replace(provider)
}

/// Clears the process-wide provider
pub fn reset() {
    PROVIDER.write().take();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ErrorCode;
    use tempfile::TempDir;

    fn local_config(temp: &TempDir) -> StorageConfig {
        StorageConfig {
            urls: UrlResolver::default(),
            backend: BackendSettings::Local(LocalSettings {
                root: temp.path().join("uploads"),
            }),
        }
    }

    #[tokio::test]
    async fn test_create_local_provider() {
        let temp = TempDir::new().unwrap();
        let provider = create_provider(&local_config(&temp)).await.unwrap();

        assert_eq!(provider.backend_name(), "filesystem");
        assert!(temp.path().join("uploads").is_dir());
    }

    #[cfg(not(feature = "s3"))]
    #[tokio::test]
    async fn test_s3_requires_feature() {
        let config = StorageConfig {
            backend: BackendSettings::S3(S3Settings::default()),
            ..StorageConfig::default()
        };
        let err = create_provider(&config).await.err().unwrap();
        assert_eq!(err.code(), ErrorCode::Unknown);
    }

    // Single test so the shared slot isn't raced by parallel tests
    #[tokio::test]
    async fn test_process_wide_lifecycle() {
        let temp = TempDir::new().unwrap();
        reset();

        assert!(storage().is_err());

        let installed = init(&local_config(&temp)).await.unwrap();
        assert!(Arc::ptr_eq(&installed, &storage().unwrap()));

        let err = init(&local_config(&temp)).await.err().unwrap();
        assert_eq!(err.code(), ErrorCode::Unknown);

        let other_root = TempDir::new().unwrap();
        let replacement = create_provider(&local_config(&other_root)).await.unwrap();
        let previous = reinitialize(Arc::clone(&replacement)).unwrap();
        assert!(Arc::ptr_eq(&previous, &installed));
        assert!(Arc::ptr_eq(&storage().unwrap(), &replacement));

        reset();
        assert!(storage().is_err());
    }

    #[test]
    fn test_backend_settings_tagging() {
        let local: BackendSettings = toml::from_str("provider = \"local\"\nroot = \"/srv/uploads\"").unwrap();
        assert_eq!(
            local,
            BackendSettings::Local(LocalSettings {
                root: PathBuf::from("/srv/uploads")
            })
        );

        let s3: BackendSettings =
            toml::from_str("provider = \"s3\"\nbucket = \"b\"\nforce_path_style = true").unwrap();
        let BackendSettings::S3(s3) = s3 else {
            panic!("expected s3 settings");
        };
        assert_eq!(s3.bucket, "b");
        assert_eq!(s3.region, "us-east-1");
        assert!(s3.force_path_style);
    }
}
