//! S3-compatible object store backend
//!
//! Objects map one-to-one onto bucket keys (optionally under a key prefix).
//! Metadata is native object metadata: `Content-Type`, size and
//! last-modified come from the object itself, caller metadata is stored as
//! user metadata, and visibility lives under the reserved
//! [`VISIBILITY_KEY`]. Works against AWS S3 and S3-compatible services such
//! as MinIO (set `endpoint` and `force_path_style`).
//!
//! Requires the `s3` feature.

use super::paths::normalize_path;
use super::provider::S3Settings;
use super::traits::StorageProvider;
use super::types::{
    FileMetadata, StorageError, StorageResult, UploadOptions, UploadResult, UrlResolver,
    DEFAULT_CONTENT_TYPE,
};
use super::validation::validate_file;
use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::head_object::HeadObjectOutput;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::MetadataDirective;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// User metadata key holding an object's visibility
pub const VISIBILITY_KEY: &str = "cfp-visibility";

/// S3-compatible storage backend
///
/// # Examples
///
/// ```rust,no_run
/// use cfp_storage::storage::{S3Settings, S3Storage, StorageProvider, UrlResolver};
///
/// # async fn example() -> anyhow::Result<()> {
/// let settings = S3Settings {
///     bucket: "cfp-uploads".to_string(),
///     endpoint: Some("http://localhost:9000".to_string()),
///     force_path_style: true,
///     ..S3Settings::default()
/// };
///
/// // Credentials come from the AWS SDK default chain
/// let storage = S3Storage::connect(&settings, UrlResolver::default()).await;
/// let bytes = storage.download("avatars/u1").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    key_prefix: String,
    urls: UrlResolver,
}

impl S3Storage {
    /// Creates a backend around an existing client
    #[must_use]
    pub fn new(
        client: Client,
        bucket: impl Into<String>,
        key_prefix: impl Into<String>,
        urls: UrlResolver,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            key_prefix: normalize_path(&key_prefix.into()),
            urls,
        }
    }

    /// Creates a backend using the AWS SDK default credential chain
    pub async fn connect(settings: &S3Settings, mut urls: UrlResolver) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()));
        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        let config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(settings.force_path_style)
            .build();

        if let Some(public_base_url) = &settings.public_base_url {
            urls.public_base_url.clone_from(public_base_url);
        }

        tracing::debug!(
            bucket = %settings.bucket,
            region = %settings.region,
            endpoint = ?settings.endpoint,
            "object store storage ready"
        );
        Self::new(
            Client::from_conf(config),
            settings.bucket.clone(),
            settings.key_prefix.clone(),
            urls,
        )
    }

    /// Normalized storage key and the bucket key it lives under
    fn resolve(&self, path: &str) -> StorageResult<(String, String)> {
        let key = normalize_path(path);
        if key.is_empty() {
            return Err(StorageError::InvalidFile(format!(
                "{path:?} does not name an object"
            )));
        }
        let object_key = self.object_key(&key);
        Ok((key, object_key))
    }

    /// [`resolve`](Self::resolve) for reads: an empty path is not found
    fn lookup(&self, path: &str) -> StorageResult<(String, String)> {
        self.resolve(path).map_err(|_| StorageError::NotFound(path.to_string()))
    }

    fn object_key(&self, key: &str) -> String {
        join_key(&self.key_prefix, key)
    }

    async fn head(&self, key: &str, object_key: &str) -> StorageResult<HeadObjectOutput> {
        self.client
            .head_object()
            .bucket(&self.bucket)
            .key(object_key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))
    }
}

fn join_key(prefix: &str, key: &str) -> String {
    match (prefix.is_empty(), key.is_empty()) {
        (true, _) => key.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{prefix}/{key}"),
    }
}

/// Whether `key` falls under the directory-like `prefix`
fn under_prefix(key: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || key == prefix
        || key
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// User metadata written alongside an object
fn user_metadata(options: &UploadOptions) -> HashMap<String, String> {
    let mut metadata = options.metadata.clone();
    metadata.insert(
        VISIBILITY_KEY.to_string(),
        if options.is_public { "public" } else { "private" }.to_string(),
    );
    metadata
}

/// Splits stored user metadata into visibility and caller metadata
fn split_user_metadata(stored: Option<&HashMap<String, String>>) -> (bool, HashMap<String, String>) {
    let mut metadata = stored.cloned().unwrap_or_default();
    let is_public = metadata
        .remove(VISIBILITY_KEY)
        .is_some_and(|v| v.eq_ignore_ascii_case("public"));
    (is_public, metadata)
}

fn to_chrono(value: Option<&aws_sdk_s3::primitives::DateTime>) -> DateTime<Utc> {
    value
        .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
        .unwrap_or_else(Utc::now)
}

/// Translates an SDK failure into the storage taxonomy
fn map_sdk_error<E>(err: SdkError<E, HttpResponse>, key: &str) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let code = err.code().map(ToOwned::to_owned);
    let status = err.raw_response().map(|r| r.status().as_u16());

    match (code.as_deref(), status) {
        (Some("NoSuchKey" | "NotFound"), _) | (_, Some(404)) => {
            StorageError::NotFound(key.to_string())
        }
        (Some("AccessDenied"), _) | (_, Some(403)) => {
            StorageError::PermissionDenied(key.to_string())
        }
        _ => StorageError::wrap(format!("Object store request failed for {key}"), err),
    }
}

#[async_trait]
impl StorageProvider for S3Storage {
    async fn upload(
        &self,
        path: &str,
        data: Vec<u8>,
        options: UploadOptions,
    ) -> StorageResult<UploadResult> {
        let (key, object_key) = self.resolve(path)?;
        let content_type = options.content_type_or_default().to_string();
        validate_file(&data, &content_type, &options)?;

        let size = data.len() as u64;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .content_type(&content_type)
            .set_metadata(Some(user_metadata(&options)))
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &key))?;

        let metadata = FileMetadata {
            path: key,
            size,
            content_type,
            last_modified: Utc::now(),
            is_public: options.is_public,
            metadata: options.metadata,
        };
        tracing::debug!(path = %metadata.path, size, bucket = %self.bucket, "stored object");

        let url = self.url_for(&metadata.path, metadata.is_public);
        Ok(UploadResult::from_metadata(&metadata, url))
    }

    async fn download(&self, path: &str) -> StorageResult<Vec<u8>> {
        let (key, object_key) = self.lookup(path)?;
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &key))?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::wrap(format!("Failed to read {key}"), e))?;
        Ok(bytes.into_bytes().to_vec())
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        let (key, object_key) = self.lookup(path)?;

        // DeleteObject succeeds for missing keys
        self.head(&key, &object_key).await?;

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &key))?;

        tracing::debug!(path = %key, bucket = %self.bucket, "deleted object");
        Ok(())
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let Ok((key, object_key)) = self.lookup(path) else {
            return Ok(false);
        };
        match self.head(&key, &object_key).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn get_metadata(&self, path: &str) -> StorageResult<FileMetadata> {
        let (key, object_key) = self.lookup(path)?;
        let head = self.head(&key, &object_key).await?;

        let (is_public, metadata) = split_user_metadata(head.metadata());
        Ok(FileMetadata {
            size: head
                .content_length()
                .and_then(|len| u64::try_from(len).ok())
                .unwrap_or_default(),
            content_type: head
                .content_type()
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string(),
            last_modified: to_chrono(head.last_modified()),
            is_public,
            metadata,
            path: key,
        })
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let prefix = normalize_path(prefix);
        let wanted = self.object_key(&prefix);

        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&wanted)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| map_sdk_error(e, &prefix))?;

            for object in page.contents() {
                let Some(object_key) = object.key() else {
                    continue;
                };
                if !under_prefix(object_key, &wanted) {
                    continue;
                }
                let key = if self.key_prefix.is_empty() {
                    object_key
                } else {
                    object_key
                        .strip_prefix(self.key_prefix.as_str())
                        .map_or(object_key, |rest| rest.trim_start_matches('/'))
                };
                keys.push(key.to_string());
            }

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn copy(&self, source: &str, dest: &str) -> StorageResult<()> {
        let (source_key, source_object) = self.lookup(source)?;
        let (dest_key, dest_object) = self.resolve(dest)?;

        self.head(&source_key, &source_object).await?;
        if source_key == dest_key {
            return Ok(());
        }

        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(format!("{}/{source_object}", self.bucket))
            .key(&dest_object)
            .metadata_directive(MetadataDirective::Copy)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &source_key))?;

        tracing::debug!(source = %source_key, dest = %dest_key, bucket = %self.bucket, "copied object");
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        self.urls.public_url(path)
    }

    fn internal_url(&self, path: &str) -> String {
        self.urls.internal_url(path)
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}
