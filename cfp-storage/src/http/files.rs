//! File serving with range requests and cache validators
//!
//! Two routes serve stored bytes:
//! - the internal route ([`INTERNAL_ROUTE`](crate::storage::INTERNAL_ROUTE))
//!   serves any object with `Cache-Control: private`
//! - the public route ([`PUBLIC_ROUTE`](crate::storage::PUBLIC_ROUTE)) serves
//!   only objects whose metadata marks them public, and answers 404 for the
//!   rest so private paths cannot be discovered
//!
//! Both support a single byte range (`Range`, `If-Range`) and conditional
//! requests (`If-None-Match`).

use super::{error::ApiError, SharedStorage};
use crate::storage::{FileMetadata, StorageError, DEFAULT_CONTENT_TYPE};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{
        header::{
            ACCEPT_RANGES, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG,
            IF_NONE_MATCH, IF_RANGE, LAST_MODIFIED, RANGE, X_CONTENT_TYPE_OPTIONS,
        },
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};
use std::time::SystemTime;

/// `Cache-Control` for public objects
pub const PUBLIC_CACHE_CONTROL: &str = "public, max-age=86400";

/// `Cache-Control` for objects behind the internal route
pub const PRIVATE_CACHE_CONTROL: &str = "private, no-cache";

/// `GET /api/files/{*path}`
pub async fn serve_internal(
    State(storage): State<SharedStorage>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let metadata = storage.get_metadata(&path).await?;
    let data = storage.download(&path).await?;

    serve_object(&metadata, data, &headers, PRIVATE_CACHE_CONTROL)
}

/// `GET /uploads/{*path}`
pub async fn serve_public(
    State(storage): State<SharedStorage>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let metadata = storage.get_metadata(&path).await?;
    if !metadata.is_public {
        tracing::debug!(path = %metadata.path, "refusing public access to private object");
        return Err(StorageError::NotFound(metadata.path).into());
    }
    let data = storage.download(&path).await?;

    serve_object(&metadata, data, &headers, PUBLIC_CACHE_CONTROL)
}

/// Strong validator derived from size and modification time
fn entity_tag(metadata: &FileMetadata) -> String {
    format!(
        r#""{:x}-{:x}""#,
        metadata.size,
        metadata.last_modified.timestamp_millis()
    )
}

/// Stored content type, or a guess from the path when only the generic
/// binary type was recorded
fn content_type_for(metadata: &FileMetadata) -> String {
    if !metadata.content_type.is_empty() && metadata.content_type != DEFAULT_CONTENT_TYPE {
        metadata.content_type.clone()
    } else {
        mime_guess::from_path(&metadata.path)
            .first_or_octet_stream()
            .to_string()
    }
}

fn etag_matches(header: &HeaderValue, etag: &str) -> bool {
    header.to_str().is_ok_and(|value| {
        value
            .split(',')
            .map(str::trim)
            .any(|candidate| candidate == "*" || candidate.trim_start_matches("W/") == etag)
    })
}

fn serve_object(
    metadata: &FileMetadata,
    data: Vec<u8>,
    headers: &HeaderMap,
    cache_control: &'static str,
) -> Result<Response, ApiError> {
    let etag = entity_tag(metadata);
    let content_type = content_type_for(metadata);
    let last_modified = httpdate::fmt_http_date(SystemTime::from(metadata.last_modified));
    let file = FileHeaders {
        etag: &etag,
        content_type: &content_type,
        last_modified: &last_modified,
        cache_control,
    };

    if let Some(if_none_match) = headers.get(IF_NONE_MATCH) {
        if etag_matches(if_none_match, &etag) {
            return Ok(file.not_modified());
        }
    }

    let Some(range_header) = headers.get(RANGE) else {
        return Ok(file.build(data, None));
    };

    // A stale If-Range validator downgrades the request to a full response
    if let Some(if_range) = headers.get(IF_RANGE) {
        if if_range.to_str().map_or(true, |v| v != etag) {
            return Ok(file.build(data, None));
        }
    }

    let size = data.len() as u64;
    let (start, end) = parse_range(range_header, size)?;

    // Both bounds are below `size`, which came from a Vec length
    #[allow(clippy::cast_possible_truncation)]
    let slice = data[start as usize..=end as usize].to_vec();
    let content_range = format!("bytes {start}-{end}/{size}");

    Ok(file.build(slice, Some(&content_range)))
}

/// Parses a single `bytes=` range against an object of `size` bytes
///
/// Returns inclusive `(start, end)` bounds. Supports `a-b`, open-ended
/// `a-` and suffix `-n` forms; an end past the object is clamped.
///
/// # Errors
///
/// - `ApiError::InvalidRange` if the header is malformed
/// - `ApiError::RangeNotSatisfiable` if no byte of the object is selected
pub fn parse_range(header: &HeaderValue, size: u64) -> Result<(u64, u64), ApiError> {
    let range_str = header.to_str().map_err(|_| ApiError::InvalidRange)?;
    let ranges = range_str
        .trim()
        .strip_prefix("bytes=")
        .ok_or(ApiError::InvalidRange)?;

    if ranges.contains(',') {
        return Err(ApiError::InvalidRange);
    }

    let (start_str, end_str) = ranges.split_once('-').ok_or(ApiError::InvalidRange)?;
    let (start_str, end_str) = (start_str.trim(), end_str.trim());

    if size == 0 {
        return Err(ApiError::RangeNotSatisfiable(size));
    }
    let last = size - 1;

    let (start, end) = if start_str.is_empty() {
        let suffix_len: u64 = end_str.parse().map_err(|_| ApiError::InvalidRange)?;
        if suffix_len == 0 {
            return Err(ApiError::RangeNotSatisfiable(size));
        }
        (size.saturating_sub(suffix_len), last)
    } else {
        let start: u64 = start_str.parse().map_err(|_| ApiError::InvalidRange)?;
        let end = if end_str.is_empty() {
            last
        } else {
            end_str
                .parse::<u64>()
                .map_err(|_| ApiError::InvalidRange)?
                .min(last)
        };
        (start, end)
    };

    if start > end || start >= size {
        return Err(ApiError::RangeNotSatisfiable(size));
    }

    Ok((start, end))
}

struct FileHeaders<'a> {
    etag: &'a str,
    content_type: &'a str,
    last_modified: &'a str,
    cache_control: &'static str,
}

impl FileHeaders<'_> {
    fn build(&self, data: Vec<u8>, content_range: Option<&str>) -> Response {
        let status = if content_range.is_some() {
            StatusCode::PARTIAL_CONTENT
        } else {
            StatusCode::OK
        };

        let mut response = Response::builder()
            .status(status)
            .header(CONTENT_TYPE, self.content_type)
            .header(CONTENT_LENGTH, data.len())
            .header(ETAG, self.etag)
            .header(LAST_MODIFIED, self.last_modified)
            .header(CACHE_CONTROL, self.cache_control)
            .header(ACCEPT_RANGES, "bytes")
            .header(X_CONTENT_TYPE_OPTIONS, "nosniff");

        if let Some(content_range) = content_range {
            response = response.header(CONTENT_RANGE, content_range);
        }

        response
            .body(Body::from(data))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }

    fn not_modified(&self) -> Response {
        Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .header(ETAG, self.etag)
            .header(LAST_MODIFIED, self.last_modified)
            .header(CACHE_CONTROL, self.cache_control)
            .body(Body::empty())
            .unwrap_or_else(|_| StatusCode::NOT_MODIFIED.into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FilesystemStorage, StorageProvider, UploadOptions, UrlResolver};
    use axum::body::to_bytes;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn storage_with(
        path: &str,
        data: Vec<u8>,
        options: UploadOptions,
    ) -> (TempDir, SharedStorage) {
        let temp = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(temp.path(), UrlResolver::default()).unwrap();
        storage.upload(path, data, options).await.unwrap();
        (temp, Arc::new(storage))
    }

    async fn fetch(storage: &SharedStorage, path: &str, headers: HeaderMap) -> Result<Response, ApiError> {
        serve_internal(State(storage.clone()), Path(path.to_string()), headers).await
    }

    fn range(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(RANGE, HeaderValue::from_static(value));
        headers
    }

    fn thousand_bytes() -> Vec<u8> {
        (0_u8..=255).cycle().take(1000).collect()
    }

    #[test]
    fn test_parse_range_forms() {
        let h = HeaderValue::from_static;
        assert_eq!(parse_range(&h("bytes=100-199"), 1000).unwrap(), (100, 199));
        assert_eq!(parse_range(&h("bytes=-100"), 1000).unwrap(), (900, 999));
        assert_eq!(parse_range(&h("bytes=800-"), 1000).unwrap(), (800, 999));
        assert_eq!(parse_range(&h("bytes=-500"), 100).unwrap(), (0, 99));
        assert_eq!(parse_range(&h("bytes=0-5000"), 100).unwrap(), (0, 99));
        assert_eq!(parse_range(&h("bytes=50-50"), 100).unwrap(), (50, 50));
    }

    #[test]
    fn test_parse_range_rejects_malformed() {
        let h = HeaderValue::from_static;
        for value in ["0-99", "bytes=50", "bytes=abc-def", "bytes=0-1,5-6", "items=0-1"] {
            assert!(
                matches!(parse_range(&h(value), 100), Err(ApiError::InvalidRange)),
                "{value} should be invalid"
            );
        }
    }

    #[test]
    fn test_parse_range_unsatisfiable() {
        let h = HeaderValue::from_static;
        assert!(matches!(
            parse_range(&h("bytes=50-20"), 100),
            Err(ApiError::RangeNotSatisfiable(100))
        ));
        assert!(matches!(
            parse_range(&h("bytes=100-"), 100),
            Err(ApiError::RangeNotSatisfiable(100))
        ));
        assert!(matches!(
            parse_range(&h("bytes=-0"), 100),
            Err(ApiError::RangeNotSatisfiable(100))
        ));
        assert!(matches!(
            parse_range(&h("bytes=0-"), 0),
            Err(ApiError::RangeNotSatisfiable(0))
        ));
    }

    #[tokio::test]
    async fn test_serve_uses_stored_content_type() {
        let options = UploadOptions::new().with_content_type("application/pdf");
        let (_temp, storage) = storage_with("submissions/s1/talk", b"%PDF-1.7".to_vec(), options).await;

        let response = fetch(&storage, "submissions/s1/talk", HeaderMap::new()).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "application/pdf");
        assert_eq!(response.headers().get(CACHE_CONTROL).unwrap(), PRIVATE_CACHE_CONTROL);
        assert_eq!(response.headers().get(X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
        assert!(response.headers().contains_key(LAST_MODIFIED));
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"%PDF-1.7");
    }

    #[tokio::test]
    async fn test_serve_guesses_type_for_generic_binary() {
        let (_temp, storage) =
            storage_with("temp/u1/image.png", b"fake png".to_vec(), UploadOptions::new()).await;

        let response = fetch(&storage, "temp/u1/image.png", HeaderMap::new()).await.unwrap();
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "image/png");

        let (_temp, storage) =
            storage_with("temp/u1/blob.unknownext", b"data".to_vec(), UploadOptions::new()).await;
        let response = fetch(&storage, "temp/u1/blob.unknownext", HeaderMap::new()).await.unwrap();
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), DEFAULT_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn test_range_request_partial_content() {
        let (_temp, storage) = storage_with("temp/a/test.bin", thousand_bytes(), UploadOptions::new()).await;

        let response = fetch(&storage, "temp/a/test.bin", range("bytes=100-199")).await.unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers().get(CONTENT_RANGE).unwrap(), "bytes 100-199/1000");
        assert_eq!(response.headers().get(CONTENT_LENGTH).unwrap(), "100");
        assert_eq!(response.headers().get(ACCEPT_RANGES).unwrap(), "bytes");
        assert!(response.headers().contains_key(ETAG));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], &thousand_bytes()[100..200]);
    }

    #[tokio::test]
    async fn test_range_request_suffix() {
        let (_temp, storage) = storage_with("temp/a/test.bin", thousand_bytes(), UploadOptions::new()).await;

        let response = fetch(&storage, "temp/a/test.bin", range("bytes=-100")).await.unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers().get(CONTENT_RANGE).unwrap(), "bytes 900-999/1000");
    }

    #[tokio::test]
    async fn test_range_request_unsatisfiable() {
        let (_temp, storage) = storage_with("temp/a/test.bin", vec![42; 100], UploadOptions::new()).await;

        let err = fetch(&storage, "temp/a/test.bin", range("bytes=500-600")).await.unwrap_err();
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers().get(CONTENT_RANGE).unwrap(), "bytes */100");
    }

    #[tokio::test]
    async fn test_zero_length_object() {
        let (_temp, storage) = storage_with("temp/a/empty", Vec::new(), UploadOptions::new()).await;

        let response = fetch(&storage, "temp/a/empty", HeaderMap::new()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(CONTENT_LENGTH).unwrap(), "0");

        let err = fetch(&storage, "temp/a/empty", range("bytes=0-")).await.unwrap_err();
        assert!(matches!(err, ApiError::RangeNotSatisfiable(0)));
    }

    #[tokio::test]
    async fn test_if_none_match_returns_not_modified() {
        let (_temp, storage) = storage_with("temp/a/test.bin", vec![1; 10], UploadOptions::new()).await;

        let first = fetch(&storage, "temp/a/test.bin", HeaderMap::new()).await.unwrap();
        let etag = first.headers().get(ETAG).unwrap().clone();

        let mut headers = HeaderMap::new();
        headers.insert(IF_NONE_MATCH, etag);
        let second = fetch(&storage, "temp/a/test.bin", headers).await.unwrap();

        assert_eq!(second.status(), StatusCode::NOT_MODIFIED);
        let body = to_bytes(second.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_stale_if_range_serves_full_object() {
        let (_temp, storage) = storage_with("temp/a/test.bin", thousand_bytes(), UploadOptions::new()).await;

        let mut headers = range("bytes=0-9");
        headers.insert(IF_RANGE, HeaderValue::from_static(r#""stale""#));
        let response = fetch(&storage, "temp/a/test.bin", headers).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(CONTENT_LENGTH).unwrap(), "1000");
    }

    #[tokio::test]
    async fn test_public_route_hides_private_objects() {
        let (_temp, storage) = storage_with(
            "submissions/s1/talk.pdf",
            b"%PDF".to_vec(),
            UploadOptions::new().with_content_type("application/pdf"),
        )
        .await;
        storage
            .upload(
                "avatars/u1",
                vec![0x89, b'P', b'N', b'G'],
                UploadOptions::new().with_content_type("image/png").public(),
            )
            .await
            .unwrap();

        let err = serve_public(
            State(storage.clone()),
            Path("submissions/s1/talk.pdf".to_string()),
            HeaderMap::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let response = serve_public(State(storage.clone()), Path("avatars/u1".to_string()), HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(CACHE_CONTROL).unwrap(), PUBLIC_CACHE_CONTROL);
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let (_temp, storage) = storage_with("temp/a/x", vec![1], UploadOptions::new()).await;

        let err = fetch(&storage, "temp/a/missing", HeaderMap::new()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
