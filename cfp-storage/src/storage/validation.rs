//! Upload validation and MIME helpers
//!
//! Everything here is pure: size and type checks run before any backend is
//! called, so a rejected upload behaves identically on every backend and
//! never leaves a partial write behind.
//!
//! # Examples
//!
//! ```rust
//! use cfp_storage::storage::{validation, ErrorCode, UploadOptions};
//!
//! let options = UploadOptions::new()
//!     .with_max_size(4)
//!     .with_allowed_types(["image/png"]);
//!
//! assert!(validation::validate_file(b"1234", "image/png", &options).is_ok());
//!
//! let too_big = validation::validate_file(b"12345", "image/png", &options).unwrap_err();
//! assert_eq!(too_big.code(), ErrorCode::SizeExceeded);
//!
//! assert_eq!(validation::extension_for_mime("application/pdf"), "pdf");
//! assert_eq!(validation::extension_for_mime("text/x-unknown"), "");
//! ```

use super::types::{StorageError, StorageResult, UploadOptions, DEFAULT_CONTENT_TYPE};
use mime::Mime;

/// Accepted image types
pub const IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Accepted document types
pub const DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.oasis.opendocument.presentation",
    "application/vnd.apple.keynote",
    "application/x-iwork-keynote-sffkey",
];

/// Accepted video types
pub const VIDEO_TYPES: &[&str] = &["video/mp4", "video/webm"];

/// Maps an accepted MIME type to its file extension (without the dot)
///
/// Types outside the accepted set map to an empty string.
#[must_use]
pub fn extension_for_mime(content_type: &str) -> &'static str {
    match mime_essence(content_type).as_str() {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "application/pdf" => "pdf",
        "application/vnd.ms-powerpoint" => "ppt",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => "pptx",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.oasis.opendocument.presentation" => "odp",
        "application/vnd.apple.keynote" | "application/x-iwork-keynote-sffkey" => "key",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        _ => "",
    }
}

/// Lowercase `type/subtype` of a content type, without parameters
///
/// Unparseable input is returned trimmed and lowercased.
#[must_use]
pub fn mime_essence(content_type: &str) -> String {
    content_type.trim().parse::<Mime>().map_or_else(
        |_| content_type.trim().to_ascii_lowercase(),
        |mime| mime.essence_str().to_ascii_lowercase(),
    )
}

/// Validates an upload against its options
///
/// Checks the size ceiling first, then the type allow-list. Allow-list
/// entries are compared by MIME essence, so parameters such as
/// `; charset=utf-8` do not affect the result.
///
/// # Errors
///
/// - `StorageError::InvalidFile` if `content_type` is not a MIME type
/// - `StorageError::SizeExceeded` if `data` is larger than `options.max_size`
/// - `StorageError::TypeNotAllowed` if the type is not in `options.allowed_types`
pub fn validate_file(data: &[u8], content_type: &str, options: &UploadOptions) -> StorageResult<()> {
    if content_type.trim().parse::<Mime>().is_err() {
        return Err(StorageError::InvalidFile(format!(
            "{content_type:?} is not a valid content type"
        )));
    }

    let size = data.len() as u64;
    if let Some(limit) = options.max_size {
        if size > limit {
            return Err(StorageError::SizeExceeded {
                actual: size,
                limit,
            });
        }
    }

    if let Some(allowed) = &options.allowed_types {
        let essence = mime_essence(content_type);
        if !allowed.iter().any(|t| mime_essence(t) == essence) {
            return Err(StorageError::TypeNotAllowed {
                actual: essence,
                allowed: allowed.clone(),
            });
        }
    }

    Ok(())
}

/// Detects the MIME type from file content using magic numbers
///
/// Returns `None` when the content has no recognisable signature.
#[must_use]
pub fn detect_mime(data: &[u8]) -> Option<&'static str> {
    infer::get(data).map(|kind| kind.mime_type())
}

/// Resolves the content type to record for an upload
///
/// The declared type wins unless it is missing or the generic binary type,
/// in which case the magic-number detection result (if any) is used.
#[must_use]
pub fn sniff_content_type(declared: Option<&str>, data: &[u8]) -> String {
    let declared = declared.map(str::trim).filter(|ct| !ct.is_empty());
    match declared {
        Some(ct) if mime_essence(ct) != DEFAULT_CONTENT_TYPE => ct.to_string(),
        _ => detect_mime(data)
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string(),
    }
}

/// Appends the extension mapped from `content_type` when `filename` has none
///
/// # Examples
///
/// ```rust
/// use cfp_storage::storage::validation::filename_with_extension;
///
/// assert_eq!(filename_with_extension("slides", "application/pdf"), "slides.pdf");
/// assert_eq!(filename_with_extension("slides.key", "application/pdf"), "slides.key");
/// assert_eq!(filename_with_extension("notes", "text/plain"), "notes");
/// ```
#[must_use]
pub fn filename_with_extension(filename: &str, content_type: &str) -> String {
    let has_extension = filename
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && !ext.is_empty());
    let extension = extension_for_mime(content_type);

    if has_extension || extension.is_empty() {
        filename.to_string()
    } else {
        format!("{filename}.{extension}")
    }
}
