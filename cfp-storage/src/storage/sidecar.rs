//! On-disk metadata sidecar schema for the filesystem backend
//!
//! Each object `root/<path>` has its metadata in `root/<path>.meta.json`:
//!
//! ```json
//! {
//!   "version": 1,
//!   "path": "avatars/user-123",
//!   "size": 48213,
//!   "contentType": "image/png",
//!   "lastModified": "2025-03-01T12:00:00Z",
//!   "isPublic": true,
//!   "metadata": {}
//! }
//! ```
//!
//! Records without `version` predate versioning and are read as version 1.
//! Records with a version newer than [`SIDECAR_VERSION`] are refused rather
//! than misread.

use super::types::{FileMetadata, StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Suffix appended to an object's file name to locate its sidecar
pub const SIDECAR_SUFFIX: &str = ".meta.json";

/// Suffix of in-flight staging files
pub const STAGING_SUFFIX: &str = ".upload-tmp";

/// Current sidecar schema version
pub const SIDECAR_VERSION: u32 = 1;

const fn legacy_version() -> u32 {
    1
}

/// Serialized sidecar record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sidecar {
    /// Schema version
    #[serde(default = "legacy_version")]
    pub version: u32,

    /// The object's metadata
    #[serde(flatten)]
    pub metadata: FileMetadata,
}

impl Sidecar {
    /// Wraps metadata in a record at the current schema version
    #[must_use]
    pub const fn new(metadata: FileMetadata) -> Self {
        Self {
            version: SIDECAR_VERSION,
            metadata,
        }
    }

    /// Serializes the record
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unknown` if serialization fails
    pub fn to_json(&self) -> StorageResult<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| {
            StorageError::wrap(
                format!("Failed to serialize metadata for {}", self.metadata.path),
                e,
            )
        })
    }

    /// Parses a record read from disk for the object at `path`
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unknown` if the record is malformed or was
    /// written by a newer schema version
    pub fn from_json(bytes: &[u8], path: &str) -> StorageResult<Self> {
        let sidecar: Self = serde_json::from_slice(bytes)
            .map_err(|e| StorageError::wrap(format!("Corrupt metadata for {path}"), e))?;

        if sidecar.version > SIDECAR_VERSION {
            return Err(StorageError::unknown(format!(
                "Metadata for {path} uses schema version {} (supported: {SIDECAR_VERSION})",
                sidecar.version
            )));
        }

        Ok(sidecar)
    }
}

/// Whether a file name belongs to storage internals rather than an object
#[must_use]
pub fn is_reserved_name(name: &str) -> bool {
    name.ends_with(SIDECAR_SUFFIX) || name.ends_with(STAGING_SUFFIX)
}

/// Location of the sidecar for the object file at `object`
#[must_use]
pub fn sidecar_path(object: &Path) -> PathBuf {
    let mut name = object
        .file_name()
        .map_or_else(OsString::new, ToOwned::to_owned);
    name.push(SIDECAR_SUFFIX);
    object.with_file_name(name)
}

/// Unique hidden staging location next to `target`
#[must_use]
pub fn staging_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    if let Some(file_name) = target.file_name() {
        name.push(file_name);
    }
    name.push(format!(".{}{STAGING_SUFFIX}", Uuid::new_v4().simple()));
    target.with_file_name(name)
}
