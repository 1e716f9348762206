//! Storage path normalization and canonical path builders
//!
//! Every storage path used by the application comes from one of the builders
//! in this module, so re-uploading the same logical resource always targets
//! the same path and overwrites rather than accumulates.
//!
//! # Examples
//!
//! ```rust
//! use cfp_storage::storage::paths::{avatar_path, normalize_path, ResourceKind};
//!
//! assert_eq!(avatar_path("user-123"), "avatars/user-123");
//! assert_eq!(normalize_path("../../etc/passwd"), "etc/passwd");
//! assert_eq!(
//!     ResourceKind::SubmissionMaterial.build_path("42", "slides.pdf"),
//!     "submissions/42/slides.pdf"
//! );
//! ```

use super::types::UploadOptions;
use super::validation::{DOCUMENT_TYPES, IMAGE_TYPES, VIDEO_TYPES};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MIB: u64 = 1024 * 1024;

/// Normalizes a caller-supplied storage path
///
/// Both `/` and `\` separate segments. Empty and `.` segments are dropped,
/// `..` removes the preceding segment, and any `..` that would climb above
/// the root is discarded. The result is relative, `/`-separated, and never
/// contains a `..` segment, so joining it to a root directory cannot escape
/// that directory.
#[must_use]
pub fn normalize_path(raw: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Reduces an identifier or filename to a single safe path segment
///
/// Characters outside `[A-Za-z0-9._-]` become `_`; names that would be
/// empty or special (`.`, `..`) become `_`.
#[must_use]
pub fn sanitize_segment(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

/// Path for a user's avatar
#[must_use]
pub fn avatar_path(user_id: &str) -> String {
    format!("avatars/{}", sanitize_segment(user_id))
}

/// Path for one file attached to a submission
#[must_use]
pub fn submission_material_path(submission_id: &str, filename: &str) -> String {
    format!(
        "submissions/{}/{}",
        sanitize_segment(submission_id),
        sanitize_segment(filename)
    )
}

/// Path for an organization's logo
#[must_use]
pub fn organization_logo_path(organization_id: &str) -> String {
    format!("organizations/{}/logo", sanitize_segment(organization_id))
}

/// Path for an event's banner image
#[must_use]
pub fn event_banner_path(event_id: &str) -> String {
    format!("events/{}/banner", sanitize_segment(event_id))
}

/// Path for a temporary upload
#[must_use]
pub fn temp_path(upload_id: &str, filename: &str) -> String {
    format!(
        "temp/{}/{}",
        sanitize_segment(upload_id),
        sanitize_segment(filename)
    )
}

/// The kinds of resources the application uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Speaker avatar, keyed by user id
    Avatar,
    /// Submission material, keyed by submission id and filename
    #[serde(rename = "submission")]
    SubmissionMaterial,
    /// Organization logo, keyed by organization id
    #[serde(rename = "logo")]
    OrganizationLogo,
    /// Event banner, keyed by event id
    #[serde(rename = "banner")]
    EventBanner,
    /// Temporary upload, keyed by an upload id and filename
    Temp,
}

impl ResourceKind {
    /// All resource kinds
    pub const ALL: [Self; 5] = [
        Self::Avatar,
        Self::SubmissionMaterial,
        Self::OrganizationLogo,
        Self::EventBanner,
        Self::Temp,
    ];

    /// Wire name used in the upload form's `type` field
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Avatar => "avatar",
            Self::SubmissionMaterial => "submission",
            Self::OrganizationLogo => "logo",
            Self::EventBanner => "banner",
            Self::Temp => "temp",
        }
    }

    /// Builds the canonical storage path for this kind
    ///
    /// `filename` is ignored by kinds that hold a single object per target.
    #[must_use]
    pub fn build_path(self, target_id: &str, filename: &str) -> String {
        match self {
            Self::Avatar => avatar_path(target_id),
            Self::SubmissionMaterial => submission_material_path(target_id, filename),
            Self::OrganizationLogo => organization_logo_path(target_id),
            Self::EventBanner => event_banner_path(target_id),
            Self::Temp => temp_path(target_id, filename),
        }
    }

    /// Upload policy applied to this kind
    #[must_use]
    pub fn upload_options(self) -> UploadOptions {
        match self {
            Self::Avatar | Self::OrganizationLogo => UploadOptions::new()
                .with_max_size(5 * MIB)
                .with_allowed_types(IMAGE_TYPES.iter().copied())
                .public(),
            Self::EventBanner => UploadOptions::new()
                .with_max_size(10 * MIB)
                .with_allowed_types(IMAGE_TYPES.iter().copied())
                .public(),
            Self::SubmissionMaterial => UploadOptions::new()
                .with_max_size(100 * MIB)
                .with_allowed_types(
                    IMAGE_TYPES
                        .iter()
                        .chain(DOCUMENT_TYPES)
                        .chain(VIDEO_TYPES)
                        .copied(),
                ),
            Self::Temp => UploadOptions::new()
                .with_max_size(100 * MIB)
                .with_allowed_types(IMAGE_TYPES.iter().chain(DOCUMENT_TYPES).copied()),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an unrecognised resource kind
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown upload type: {0} (expected avatar, submission, logo, banner or temp)")]
pub struct ParseResourceKindError(pub String);

impl FromStr for ResourceKind {
    type Err = ParseResourceKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseResourceKindError(s.to_string()))
    }
}
