//! Multipart upload form extractor

use super::error::ApiError;
use crate::storage::ResourceKind;
use axum::{
    extract::{multipart::MultipartError, FromRequest, Multipart, Request},
    http::StatusCode,
};

/// The file part of an upload form
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-supplied filename (may be empty)
    pub filename: String,

    /// Declared content type, if the part carried one
    pub content_type: Option<String>,

    /// File contents
    pub data: Vec<u8>,
}

/// Parsed `POST /api/upload` body
///
/// Fields:
/// - `file`: the file part (required)
/// - `type`: a [`ResourceKind`] wire name (required)
/// - `targetId`: the owning entity id (required except for `temp`)
///
/// Unknown fields are ignored.
#[derive(Debug, Clone)]
pub struct UploadForm {
    /// Which resource the file is for
    pub kind: ResourceKind,

    /// Owning entity id
    pub target_id: Option<String>,

    /// The uploaded file
    pub file: UploadedFile,
}

fn multipart_error(e: &MultipartError) -> ApiError {
    ApiError::Multipart {
        status: e.status(),
        message: e.body_text(),
    }
}

impl<S> FromRequest<S> for UploadForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    #[allow(clippy::manual_async_fn)]
    fn from_request(
        req: Request,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let mut multipart = Multipart::from_request(req, state).await.map_err(|e| {
                ApiError::Multipart {
                    status: StatusCode::BAD_REQUEST,
                    message: e.body_text(),
                }
            })?;

            let mut file = None;
            let mut kind = None;
            let mut target_id = None;

            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| multipart_error(&e))?
            {
                match field.name() {
                    Some("file") => {
                        let filename = field.file_name().unwrap_or_default().to_string();
                        let content_type = field.content_type().map(str::to_string);
                        let data = field.bytes().await.map_err(|e| multipart_error(&e))?;

                        file = Some(UploadedFile {
                            filename,
                            content_type,
                            data: data.to_vec(),
                        });
                    }
                    Some("type") => {
                        let value = field.text().await.map_err(|e| multipart_error(&e))?;
                        let parsed = value
                            .trim()
                            .parse::<ResourceKind>()
                            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                        kind = Some(parsed);
                    }
                    Some("targetId") => {
                        let value = field.text().await.map_err(|e| multipart_error(&e))?;
                        let value = value.trim();
                        if !value.is_empty() {
                            target_id = Some(value.to_string());
                        }
                    }
                    _ => {}
                }
            }

            let file = file.ok_or_else(|| ApiError::BadRequest("No file provided".to_string()))?;
            let kind =
                kind.ok_or_else(|| ApiError::BadRequest("Upload type is required".to_string()))?;

            Ok(Self {
                kind,
                target_id,
                file,
            })
        }
    }
}
