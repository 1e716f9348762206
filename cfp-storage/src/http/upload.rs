//! Upload and delete handlers

use super::{
    error::ApiError,
    extract::UploadForm,
    responses::{DeleteResponse, UploadResponse},
    SharedStorage,
};
use crate::storage::{
    validation::{filename_with_extension, sniff_content_type},
    ResourceKind,
};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

/// Filename used when the client sends none
const DEFAULT_FILENAME: &str = "file";

/// `POST /api/upload`
///
/// Builds the canonical path for the form's resource kind, applies that
/// kind's upload policy and stores the file.
pub async fn upload_file(
    State(storage): State<SharedStorage>,
    form: UploadForm,
) -> Result<Json<UploadResponse>, ApiError> {
    let UploadForm {
        kind,
        target_id,
        file,
    } = form;

    let target_id = match (kind, target_id) {
        (_, Some(id)) => id,
        (ResourceKind::Temp, None) => Uuid::new_v4().to_string(),
        (_, None) => {
            return Err(ApiError::BadRequest(format!(
                "targetId is required for {kind} uploads"
            )))
        }
    };

    let content_type = sniff_content_type(file.content_type.as_deref(), &file.data);
    let filename = if file.filename.trim().is_empty() {
        DEFAULT_FILENAME
    } else {
        file.filename.as_str()
    };
    let filename = filename_with_extension(filename, &content_type);

    let path = kind.build_path(&target_id, &filename);
    let options = kind.upload_options().with_content_type(&content_type);

    let stored = storage.upload(&path, file.data, options).await?;

    tracing::info!(
        kind = %kind,
        path = %stored.path,
        size = stored.size,
        content_type = %stored.content_type,
        "file uploaded"
    );

    Ok(Json(UploadResponse {
        success: true,
        file: stored,
    }))
}

/// Query string of `DELETE /api/upload`
#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    /// Storage path to remove
    pub path: String,
}

/// `DELETE /api/upload?path=...`
pub async fn delete_file(
    State(storage): State<SharedStorage>,
    query: Result<Query<DeleteQuery>, QueryRejection>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let Query(DeleteQuery { path }) =
        query.map_err(|_| ApiError::BadRequest("path query parameter is required".to_string()))?;

    storage.delete(&path).await?;
    tracing::info!(path = %path, "file deleted");

    Ok(Json(DeleteResponse { success: true }))
}
