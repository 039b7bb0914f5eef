use axum::extract::{Multipart, State};
use axum::Json;
use chrono::{DateTime, Utc};
use common_http_errors::ApiError;
use serde::Serialize;

use crate::app::AppState;
use crate::gate::AuthContext;

#[derive(Serialize)]
pub struct UploadResponse {
    pub url: String,
}

pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::validation(format!("Invalid upload: {err}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let original_name = field
            .file_name()
            .unwrap_or("upload.bin")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| ApiError::validation(format!("Invalid upload: {err}")))?;

        let stored = state
            .media
            .store(&original_name, &bytes)
            .await
            .map_err(|err| ApiError::dependency("Failed to store image", err))?;

        return Ok(Json(UploadResponse { url: stored.url }));
    }

    Err(ApiError::validation("Missing file field"))
}

#[derive(Serialize)]
pub struct ImageListEntry {
    pub name: String,
    pub url: String,
    #[serde(rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct ImageListResponse {
    pub total: usize,
    pub images: Vec<ImageListEntry>,
}

pub async fn list_images(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ImageListResponse>, ApiError> {
    let entries = state
        .media
        .list()
        .await
        .map_err(|err| ApiError::dependency("Failed to list images", err))?;

    let images: Vec<ImageListEntry> = entries
        .into_iter()
        .map(|entry| ImageListEntry {
            name: entry.name,
            url: entry.url,
            created_at: entry.created_at,
        })
        .collect();

    Ok(Json(ImageListResponse {
        total: images.len(),
        images,
    }))
}
