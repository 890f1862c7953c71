/**
 * Upload Routes
 * Image upload for block and header images; the returned URL is stored
 * on blocks as an opaque string
 */
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024; // 5MB
/// Body limit for the upload route: one file plus multipart framing, so an
/// oversized file still reaches the size check and gets its own message.
pub const MAX_UPLOAD_BODY: usize = MAX_FILE_SIZE + 1024 * 1024;
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub url: String,
    pub filename: String,
    pub size: usize,
    pub mime_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    pub filename: String,
    pub url: String,
    pub size: u64,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageListResponse {
    pub images: Vec<ImageInfo>,
    pub total: usize,
}

fn validate_image_magic_bytes(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        // GIF: 47 49 46 38
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        // WebP: 52 49 46 46 ... 57 45 42 50
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        _ => None,
    }
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    }
}

fn is_safe_filename(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.contains("..")
        && !filename.contains('/')
        && !filename.contains('\\')
        && !filename.contains('\0')
}

fn has_allowed_extension(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// POST /api/upload - Store an image and return its public URL
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let upload_dir = &state.config.upload_dir;
    tokio::fs::create_dir_all(upload_dir).await.map_err(|e| {
        tracing::error!(error = %e, dir = %upload_dir.display(), "failed to create upload directory");
        ApiError::Unavailable("Failed to initialize upload directory".to_string())
    })?;

    let field = multipart
        .next_field()
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "multipart error");
            ApiError::Validation("Invalid multipart data".to_string())
        })?
        .ok_or_else(|| ApiError::Validation("No file provided".to_string()))?;

    let original_name = field.file_name().unwrap_or("unknown").to_string();
    if !has_allowed_extension(&original_name) {
        return Err(ApiError::Validation(
            "Unsupported file type. Allowed: JPEG, PNG, WebP, GIF.".to_string(),
        ));
    }

    let bytes = field.bytes().await.map_err(|e| {
        tracing::warn!(error = %e, "failed to read upload bytes");
        ApiError::Validation("Failed to read file data".to_string())
    })?;

    if bytes.is_empty() {
        return Err(ApiError::Validation("Empty file".to_string()));
    }
    if bytes.len() > MAX_FILE_SIZE {
        return Err(ApiError::Validation(
            "File too large. Maximum size is 5MB.".to_string(),
        ));
    }

    let mime_type = validate_image_magic_bytes(&bytes).ok_or_else(|| {
        ApiError::Validation("File content does not match an allowed image type.".to_string())
    })?;

    let filename = format!("{}.{}", Uuid::new_v4(), extension_for_mime(mime_type));
    let file_path = upload_dir.join(&filename);

    tokio::fs::write(&file_path, &bytes).await.map_err(|e| {
        tracing::error!(error = %e, path = %file_path.display(), "failed to write upload");
        ApiError::Persistence("Failed to save file".to_string())
    })?;

    let url = format!("{}/{}", state.config.upload_url_prefix, filename);
    tracing::info!(filename = %filename, size = bytes.len(), "image uploaded");

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            url,
            filename,
            size: bytes.len(),
            mime_type: mime_type.to_string(),
        }),
    ))
}

/// DELETE /api/upload/:filename
pub async fn delete_image(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !is_safe_filename(&filename) {
        return Err(ApiError::Validation("Invalid filename".to_string()));
    }

    let file_path = state.config.upload_dir.join(&filename);
    if !tokio::fs::try_exists(&file_path).await.unwrap_or(false) {
        return Err(ApiError::NotFound(format!("File '{}'", filename)));
    }

    tokio::fs::remove_file(&file_path).await.map_err(|e| {
        tracing::error!(error = %e, filename = %filename, "failed to delete upload");
        ApiError::Persistence("Failed to delete file".to_string())
    })?;

    tracing::info!(filename = %filename, "image deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/upload - Uploaded images, newest first
pub async fn list_images(State(state): State<AppState>) -> Result<Json<ImageListResponse>, ApiError> {
    let upload_dir = &state.config.upload_dir;
    if !tokio::fs::try_exists(upload_dir).await.unwrap_or(false) {
        return Ok(Json(ImageListResponse {
            images: vec![],
            total: 0,
        }));
    }

    let mut entries = tokio::fs::read_dir(upload_dir).await.map_err(|e| {
        tracing::error!(error = %e, "failed to read upload directory");
        ApiError::Persistence("Failed to list images".to_string())
    })?;

    let mut images = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let Some(filename) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !has_allowed_extension(&filename) {
            continue;
        }

        let created_at = metadata
            .created()
            .or_else(|_| metadata.modified())
            .map(|t| {
                let dt: chrono::DateTime<chrono::Utc> = t.into();
                dt.to_rfc3339()
            })
            .unwrap_or_default();

        images.push(ImageInfo {
            url: format!("{}/{}", state.config.upload_url_prefix, filename),
            filename,
            size: metadata.len(),
            created_at,
        });
    }

    images.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let total = images.len();
    Ok(Json(ImageListResponse { images, total }))
}
