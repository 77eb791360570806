//! 사진 핸들러 - 인증, 업로드, 갤러리, Blob 제공

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::error::{ApiError, ApiResult};
use super::{non_blank, parse_limit, AppState};
use crate::photos::{parse_tags, photo_document, GalleryQuery, Photo, UploadRequest, DEFAULT_GALLERY_LIMIT};
use crate::tools::GalleryResult;

/// multipart 필드 모음
#[derive(Debug, Default)]
struct UploadForm {
    file: Option<(String, Vec<u8>)>,
    caption: Option<String>,
    album: Option<String>,
    tags: Option<String>,
    admin_key: Option<String>,
}

async fn read_form(multipart: Result<Multipart, MultipartRejection>) -> ApiResult<UploadForm> {
    let mut multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                form.file = Some((file_name, bytes.to_vec()));
            }
            "caption" | "album" | "tags" | "adminKey" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                let slot = match name.as_str() {
                    "caption" => &mut form.caption,
                    "album" => &mut form.album,
                    "tags" => &mut form.tags,
                    _ => &mut form.admin_key,
                };
                *slot = Some(text);
            }
            other => tracing::debug!("Ignoring multipart field {}", other),
        }
    }

    Ok(form)
}

fn authorize(state: &AppState, key: Option<&str>) -> ApiResult<()> {
    if state.tools.photos().authorize(key) {
        Ok(())
    } else {
        tracing::warn!("Photo admin key rejected");
        Err(ApiError::Unauthorized("Unauthorized: Invalid admin key".to_string()))
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    success: bool,
    message: String,
}

/// `POST /api/photos/auth`
pub async fn auth(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<AuthResponse>> {
    let form = read_form(multipart).await?;
    authorize(&state, form.admin_key.as_deref())?;

    Ok(Json(AuthResponse {
        success: true,
        message: "Authentication successful".to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    success: bool,
    photo: Photo,
    message: String,
}

/// `POST /api/photos/upload` (multipart: file, caption, album, tags, adminKey)
pub async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadResponse>> {
    let form = read_form(multipart).await?;
    authorize(&state, form.admin_key.as_deref())?;

    let Some((file_name, bytes)) = form.file else {
        return Err(ApiError::bad_request("No file provided"));
    };

    let photo = state
        .tools
        .photos()
        .upload(UploadRequest {
            file_name,
            bytes,
            caption: form.caption,
            album: form.album,
            tags: form.tags,
        })
        .await?;

    // 캡션/태그가 있으면 검색 인덱스에도 추가
    if let Some(doc) = photo_document(&photo) {
        if let Err(e) = state.tools.retriever().index_document(&doc, false).await {
            tracing::warn!("Failed to index photo {}: {:#}", photo.id, e);
        }
    }

    Ok(Json(UploadResponse {
        success: true,
        photo,
        message: "Photo uploaded successfully".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct GalleryParams {
    album: Option<String>,
    tags: Option<String>,
    limit: Option<String>,
}

/// `GET /api/photos?album=&tags=&limit=`
pub async fn gallery(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GalleryParams>,
) -> ApiResult<Json<GalleryResult>> {
    let filter = GalleryQuery {
        album: non_blank(params.album.as_deref()).map(String::from),
        tags: params.tags.as_deref().map(parse_tags).unwrap_or_default(),
        limit: parse_limit(params.limit.as_deref(), DEFAULT_GALLERY_LIMIT)?,
    };

    Ok(Json(state.tools.render_gallery(filter).await?))
}

fn content_type(path: &str) -> &'static str {
    let ext = path.rsplit_once('.').map(|(_, e)| e.to_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}

/// `GET /blobs/{*path}`
pub async fn blob(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> ApiResult<Response> {
    let bytes = state
        .tools
        .photos()
        .blobs()
        .get(&path)
        .await
        .map_err(|_| ApiError::NotFound(format!("Blob not found: {}", path)))?
        .ok_or_else(|| ApiError::NotFound(format!("Blob not found: {}", path)))?;

    Ok(([(header::CONTENT_TYPE, content_type(&path))], bytes).into_response())
}
