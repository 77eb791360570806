//! 콘텐츠 상세/요약 핸들러

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::content::ObjectType;
use crate::tools::{ContentDetails, ContentSummary};

fn parse_type(raw: &str) -> ApiResult<ObjectType> {
    raw.parse()
        .map_err(|e: anyhow::Error| ApiError::bad_request(e.to_string()))
}

fn not_found(object_type: ObjectType, slug: &str) -> ApiError {
    ApiError::NotFound(format!("Content not found: {} {}", object_type, slug))
}

/// `GET /api/content/{type}/{slug}`
pub async fn details(
    State(state): State<Arc<AppState>>,
    Path((object_type, slug)): Path<(String, String)>,
) -> ApiResult<Json<ContentDetails>> {
    let object_type = parse_type(&object_type)?;
    state
        .tools
        .get_content_details(&slug, object_type)
        .map(Json)
        .ok_or_else(|| not_found(object_type, &slug))
}

/// `GET /api/content/{type}/{slug}/summary`
pub async fn summary(
    State(state): State<Arc<AppState>>,
    Path((object_type, slug)): Path<(String, String)>,
) -> ApiResult<Json<ContentSummary>> {
    let object_type = parse_type(&object_type)?;
    state
        .tools
        .summarize_content(&slug, object_type)
        .map(Json)
        .ok_or_else(|| not_found(object_type, &slug))
}
