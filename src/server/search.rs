//! 검색/관련 콘텐츠 핸들러

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use super::error::{ApiError, ApiResult};
use super::{non_blank, parse_limit, parse_object_type, AppState};
use crate::content::ObjectType;
use crate::knowledge::{SearchMethod, SearchRequest, SearchResponse, DEFAULT_LIMIT};
use crate::tools::{RelatedContent, DEFAULT_RELATED_LIMIT};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    q: Option<String>,
    #[serde(rename = "type")]
    object_type: Option<String>,
    method: Option<String>,
    limit: Option<String>,
}

/// `GET /api/search?q=&type=&method=&limit=`
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<SearchResponse>> {
    let query = non_blank(params.q.as_deref())
        .ok_or_else(|| ApiError::bad_request("Query parameter is required"))?;
    let object_type = parse_object_type(params.object_type.as_deref())?;
    let limit = parse_limit(params.limit.as_deref(), DEFAULT_LIMIT)?;
    let method = match non_blank(params.method.as_deref()) {
        Some(m) => m
            .parse::<SearchMethod>()
            .map_err(|e| ApiError::bad_request(e.to_string()))?,
        None => SearchMethod::default(),
    };

    let request = SearchRequest::new(query)
        .with_type(object_type)
        .with_limit(limit)
        .with_method(method);

    Ok(Json(state.tools.retriever().search(&request).await))
}

#[derive(Debug, Deserialize)]
pub struct RelatedParams {
    id: Option<String>,
    #[serde(rename = "type")]
    object_type: Option<String>,
}

/// `GET /api/related?id=&type=`
pub async fn related(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RelatedParams>,
) -> ApiResult<Json<RelatedContent>> {
    let (Some(id), Some(object_type)) = (
        non_blank(params.id.as_deref()),
        non_blank(params.object_type.as_deref()),
    ) else {
        return Err(ApiError::bad_request("Missing required parameters: id and type"));
    };

    let object_type: ObjectType = object_type
        .parse()
        .map_err(|e: anyhow::Error| ApiError::bad_request(e.to_string()))?;
    if object_type == ObjectType::Photo {
        return Err(ApiError::bad_request("type must be publication or project"));
    }

    Ok(Json(
        state
            .tools
            .get_related_content(id, object_type, DEFAULT_RELATED_LIMIT)
            .await,
    ))
}
