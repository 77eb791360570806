//! 채팅 핸들러 - 평문 스트리밍

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use futures::StreamExt;
use serde::Deserialize;

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::chat::{content_summary, fallback_reply, system_prompt, ChatMessage};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    messages: Vec<ChatMessage>,
}

/// `POST /api/chat` `{messages}`
///
/// 업스트림 호출이 실패해도 200 평문 응답으로 대신합니다.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let photo_count = state.tools.photos().count().await.unwrap_or_else(|e| {
        tracing::warn!("Photo count unavailable: {:#}", e);
        0
    });
    let summary = content_summary(state.tools.retriever().catalog(), photo_count, Utc::now());

    match state
        .chat
        .stream(&system_prompt(&summary), &request.messages)
        .await
    {
        Ok(stream) => {
            let body = Body::from_stream(stream.map(Ok::<_, Infallible>));
            Ok(([(header::CONTENT_TYPE, TEXT_PLAIN)], body).into_response())
        }
        Err(e) => {
            tracing::warn!("Chat upstream unavailable: {:#}", e);
            Ok(([(header::CONTENT_TYPE, TEXT_PLAIN)], fallback_reply(&summary)).into_response())
        }
    }
}
