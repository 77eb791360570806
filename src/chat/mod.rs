//! Chat 모듈 - OpenAI 채팅 스트리밍
//!
//! 시스템 프롬프트는 고정 안내문 + 현재 콘텐츠 요약으로 구성됩니다.
//! 업스트림 호출이 스트리밍 전에 실패하면 호출 측이 `fallback_reply`로
//! 평문 응답을 대신 보냅니다.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::Config;
use crate::content::ContentCatalog;

/// OpenAI Chat Completions 엔드포인트
/// ref: https://platform.openai.com/docs/api-reference/chat/create
const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

const MAX_TOKENS: u32 = 2000;

/// 연결 타임아웃
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// 스트림 조각 사이 최대 대기 (전체 응답 시간은 제한하지 않음)
const STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(30);
const TEMPERATURE: f32 = 0.7;

/// 고정 안내문
pub const SYSTEM_PROMPT: &str = "You are an intelligent assistant for a personal academic website. \
Your role is to help visitors explore and understand the content, including research publications, projects, and photography.

The site offers these capabilities:

1. **search_content**: Search through publications, projects, and photos using semantic and keyword search
2. **get_related_content**: Find publications and projects related to a given item
3. **summarize_content**: Summarize a publication or project
4. **get_graph**: Explore knowledge graphs showing relationships between topics, technologies, venues, and content
5. **render_gallery**: Display photo galleries with filtering options

## Guidelines:
- Be conversational, helpful, and knowledgeable about academic and technical topics
- When discussing publications, always include relevant metadata (year, venue, etc.)
- For projects, mention technologies used and current status
- Explain knowledge graph connections when relevant
- Offer to show related content or dive deeper into topics
- Be concise but thorough in your responses";

// ============================================================================
// Types
// ============================================================================

/// 대화 메시지
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

/// SSE 한 줄 해석 결과
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    /// 텍스트 조각
    Delta(String),
    /// `[DONE]`
    Done,
    /// 주석, 빈 줄, 내용 없는 이벤트
    Skip,
}

/// SSE 한 줄 파싱
///
/// `data: {json}` 에서 `choices[0].delta.content`만 꺼냅니다.
pub fn parse_sse_line(line: &str) -> SseEvent {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return SseEvent::Skip;
    };
    let data = data.trim_start();

    if data == "[DONE]" {
        return SseEvent::Done;
    }

    let event: serde_json::Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(_) => return SseEvent::Skip,
    };

    match event["choices"][0]["delta"]["content"].as_str() {
        Some(content) if !content.is_empty() => SseEvent::Delta(content.to_string()),
        _ => SseEvent::Skip,
    }
}

// ============================================================================
// Content Summary
// ============================================================================

/// 사이트 콘텐츠 요약 (시스템 프롬프트용)
pub fn content_summary(catalog: &ContentCatalog, photo_count: usize, now: DateTime<Utc>) -> String {
    let site = &catalog.site;

    let featured_publications = catalog.publications.iter().filter(|p| p.featured).count();
    let featured_projects = catalog.projects.iter().filter(|p| p.featured).count();
    let active_projects = catalog.projects.iter().filter(|p| p.status.is_active()).count();

    // 연도가 같으면 먼저 나온 논문
    let recent = catalog
        .publications
        .iter()
        .fold(None, |best: Option<&crate::content::Publication>, p| match best {
            Some(b) if b.year >= p.year => Some(b),
            _ => Some(p),
        });
    let recent = recent
        .map(|p| format!(", most recent: \"{}\" ({})", p.title, p.year))
        .unwrap_or_default();

    let role = if site.current_role.is_empty() {
        &site.title
    } else {
        &site.current_role
    };

    format!(
        "Site Owner: {name}
Current Role: {role} at {university}
Location: {location}

Content Overview:
- {pubs} publications ({featured_pubs} featured){recent}
- {projects} projects ({featured_projects} featured, {active} active)
- {photos} photos across various albums
- Research areas: {areas}

Key Skills: {skills}
Bio: {bio}

Last Updated: {updated}",
        name = site.name,
        university = site.university,
        location = site.location,
        pubs = catalog.publications.len(),
        featured_pubs = featured_publications,
        projects = catalog.projects.len(),
        active = active_projects,
        photos = photo_count,
        areas = site.research_areas.join(", "),
        skills = site.skills.join(", "),
        bio = site.bio,
        updated = now.format("%Y-%m-%d"),
    )
}

/// 전체 시스템 프롬프트
pub fn system_prompt(summary: &str) -> String {
    format!("{}\n\n## Site Content:\n{}", SYSTEM_PROMPT, summary)
}

/// 업스트림 실패 시 평문 응답
pub fn fallback_reply(summary: &str) -> String {
    format!(
        "The assistant is temporarily unavailable. Here is an overview of the site in the meantime:\n\n{}",
        summary
    )
}

// ============================================================================
// ChatClient
// ============================================================================

/// OpenAI 채팅 스트리밍 클라이언트
#[derive(Clone)]
pub struct ChatClient {
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

impl ChatClient {
    pub fn new(api_key: Option<String>, model: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            model: model.to_string(),
            client,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.openai_api_key.clone(), &config.chat_model)
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// 응답 스트리밍 시작
    ///
    /// 요청이 성공하면 텍스트 조각 스트림을 돌려줍니다. 스트리밍 도중의
    /// 에러는 로그만 남기고 스트림을 끝냅니다.
    pub async fn stream(
        &self,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<ReceiverStream<String>> {
        let api_key = self.api_key.as_deref().context("OPENAI_API_KEY not set")?;

        let mut all = Vec::with_capacity(messages.len() + 1);
        all.push(ChatMessage::system(system));
        all.extend(messages.iter().filter(|m| m.role != "system").cloned());

        let body = serde_json::json!({
            "model": self.model,
            "messages": all,
            "max_tokens": MAX_TOKENS,
            "temperature": TEMPERATURE,
            "stream": true,
        });

        let request = self
            .client
            .post(OPENAI_CHAT_URL)
            .bearer_auth(api_key)
            .json(&body)
            .send();
        let response = tokio::time::timeout(STREAM_IDLE_TIMEOUT, request)
            .await
            .context("Chat request timed out")?
            .context("Failed to send chat request")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI chat API error ({}): {}", status, error_body);
        }

        let (tx, rx) = mpsc::channel::<String>(256);
        tokio::spawn(pump_sse(response.bytes_stream(), tx, STREAM_IDLE_TIMEOUT));

        Ok(ReceiverStream::new(rx))
    }
}

// ============================================================================
// SSE stream reading
// ============================================================================

/// 바이트 조각을 줄 단위로 모으는 버퍼
///
/// 멀티바이트 문자가 조각 경계에 걸쳐도 줄이 완성된 뒤에만 디코딩합니다.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    /// 조각을 추가하고 완성된 줄을 돌려줍니다 (`\n` 제외)
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            match std::str::from_utf8(&line[..pos]) {
                Ok(text) => lines.push(text.to_string()),
                Err(e) => tracing::warn!("Skipping non UTF-8 SSE line: {}", e),
            }
        }
        lines
    }
}

/// SSE 바이트 스트림을 읽어 텍스트 조각을 채널로 보냅니다
///
/// 조각 사이 대기가 `idle`을 넘거나 읽기 에러가 나면 로그를 남기고 끝냅니다.
pub(crate) async fn pump_sse<S, B, E>(stream: S, tx: mpsc::Sender<String>, idle: Duration)
where
    S: futures::Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut stream = std::pin::pin!(stream);
    let mut lines = SseLineBuffer::default();

    loop {
        let chunk = match tokio::time::timeout(idle, stream.next()).await {
            Ok(Some(Ok(chunk))) => chunk,
            Ok(Some(Err(e))) => {
                tracing::warn!("Chat stream read error: {}", e);
                return;
            }
            Ok(None) => return,
            Err(_) => {
                tracing::warn!("Chat stream idle for {:?}, closing", idle);
                return;
            }
        };

        for line in lines.push(chunk.as_ref()) {
            match parse_sse_line(&line) {
                SseEvent::Delta(text) => {
                    if tx.send(text).await.is_err() {
                        tracing::debug!("Chat client disconnected");
                        return;
                    }
                }
                SseEvent::Done => return,
                SseEvent::Skip => {}
            }
        }
    }
}
