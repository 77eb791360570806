//! 임베딩 모듈 - OpenAI API를 통한 텍스트 벡터화
//!
//! 텍스트를 고정 길이 벡터로 변환하는 OpenAI 임베딩 프로바이더입니다.
//! 시맨틱 검색과 인덱싱이 모두 이 모듈을 사용합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = OpenAiEmbedding::new(api_key, "text-embedding-3-small")?;
//! let embedding = embedder.embed("single-cell genomics").await?;
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::Config;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// OpenAI Embedding
// ============================================================================

/// OpenAI 임베딩 API 엔드포인트
/// ref: https://platform.openai.com/docs/api-reference/embeddings
const OPENAI_EMBED_URL: &str = "https://api.openai.com/v1/embeddings";

/// text-embedding-3-small 기본 차원
pub const DEFAULT_DIMENSION: usize = 1536;

/// Rate Limiter 설정
const RATE_LIMIT_RPM: u32 = 500;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
/// 호출 간 최소 딜레이
const MIN_DELAY_MS: u64 = 50;
/// 429 에러 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프 (ms)
const INITIAL_BACKOFF_MS: u64 = 2000;
/// 배치 요청당 최대 입력 수
const MAX_BATCH_INPUTS: usize = 64;

/// OpenAI 임베딩 구현체
#[derive(Debug)]
pub struct OpenAiEmbedding {
    api_key: String,
    model: String,
    client: reqwest::Client,
    dimension: usize,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

/// Rate Limiter with minimum delay between requests
#[derive(Debug)]
struct RateLimiter {
    requests: Vec<Instant>,
    max_requests: u32,
    window: Duration,
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            requests: Vec::new(),
            max_requests,
            window,
            min_delay: Duration::from_millis(MIN_DELAY_MS),
            last_request: None,
        }
    }

    /// 요청 가능 여부 확인 및 대기
    async fn acquire(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                tokio::time::sleep(self.min_delay - elapsed).await;
            }
        }

        let now = Instant::now();
        self.requests.retain(|&t| now.duration_since(t) < self.window);

        if self.requests.len() >= self.max_requests as usize {
            if let Some(&oldest) = self.requests.first() {
                let wait_time = self.window.saturating_sub(now.duration_since(oldest));
                if !wait_time.is_zero() {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
                    tokio::time::sleep(wait_time).await;
                }
                let now = Instant::now();
                self.requests.retain(|&t| now.duration_since(t) < self.window);
            }
        }

        let now = Instant::now();
        self.requests.push(now);
        self.last_request = Some(now);
    }
}

impl OpenAiEmbedding {
    /// 새 OpenAI 임베딩 인스턴스 생성
    ///
    /// # Arguments
    /// * `api_key` - OpenAI API 키
    /// * `model` - 임베딩 모델 이름
    pub fn new(api_key: String, model: &str) -> Result<Self> {
        let dimension = model_dimension(model)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let rate_limiter = Arc::new(Mutex::new(RateLimiter::new(
            RATE_LIMIT_RPM,
            RATE_LIMIT_WINDOW,
        )));

        Ok(Self {
            api_key,
            model: model.to_string(),
            client,
            dimension,
            rate_limiter,
        })
    }

    /// 설정에서 생성
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .openai_api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY not set"))?;
        Self::new(api_key, &config.embedding_model)
    }

    /// 요청 1회 (재시도 포함)
    async fn request(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let expected = inputs.len();
        let request = EmbedRequest {
            model: &self.model,
            input: inputs,
        };

        let mut last_error: Option<anyhow::Error> = None;

        // 재시도 루프 (429 에러 시 지수 백오프)
        for attempt in 0..=MAX_RETRIES {
            {
                let mut limiter = self.rate_limiter.lock().await;
                limiter.acquire().await;
            }

            let response = match self
                .client
                .post(OPENAI_EMBED_URL)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(anyhow::anyhow!("Failed to send embedding request: {}", e));
                    if attempt < MAX_RETRIES {
                        let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                        tracing::warn!(
                            "Request failed, retrying in {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .context("Failed to read response body")?;

            if status.is_success() {
                return parse_embed_response(&body, expected);
            }

            if status.as_u16() == 429 {
                let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                tracing::warn!(
                    "Rate limit hit (429), backing off {:?} (attempt {}/{})",
                    backoff,
                    attempt + 1,
                    MAX_RETRIES
                );
                last_error = Some(anyhow::anyhow!("Rate limit exceeded (429)"));

                if attempt < MAX_RETRIES {
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            } else {
                if let Ok(error) = serde_json::from_str::<OpenAiError>(&body) {
                    anyhow::bail!(
                        "OpenAI API error ({}): {}",
                        error.error.error_type,
                        error.error.message
                    );
                }
                anyhow::bail!("OpenAI API error ({}): {}", status, body);
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("Embedding failed after {} retries", MAX_RETRIES)))
    }
}

/// 모델별 임베딩 차원
fn model_dimension(model: &str) -> Result<usize> {
    match model {
        "text-embedding-3-small" | "text-embedding-ada-002" => Ok(DEFAULT_DIMENSION),
        "text-embedding-3-large" => Ok(3072),
        other => anyhow::bail!(
            "Unsupported embedding model: {}. Use text-embedding-3-small, text-embedding-3-large or text-embedding-ada-002",
            other
        ),
    }
}

/// 줄바꿈을 공백으로 (API 입력 정규화)
pub fn prepare_input(text: &str) -> String {
    text.replace('\n', " ")
}

/// OpenAI API 요청 본문
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

/// OpenAI API 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// OpenAI API 에러 응답
#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
    #[serde(rename = "type", default)]
    error_type: String,
}

/// 응답 파싱 (입력 순서로 정렬)
fn parse_embed_response(body: &str, expected: usize) -> Result<Vec<Vec<f32>>> {
    let mut response: EmbedResponse =
        serde_json::from_str(body).context("Failed to parse embedding response")?;

    if response.data.len() != expected {
        anyhow::bail!(
            "Embedding count mismatch: expected {}, got {}",
            expected,
            response.data.len()
        );
    }

    response.data.sort_by_key(|d| d.index);
    Ok(response.data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }

        self.request(vec![prepare_input(text)])
            .await?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());

        for (i, batch) in texts.chunks(MAX_BATCH_INPUTS).enumerate() {
            tracing::debug!(
                "Embedding batch {} ({} inputs, {} total)",
                i + 1,
                batch.len(),
                texts.len()
            );
            let inputs = batch.iter().map(|t| prepare_input(t)).collect();
            results.extend(self.request(inputs).await?);
        }

        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Factory Function
// ============================================================================

/// 임베딩 프로바이더 생성
///
/// API 키가 없으면 `None` (시맨틱 검색 비활성, 키워드/폴백만 동작)
pub fn create_embedder(config: &Config) -> Result<Option<Arc<dyn EmbeddingProvider>>> {
    if !config.has_api_key() {
        tracing::warn!("OPENAI_API_KEY not set; semantic search disabled");
        return Ok(None);
    }

    let embedder = OpenAiEmbedding::from_config(config)?;
    tracing::info!(
        "Using OpenAI embedding {} (dimension: {})",
        embedder.name(),
        embedder.dimension()
    );
    Ok(Some(Arc::new(embedder)))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_dimension() {
        assert_eq!(model_dimension("text-embedding-3-small").unwrap(), 1536);
        assert_eq!(model_dimension("text-embedding-3-large").unwrap(), 3072);

        let err = model_dimension("legacy-embedding-001").unwrap_err();
        assert!(err.to_string().contains("Unsupported embedding model"));
    }

    #[test]
    fn test_prepare_input() {
        assert_eq!(prepare_input("line one\nline two"), "line one line two");
    }

    #[test]
    fn test_parse_embed_response_orders_by_index() {
        let body = r#"{"data":[
            {"index":1,"embedding":[0.0,1.0]},
            {"index":0,"embedding":[1.0,0.0]}
        ],"model":"text-embedding-3-small"}"#;

        let vectors = parse_embed_response(body, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);

        assert!(parse_embed_response(body, 3).is_err());
    }

    #[tokio::test]
    async fn test_empty_text_skips_request() {
        let embedder =
            OpenAiEmbedding::new("fake_key".to_string(), "text-embedding-3-small").unwrap();
        let vector = embedder.embed("   ").await.unwrap();
        assert_eq!(vector.len(), DEFAULT_DIMENSION);
        assert!(vector.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_create_embedder_without_key() {
        let config = Config {
            openai_api_key: None,
            ..crate::config::tests::test_config()
        };
        assert!(create_embedder(&config).unwrap().is_none());
    }
}
