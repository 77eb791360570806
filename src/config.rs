//! 설정 - 환경변수 기반 런타임 설정
//!
//! 모든 클라이언트 핸들은 이 설정으로 한 번 생성되어 주입됩니다.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// 기본 바인드 주소
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// 기본 공개 URL (업로드된 블롭의 URL 접두사)
pub const DEFAULT_PUBLIC_URL: &str = "http://localhost:3000";

/// 기본 임베딩 모델
/// ref: https://platform.openai.com/docs/guides/embeddings
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// 기본 채팅 모델
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

// ============================================================================
// Config
// ============================================================================

/// 런타임 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 데이터 디렉토리 (folio.db, vectors.lance, blobs/)
    pub data_dir: PathBuf,
    /// 콘텐츠 디렉토리 (publications/, projects/, site.yaml)
    pub content_dir: PathBuf,
    /// HTTP 바인드 주소
    pub bind: SocketAddr,
    /// OpenAI API 키 (없으면 시맨틱 검색/채팅이 폴백으로 동작)
    pub openai_api_key: Option<String>,
    /// 사진 업로드용 관리자 키
    pub admin_secret_key: Option<String>,
    /// 공개 URL
    pub public_url: String,
    pub embedding_model: String,
    pub chat_model: String,
}

impl Config {
    /// 환경변수에서 설정 로드
    ///
    /// - `FOLIO_DATA_DIR`, `FOLIO_CONTENT_DIR`, `FOLIO_BIND`, `FOLIO_PUBLIC_URL`
    /// - `OPENAI_API_KEY`, `ADMIN_SECRET_KEY`
    /// - `FOLIO_EMBEDDING_MODEL`, `FOLIO_CHAT_MODEL`
    pub fn from_env() -> Result<Self> {
        let bind = env_non_empty("FOLIO_BIND")
            .unwrap_or_else(|| DEFAULT_BIND.to_string())
            .parse()
            .context("FOLIO_BIND is not a valid socket address")?;

        Ok(Self {
            data_dir: env_non_empty("FOLIO_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(get_data_dir),
            content_dir: env_non_empty("FOLIO_CONTENT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("content")),
            bind,
            openai_api_key: env_non_empty("OPENAI_API_KEY"),
            admin_secret_key: env_non_empty("ADMIN_SECRET_KEY"),
            public_url: normalize_public_url(
                env_non_empty("FOLIO_PUBLIC_URL").as_deref().unwrap_or(DEFAULT_PUBLIC_URL),
            )?,
            embedding_model: env_non_empty("FOLIO_EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            chat_model: env_non_empty("FOLIO_CHAT_MODEL")
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
        })
    }

    /// SQLite DB 경로
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("folio.db")
    }

    /// LanceDB 경로
    pub fn lance_path(&self) -> PathBuf {
        self.data_dir.join("vectors.lance")
    }

    /// 블롭 저장 디렉토리
    pub fn blob_dir(&self) -> PathBuf {
        self.data_dir.join("blobs")
    }

    /// API 키 존재 여부
    pub fn has_api_key(&self) -> bool {
        self.openai_api_key.is_some()
    }
}

/// 데이터 디렉토리 경로 (~/.folio-graph/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".folio-graph")
}

/// 공개 URL 검증 (http/https만, 끝의 `/` 제거)
pub fn normalize_public_url(raw: &str) -> Result<String> {
    let parsed = url::Url::parse(raw.trim())
        .with_context(|| format!("FOLIO_PUBLIC_URL is not a valid URL: {}", raw))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("FOLIO_PUBLIC_URL must use http or https: {}", raw);
    }

    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
