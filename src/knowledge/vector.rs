//! Vector Store - 벡터 검색 트레이트 및 유틸리티
//!
//! 구현체는 LanceDB (`lance.rs`)입니다.

use anyhow::Result;
use async_trait::async_trait;

use crate::content::ObjectType;

/// 시맨틱 검색 유사도 임계값 (코사인)
pub const MATCH_THRESHOLD: f32 = 0.7;

// ============================================================================
// Types
// ============================================================================

/// 벡터 엔트리 (저장용)
#[derive(Debug, Clone)]
pub struct VectorEntry {
    pub object_type: ObjectType,
    pub object_id: String,
    /// 청크 인덱스 (0-based)
    pub chunk_index: i32,
    pub chunk_text: String,
    /// 객체 메타데이터 JSON
    pub metadata: String,
    pub embedding: Vec<f32>,
}

/// 벡터 검색 조건
#[derive(Debug, Clone)]
pub struct VectorQuery {
    /// 객체 종류 필터
    pub object_type: Option<ObjectType>,
    /// 최소 유사도
    pub threshold: f32,
    /// 최대 결과 수
    pub limit: usize,
}

impl VectorQuery {
    /// 기본 임계값으로 생성
    pub fn new(limit: usize, object_type: Option<ObjectType>) -> Self {
        Self {
            object_type,
            threshold: MATCH_THRESHOLD,
            limit,
        }
    }
}

/// 검색 결과
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub object_type: ObjectType,
    pub object_id: String,
    pub chunk_index: i32,
    pub chunk_text: String,
    pub metadata: String,
    /// 유사도 스코어 (0.0 ~ 1.0)
    pub similarity: f32,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
///
/// 객체 단위로 벡터를 통째로 교체하고, 임계값/개수 제한이 있는
/// 최근접 이웃 검색을 제공합니다.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 객체의 벡터를 교체 (기존 벡터 삭제 후 삽입)
    async fn replace_object(
        &self,
        object_type: ObjectType,
        object_id: &str,
        entries: &[VectorEntry],
    ) -> Result<usize>;

    /// 벡터 검색 (유사도 내림차순, 임계값 미만 제외)
    async fn search(&self, query_embedding: &[f32], query: &VectorQuery)
        -> Result<Vec<SearchResult>>;

    /// 객체의 벡터 삭제
    async fn delete_object(&self, object_type: ObjectType, object_id: &str) -> Result<usize>;

    /// 벡터 개수 조회
    async fn count(&self) -> Result<usize>;

    /// 객체의 임베딩 존재 여부
    async fn has_embeddings(&self, object_type: ObjectType, object_id: &str) -> Result<bool>;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 결과는 -1.0 ~ 1.0 범위입니다.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// 코사인 거리를 유사도로 변환
///
/// LanceDB의 cosine distance는 `1 - cos`입니다.
pub fn distance_to_similarity(distance: f32) -> f32 {
    1.0 - distance
}

// ============================================================================
// Tests
// ============================================================================
