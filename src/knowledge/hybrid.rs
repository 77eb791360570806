//! 하이브리드 검색 - LanceDB 시맨틱 + FTS5 키워드 통합
//!
//! 두 검색을 동시에 실행하고, 순위 기반 점수로 합친 뒤
//! (object_type, object_id) 단위로 중복을 제거합니다.
//!
//! - 시맨틱 점수: `1 - 0.1 * rank`
//! - 키워드 점수: `0.5 - 0.05 * rank`
//!
//! 한쪽 검색이 실패해도 에러를 돌려주지 않습니다. 결과가 모두 비면
//! 카탈로그 정적 스캔(fallback)으로 채웁니다.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::content::{ContentCatalog, ContentItem, ObjectMetadata, ObjectType};
use crate::db::Database;
use crate::embedding::{create_embedder, EmbeddingProvider, DEFAULT_DIMENSION};

use super::chunker::{default_chunker, Chunker};
use super::indexing::IndexDocument;
use super::lance::LanceVectorStore;
use super::store::KnowledgeStore;
use super::vector::{VectorEntry, VectorQuery, VectorStore};

/// 기본 결과 수
pub const DEFAULT_LIMIT: usize = 10;

// ============================================================================
// Types
// ============================================================================

/// 검색 방법
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    /// 시맨틱 + 키워드
    #[default]
    Hybrid,
    /// 벡터 검색만
    Semantic,
    /// FTS5 키워드 검색만
    Keyword,
    /// 카탈로그 정적 스캔
    Fallback,
}

impl SearchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMethod::Hybrid => "hybrid",
            SearchMethod::Semantic => "semantic",
            SearchMethod::Keyword => "keyword",
            SearchMethod::Fallback => "fallback",
        }
    }
}

impl fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hybrid" => Ok(SearchMethod::Hybrid),
            "semantic" => Ok(SearchMethod::Semantic),
            "keyword" => Ok(SearchMethod::Keyword),
            "fallback" => Ok(SearchMethod::Fallback),
            other => anyhow::bail!(
                "Unknown search method: {} (expected hybrid, semantic, keyword or fallback)",
                other
            ),
        }
    }
}

/// 결과 출처
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitSource {
    Semantic,
    Keyword,
    Fallback,
}

/// 검색 결과 한 건
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub object_type: ObjectType,
    pub object_id: String,
    pub chunk: String,
    /// 순위 기반 점수 (높을수록 좋음)
    pub score: f32,
    /// 코사인 유사도 (시맨틱 결과만)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
    pub source: HitSource,
    pub metadata: ObjectMetadata,
}

/// 검색 응답
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResponse {
    pub semantic: Vec<SearchHit>,
    pub keyword: Vec<SearchHit>,
    pub combined: Vec<SearchHit>,
}

/// 검색 요청
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub object_type: Option<ObjectType>,
    pub limit: usize,
    pub method: SearchMethod,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            object_type: None,
            limit: DEFAULT_LIMIT,
            method: SearchMethod::Hybrid,
        }
    }

    pub fn with_type(mut self, object_type: Option<ObjectType>) -> Self {
        self.object_type = object_type;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_method(mut self, method: SearchMethod) -> Self {
        self.method = method;
        self
    }
}

/// 인덱싱 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// 새로 인덱싱됨
    Indexed { chunks: usize, embedded: bool },
    /// 콘텐츠 해시가 같아 건너뜀
    Unchanged,
}

/// 하이브리드 저장소 통계
#[derive(Debug, Clone, Serialize)]
pub struct HybridStats {
    pub object_count: usize,
    pub chunk_count: usize,
    pub vector_count: usize,
    pub total_chunk_bytes: usize,
    pub semantic_enabled: bool,
}

// ============================================================================
// HybridRetriever
// ============================================================================

/// 하이브리드 검색기
///
/// SQLite FTS5 (키워드) + 벡터 저장소 (시맨틱)를 통합합니다.
/// 임베더가 없으면 시맨틱 검색은 항상 실패로 취급됩니다.
pub struct HybridRetriever {
    store: KnowledgeStore,
    vector: Arc<dyn VectorStore>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    catalog: Arc<ContentCatalog>,
    chunker: Box<dyn Chunker>,
}

impl HybridRetriever {
    /// 주입된 구성요소로 생성
    pub fn new(
        store: KnowledgeStore,
        vector: Arc<dyn VectorStore>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        catalog: Arc<ContentCatalog>,
    ) -> Self {
        Self {
            store,
            vector,
            embedder,
            catalog,
            chunker: default_chunker(),
        }
    }

    /// 설정으로 생성 (LanceDB + OpenAI 임베딩)
    ///
    /// # Arguments
    /// * `config` - 런타임 설정
    /// * `db` - 공유 SQLite 핸들
    /// * `catalog` - 콘텐츠 카탈로그
    pub async fn open(config: &Config, db: Database, catalog: Arc<ContentCatalog>) -> Result<Self> {
        let store = KnowledgeStore::new(db).context("Failed to open knowledge store")?;

        let embedder = create_embedder(config)?;
        let dimension = embedder
            .as_ref()
            .map(|e| e.dimension())
            .unwrap_or(DEFAULT_DIMENSION);

        let vector = LanceVectorStore::open(&config.lance_path(), dimension)
            .await
            .context("Failed to open vector store")?;

        Ok(Self::new(store, Arc::new(vector), embedder, catalog))
    }

    /// 청커 교체
    pub fn with_chunker(mut self, chunker: Box<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn catalog(&self) -> &Arc<ContentCatalog> {
        &self.catalog
    }

    pub fn store(&self) -> &KnowledgeStore {
        &self.store
    }

    /// 시맨틱 검색 가능 여부
    pub fn semantic_enabled(&self) -> bool {
        self.embedder.is_some()
    }

    // ========================================================================
    // Indexing
    // ========================================================================

    /// 문서 인덱싱 (청크 + 임베딩을 객체 단위로 통째로 교체)
    ///
    /// 콘텐츠 해시가 마지막 인덱싱과 같으면 `force`가 아닌 한 건너뜁니다.
    /// 임베딩이 실패하면 기존 청크/벡터는 그대로 남습니다.
    pub async fn index_document(&self, doc: &IndexDocument, force: bool) -> Result<IndexOutcome> {
        let embedder_name = self
            .embedder
            .as_ref()
            .map(|e| e.name().to_string())
            .unwrap_or_else(|| "none".to_string());
        let hash = doc.content_hash(&embedder_name);

        if !force {
            let previous = self.store.content_hash(doc.object_type, &doc.object_id)?;
            if previous.as_deref() == Some(hash.as_str()) {
                tracing::debug!("Unchanged, skipping: {}/{}", doc.object_type, doc.object_id);
                return Ok(IndexOutcome::Unchanged);
            }
        }

        let chunks: Vec<String> = doc
            .sections
            .iter()
            .flat_map(|section| self.chunker.chunk(section))
            .filter(|chunk| !chunk.trim().is_empty())
            .collect();

        let metadata_json =
            serde_json::to_string(&doc.metadata).context("Failed to serialize metadata")?;

        let embedded = match &self.embedder {
            Some(embedder) => {
                let embeddings = embedder
                    .embed_batch(&chunks)
                    .await
                    .context("Failed to embed chunks")?;

                let entries: Vec<VectorEntry> = chunks
                    .iter()
                    .zip(embeddings)
                    .enumerate()
                    .map(|(i, (chunk, embedding))| VectorEntry {
                        object_type: doc.object_type,
                        object_id: doc.object_id.clone(),
                        chunk_index: i as i32,
                        chunk_text: chunk.clone(),
                        metadata: metadata_json.clone(),
                        embedding,
                    })
                    .collect();

                self.vector
                    .replace_object(doc.object_type, &doc.object_id, &entries)
                    .await
                    .context("Failed to store vectors")?;
                true
            }
            None => false,
        };

        self.store
            .replace_object_chunks(doc.object_type, &doc.object_id, &chunks, &metadata_json)?;
        self.store
            .record_index_state(doc.object_type, &doc.object_id, &hash, chunks.len())?;

        tracing::info!(
            "Indexed {}/{} ({} chunks, embedded: {})",
            doc.object_type,
            doc.object_id,
            chunks.len(),
            embedded
        );

        Ok(IndexOutcome::Indexed {
            chunks: chunks.len(),
            embedded,
        })
    }

    /// 객체 삭제 (청크, 벡터, 인덱싱 상태)
    pub async fn delete_object(&self, object_type: ObjectType, object_id: &str) -> Result<()> {
        self.vector.delete_object(object_type, object_id).await?;
        self.store.delete_object(object_type, object_id)?;
        Ok(())
    }

    /// `docs`에 없는 객체를 인덱스에서 제거 (삭제된 콘텐츠 정리)
    ///
    /// 제거한 객체 키를 돌려줍니다.
    pub async fn prune_missing(&self, docs: &[IndexDocument]) -> Result<Vec<(ObjectType, String)>> {
        let keep: HashSet<(ObjectType, &str)> = docs
            .iter()
            .map(|d| (d.object_type, d.object_id.as_str()))
            .collect();

        let mut removed = Vec::new();
        for (object_type, object_id) in self.store.indexed_objects()? {
            if keep.contains(&(object_type, object_id.as_str())) {
                continue;
            }
            self.delete_object(object_type, &object_id).await?;
            tracing::info!("Removed stale {} {} from index", object_type, object_id);
            removed.push((object_type, object_id));
        }

        Ok(removed)
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// 검색 (에러를 돌려주지 않음)
    pub async fn search(&self, request: &SearchRequest) -> SearchResponse {
        let query = request.query.trim();
        if query.is_empty() || request.limit == 0 {
            return SearchResponse::default();
        }

        let object_type = request.object_type;
        let limit = request.limit;

        let (mut response, any_failed) = match request.method {
            SearchMethod::Fallback => (
                SearchResponse {
                    combined: self.search_fallback(query, object_type, limit),
                    ..Default::default()
                },
                false,
            ),
            SearchMethod::Semantic => {
                let (semantic, failed) =
                    settle("semantic", self.search_semantic(query, object_type, limit).await);
                let combined = merge_hits(&semantic, &[], limit);
                (
                    SearchResponse {
                        semantic,
                        combined,
                        ..Default::default()
                    },
                    failed,
                )
            }
            SearchMethod::Keyword => {
                let (keyword, failed) =
                    settle("keyword", self.search_keyword(query, object_type, limit).await);
                let combined = merge_hits(&[], &keyword, limit);
                (
                    SearchResponse {
                        keyword,
                        combined,
                        ..Default::default()
                    },
                    failed,
                )
            }
            SearchMethod::Hybrid => {
                let half = half_limit(limit);
                let (semantic, keyword) = tokio::join!(
                    self.search_semantic(query, object_type, half),
                    self.search_keyword(query, object_type, half)
                );
                let (semantic, semantic_failed) = settle("semantic", semantic);
                let (keyword, keyword_failed) = settle("keyword", keyword);
                let combined = merge_hits(&semantic, &keyword, limit);
                (
                    SearchResponse {
                        semantic,
                        keyword,
                        combined,
                    },
                    semantic_failed || keyword_failed,
                )
            }
        };

        if response.combined.is_empty() && any_failed {
            tracing::warn!("Index search degraded, using fallback scan for '{}'", query);
            response.combined = self.search_fallback(query, object_type, limit);
        }

        self.enrich(&mut response.semantic);
        self.enrich(&mut response.keyword);
        self.enrich(&mut response.combined);

        tracing::debug!(
            "Search '{}' ({}): semantic={}, keyword={}, combined={}",
            query,
            request.method,
            response.semantic.len(),
            response.keyword.len(),
            response.combined.len()
        );

        response
    }

    /// 시맨틱 검색 (임계값 0.7)
    pub async fn search_semantic(
        &self,
        query: &str,
        object_type: Option<ObjectType>,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Embedding provider not configured"))?;

        let query_embedding = embedder
            .embed(query)
            .await
            .context("Failed to embed query")?;

        let results = self
            .vector
            .search(&query_embedding, &VectorQuery::new(limit, object_type))
            .await?;

        Ok(results
            .into_iter()
            .enumerate()
            .map(|(i, r)| SearchHit {
                object_type: r.object_type,
                object_id: r.object_id,
                chunk: r.chunk_text,
                score: semantic_score(i),
                similarity: Some(r.similarity),
                source: HitSource::Semantic,
                metadata: ObjectMetadata::from_json_or_bare(&r.metadata, r.object_type),
            })
            .collect())
    }

    /// FTS5 키워드 검색
    pub async fn search_keyword(
        &self,
        query: &str,
        object_type: Option<ObjectType>,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let store = self.store.clone();
        let query = query.to_string();

        let results = tokio::task::spawn_blocking(move || store.search_fts(&query, object_type, limit))
            .await
            .context("Keyword search task failed")??;

        Ok(results
            .into_iter()
            .enumerate()
            .map(|(i, r)| SearchHit {
                object_type: r.object_type,
                metadata: ObjectMetadata::from_json_or_bare(&r.metadata, r.object_type),
                object_id: r.object_id,
                chunk: r.chunk,
                score: keyword_score(i),
                similarity: None,
                source: HitSource::Keyword,
            })
            .collect())
    }

    /// 카탈로그 정적 스캔 (대소문자 무시 부분 문자열)
    ///
    /// - 논문: 제목, 초록, 게재처, 태그
    /// - 프로젝트: 제목, 요약, 태그, 기술 스택
    ///
    /// 제목이 일치하면 1.0, 아니면 0.7
    pub fn search_fallback(
        &self,
        query: &str,
        object_type: Option<ObjectType>,
        limit: usize,
    ) -> Vec<SearchHit> {
        let term = query.trim().to_lowercase();
        if term.is_empty() {
            return vec![];
        }

        let contains = |text: &str| text.to_lowercase().contains(&term);
        let wants = |t: ObjectType| object_type.map_or(true, |filter| filter == t);

        let mut hits = Vec::new();

        if wants(ObjectType::Publication) {
            for p in &self.catalog.publications {
                let title_match = contains(&p.title);
                if title_match
                    || contains(&p.abstract_text)
                    || contains(&p.venue)
                    || p.tags.iter().any(|t| contains(t))
                {
                    hits.push(SearchHit {
                        object_type: ObjectType::Publication,
                        object_id: p.slug.clone(),
                        chunk: p.abstract_text.clone(),
                        score: if title_match { 1.0 } else { 0.7 },
                        similarity: None,
                        source: HitSource::Fallback,
                        metadata: ContentItem::Publication(p).metadata(),
                    });
                }
            }
        }

        if wants(ObjectType::Project) {
            for p in &self.catalog.projects {
                let title_match = contains(&p.title);
                if title_match
                    || contains(&p.summary)
                    || p.tags.iter().any(|t| contains(t))
                    || p.stack.iter().any(|t| contains(t))
                {
                    hits.push(SearchHit {
                        object_type: ObjectType::Project,
                        object_id: p.slug.clone(),
                        chunk: p.summary.clone(),
                        score: if title_match { 1.0 } else { 0.7 },
                        similarity: None,
                        source: HitSource::Fallback,
                        metadata: ContentItem::Project(p).metadata(),
                    });
                }
            }
        }

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        hits
    }

    /// 카탈로그에 있는 객체는 최신 메타데이터로 교체
    fn enrich(&self, hits: &mut [SearchHit]) {
        for hit in hits.iter_mut() {
            if let Some(item) = self.catalog.find(hit.object_type, &hit.object_id) {
                hit.metadata = item.metadata();
            }
        }
    }

    /// 저장소 통계
    pub async fn stats(&self) -> Result<HybridStats> {
        let store_stats = self.store.stats()?;
        let vector_count = self.vector.count().await?;

        Ok(HybridStats {
            object_count: store_stats.object_count,
            chunk_count: store_stats.chunk_count,
            vector_count,
            total_chunk_bytes: store_stats.total_chunk_bytes,
            semantic_enabled: self.semantic_enabled(),
        })
    }
}

// ============================================================================
// Merge
// ============================================================================

/// 시맨틱 순위 점수
pub fn semantic_score(rank: usize) -> f32 {
    1.0 - 0.1 * rank as f32
}

/// 키워드 순위 점수
pub fn keyword_score(rank: usize) -> f32 {
    0.5 - 0.05 * rank as f32
}

/// 하이브리드 모드에서 각 검색의 상한 (`ceil(limit / 2)`)
pub fn half_limit(limit: usize) -> usize {
    limit.div_ceil(2)
}

/// 결과 통합
///
/// 시맨틱 결과를 먼저 넣고, 키워드 결과는 같은 키가 없을 때만 넣습니다.
/// 한 목록 안에서는 먼저 나온 (순위가 높은) 항목이 이깁니다.
/// 점수 내림차순 안정 정렬 후 `limit`개로 자릅니다.
pub fn merge_hits(semantic: &[SearchHit], keyword: &[SearchHit], limit: usize) -> Vec<SearchHit> {
    let mut seen: HashSet<(ObjectType, &str)> = HashSet::new();
    let mut combined: Vec<SearchHit> = Vec::new();

    for hit in semantic.iter().chain(keyword.iter()) {
        if seen.insert((hit.object_type, hit.object_id.as_str())) {
            combined.push(hit.clone());
        }
    }

    combined.sort_by(|a, b| b.score.total_cmp(&a.score));
    combined.truncate(limit);
    combined
}

/// 실패한 하위 검색은 경고 후 빈 목록으로
fn settle(label: &str, result: Result<Vec<SearchHit>>) -> (Vec<SearchHit>, bool) {
    match result {
        Ok(hits) => (hits, false),
        Err(e) => {
            tracing::warn!("{} search failed: {:#}", label, e);
            (vec![], true)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
