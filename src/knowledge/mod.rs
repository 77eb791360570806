//! Knowledge 모듈 - 하이브리드 검색 저장소
//!
//! - SQLite: 청크 저장 + FTS5 키워드 검색
//! - LanceDB: 청크 임베딩 벡터 검색
//! - Hybrid: 순위 점수로 두 검색 결과 통합, 실패 시 카탈로그 스캔
//! - Chunker: 문장 경계 텍스트 분할

mod chunker;
mod hybrid;
mod indexing;
mod lance;
mod store;
mod vector;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use chunker::{default_chunker, ChunkConfig, Chunker, SentenceChunker};
pub use hybrid::{
    half_limit, keyword_score, merge_hits, semantic_score, HitSource, HybridRetriever,
    HybridStats, IndexOutcome, SearchHit, SearchMethod, SearchRequest, SearchResponse,
    DEFAULT_LIMIT,
};
pub use indexing::{catalog_documents, IndexDocument};
pub use lance::LanceVectorStore;
pub use store::{FtsSearchResult, KnowledgeStore, StoreStats};
pub use vector::{
    cosine_similarity, SearchResult, VectorEntry, VectorQuery, VectorStore, MATCH_THRESHOLD,
};
