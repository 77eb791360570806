//! folio-graph - 포트폴리오 하이브리드 검색 + 지식 그래프
//!
//! 논문/프로젝트/사진 콘텐츠를 LanceDB 벡터 검색과 SQLite FTS5 키워드 검색으로
//! 찾고, 태그/기술/게재처 관계를 세대별 지식 그래프로 제공합니다.

pub mod chat;
pub mod cli;
pub mod config;
pub mod content;
pub mod db;
pub mod embedding;
pub mod graph;
pub mod knowledge;
pub mod photos;
pub mod server;
pub mod tools;

// Re-exports
pub use config::Config;
pub use content::{ContentCatalog, ObjectMetadata, ObjectType, Project, Publication};
pub use db::Database;
pub use embedding::{create_embedder, EmbeddingProvider};
pub use graph::{extract_graph, GraphData, GraphService, GraphStore};
pub use knowledge::{
    catalog_documents, HybridRetriever, HybridStats, IndexDocument, KnowledgeStore,
    LanceVectorStore, SearchMethod, SearchRequest, SearchResponse, VectorStore,
};
pub use photos::{Photo, PhotoService, PhotoStore};
pub use tools::AssistantTools;
