//! Assistant Tools - 채팅 어시스턴트와 HTTP 핸들러가 공유하는 콘텐츠 조회 연산
//!
//! 모든 결과는 타입이 정해진 구조체/열거형으로 돌려줍니다.
//! 찾을 수 없는 콘텐츠는 에러가 아니라 빈 결과(또는 None)입니다.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::content::{ContentItem, ObjectMetadata, ObjectType, Project, ProjectStatus, Publication};
use crate::graph::{GraphEdge, GraphNode, GraphService};
use crate::knowledge::{HybridRetriever, SearchRequest};
use crate::photos::{GalleryQuery, Photo, PhotoService};

/// 요약 스니펫 길이 (문자)
const SUMMARY_CHARS: usize = 200;
/// keyTakeaway에 넣을 초록 길이 (문자)
const TAKEAWAY_CHARS: usize = 150;
/// 관련 콘텐츠 기본 개수
pub const DEFAULT_RELATED_LIMIT: usize = 3;

// ============================================================================
// Result Types
// ============================================================================

/// `search_content` 결과 한 건
#[derive(Debug, Clone, Serialize)]
pub struct FormattedResult {
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    pub id: String,
    pub title: String,
    pub summary: String,
    pub url: String,
    pub relevance: f32,
    pub metadata: ObjectMetadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchContentResult {
    pub query: String,
    pub search_type: String,
    pub total_found: usize,
    pub results: Vec<FormattedResult>,
}

/// 관련 콘텐츠 한 건
#[derive(Debug, Clone, Serialize)]
pub struct RelatedItem {
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    pub id: String,
    pub title: String,
    pub url: String,
    /// 0..=100 (시맨틱 결과가 아니면 0)
    pub similarity: u32,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub id: String,
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_content: Option<SourceRef>,
    pub related: Vec<RelatedItem>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `summarize_content` 결과
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentSummary {
    #[serde(rename_all = "camelCase")]
    Publication {
        title: String,
        summary: String,
        year: i32,
        venue: String,
        tags: Vec<String>,
        url: String,
        pdf_url: Option<String>,
        code_url: Option<String>,
        key_takeaway: String,
    },
    #[serde(rename_all = "camelCase")]
    Project {
        title: String,
        summary: String,
        status: ProjectStatus,
        technologies: Vec<String>,
        tags: Vec<String>,
        url: String,
        repo_url: Option<String>,
        demo_url: Option<String>,
        key_takeaway: String,
    },
}

/// `get_content_details` 결과
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentDetails {
    Publication(Publication),
    Project(Project),
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphResultStats {
    pub nodes_in_graph: usize,
    pub edges_in_graph: usize,
    pub total_nodes: usize,
    pub total_edges: usize,
}

/// `get_graph` 결과
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphResult {
    pub central_node: String,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub stats: GraphResultStats,
}

/// `render_gallery` 결과
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryResult {
    pub photos: Vec<Photo>,
    pub total_count: usize,
    pub applied_filters: GalleryQuery,
}

// ============================================================================
// Helpers
// ============================================================================

/// 문자 단위로 자르고 잘렸으면 "..." 붙이기
pub fn snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn key_takeaway(item: ContentItem<'_>) -> String {
    match item {
        ContentItem::Publication(p) => format!(
            "This {} research published in {} explores {}...",
            p.year,
            p.venue,
            p.abstract_text.chars().take(TAKEAWAY_CHARS).collect::<String>()
        ),
        ContentItem::Project(p) => {
            let phase = match p.status {
                ProjectStatus::Completed => "Completed",
                ProjectStatus::InProgress => "Ongoing",
                ProjectStatus::Planned => "Planned",
            };
            let stack: Vec<&str> = p.stack.iter().take(3).map(String::as_str).collect();
            if stack.is_empty() {
                format!("{} project", phase)
            } else {
                format!("{} project using {}", phase, stack.join(", "))
            }
        }
    }
}

// ============================================================================
// AssistantTools
// ============================================================================

/// 어시스턴트 도구 모음
#[derive(Clone)]
pub struct AssistantTools {
    retriever: Arc<HybridRetriever>,
    graph: GraphService,
    photos: PhotoService,
}

impl AssistantTools {
    pub fn new(retriever: Arc<HybridRetriever>, graph: GraphService, photos: PhotoService) -> Self {
        Self {
            retriever,
            graph,
            photos,
        }
    }

    pub fn retriever(&self) -> &Arc<HybridRetriever> {
        &self.retriever
    }

    pub fn graph(&self) -> &GraphService {
        &self.graph
    }

    pub fn photos(&self) -> &PhotoService {
        &self.photos
    }

    /// 하이브리드 검색 결과를 어시스턴트용으로 정리
    pub async fn search_content(
        &self,
        query: &str,
        object_type: Option<ObjectType>,
        limit: usize,
    ) -> SearchContentResult {
        let request = SearchRequest::new(query)
            .with_type(object_type)
            .with_limit(limit);
        let response = self.retriever.search(&request).await;

        let results: Vec<FormattedResult> = response
            .combined
            .into_iter()
            .map(|hit| {
                let title = match hit.metadata.title() {
                    "" => "Untitled".to_string(),
                    title => title.to_string(),
                };
                FormattedResult {
                    object_type: hit.object_type,
                    id: hit.object_id,
                    title,
                    summary: snippet(&hit.chunk, SUMMARY_CHARS),
                    url: hit.metadata.url().to_string(),
                    relevance: hit.similarity.unwrap_or(hit.score),
                    metadata: hit.metadata,
                }
            })
            .collect();

        SearchContentResult {
            query: query.to_string(),
            search_type: object_type.map_or("all", |t| t.as_str()).to_string(),
            total_found: results.len(),
            results,
        }
    }

    /// 논문/프로젝트와 관련된 콘텐츠
    ///
    /// 제목 + 태그로 하이브리드 검색 후 자기 자신을 뺍니다.
    pub async fn get_related_content(
        &self,
        id: &str,
        object_type: ObjectType,
        limit: usize,
    ) -> RelatedContent {
        let Some(source) = self.retriever.catalog().find(object_type, id) else {
            return RelatedContent {
                source_content: None,
                related: Vec::new(),
                message: "No related content found".to_string(),
                error: Some(format!("Content not found: {} {}", object_type, id)),
            };
        };

        let query = std::iter::once(source.title())
            .chain(source.tags().iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");

        let response = self
            .retriever
            .search(&SearchRequest::new(query).with_limit(limit + 1))
            .await;

        let related: Vec<RelatedItem> = response
            .combined
            .into_iter()
            .filter(|hit| !(hit.object_type == object_type && hit.object_id == id))
            .take(limit)
            .map(|hit| RelatedItem {
                object_type: hit.object_type,
                title: hit.metadata.title().to_string(),
                url: hit.metadata.url().to_string(),
                similarity: hit.similarity.map_or(0, |s| (s * 100.0).round().max(0.0) as u32),
                tags: hit.metadata.tags().iter().take(3).cloned().collect(),
                id: hit.object_id,
            })
            .collect();

        let message = if related.is_empty() {
            "No related content found".to_string()
        } else {
            format!("Found {} related items", related.len())
        };

        RelatedContent {
            source_content: Some(SourceRef {
                id: id.to_string(),
                object_type,
                title: source.title().to_string(),
            }),
            related,
            message,
            error: None,
        }
    }

    /// 논문/프로젝트 요약
    pub fn summarize_content(&self, id: &str, object_type: ObjectType) -> Option<ContentSummary> {
        let item = self.retriever.catalog().find(object_type, id)?;
        let takeaway = key_takeaway(item);

        Some(match item {
            ContentItem::Publication(p) => ContentSummary::Publication {
                title: p.title.clone(),
                summary: p.abstract_text.clone(),
                year: p.year,
                venue: p.venue.clone(),
                tags: p.tags.clone(),
                url: p.url.clone(),
                pdf_url: p.pdf_url.clone(),
                code_url: p.code_url.clone(),
                key_takeaway: takeaway,
            },
            ContentItem::Project(p) => ContentSummary::Project {
                title: p.title.clone(),
                summary: p.summary.clone(),
                status: p.status,
                technologies: p.stack.clone(),
                tags: p.tags.clone(),
                url: p.url.clone(),
                repo_url: p.repo_url.clone(),
                demo_url: p.demo_url.clone(),
                key_takeaway: takeaway,
            },
        })
    }

    /// 콘텐츠 전체
    pub fn get_content_details(&self, slug: &str, object_type: ObjectType) -> Option<ContentDetails> {
        match self.retriever.catalog().find(object_type, slug)? {
            ContentItem::Publication(p) => Some(ContentDetails::Publication(p.clone())),
            ContentItem::Project(p) => Some(ContentDetails::Project(p.clone())),
        }
    }

    /// 서브그래프 + 전체 통계
    pub async fn get_graph(&self, node_id: &str, depth: usize) -> Result<GraphResult> {
        let graph = self.graph.node_graph_or_build(node_id, depth).await?;
        let stats = self.graph.stats().await?;

        Ok(GraphResult {
            central_node: node_id.to_string(),
            stats: GraphResultStats {
                nodes_in_graph: graph.nodes.len(),
                edges_in_graph: graph.edges.len(),
                total_nodes: stats.total_nodes,
                total_edges: stats.total_edges,
            },
            nodes: graph.nodes,
            edges: graph.edges,
        })
    }

    /// 사진 갤러리
    pub async fn render_gallery(&self, filter: GalleryQuery) -> Result<GalleryResult> {
        let photos = self.photos.gallery(filter.clone()).await?;
        Ok(GalleryResult {
            total_count: photos.len(),
            photos,
            applied_filters: filter,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::content::{fixtures, ContentCatalog};
    use crate::db::Database;
    use crate::embedding::EmbeddingProvider;
    use crate::graph::GraphStore;
    use crate::knowledge::testing::{MemoryVectorStore, TopicEmbedder};
    use crate::knowledge::{catalog_documents, KnowledgeStore};
    use crate::photos::{LocalBlobStore, PhotoStore};

    pub(crate) fn sample_catalog() -> ContentCatalog {
        let mut publication = fixtures::publication(
            "genomics-dl",
            "Genomics and Deep Learning",
            &["ml", "genomics", "transformers", "cells"],
        );
        publication.abstract_text = "a".repeat(300);
        fixtures::catalog(
            vec![
                publication,
                fixtures::publication("protein-folding", "Protein Folding with Genomics", &["genomics"]),
            ],
            vec![fixtures::project("cell-atlas", "Cell Atlas", &["genomics"], &["Rust", "Tokio", "Axum", "Arrow"])],
        )
    }

    /// 인메모리 저장소로 구성한 도구 (인덱싱 완료)
    pub(crate) async fn indexed_tools(blob_root: &std::path::Path) -> AssistantTools {
        let catalog = Arc::new(sample_catalog());
        let db = Database::open_in_memory().unwrap();
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(TopicEmbedder::new(&["genomics", "protein"]));

        let retriever = HybridRetriever::new(
            KnowledgeStore::new(db.clone()).unwrap(),
            Arc::new(MemoryVectorStore::default()),
            Some(embedder),
            catalog.clone(),
        );
        for doc in catalog_documents(&catalog) {
            retriever.index_document(&doc, false).await.unwrap();
        }

        let graph = GraphService::new(GraphStore::new(db.clone()).unwrap(), catalog);
        let photos = PhotoService::new(
            PhotoStore::new(db).unwrap(),
            Arc::new(LocalBlobStore::new(blob_root, "http://localhost:3000")),
            Some("admin-key".to_string()),
        );

        AssistantTools::new(Arc::new(retriever), graph, photos)
    }

    #[test]
    fn test_snippet() {
        assert_eq!(snippet("short", 200), "short");
        assert_eq!(snippet("abcdef", 3), "abc...");
        assert_eq!(snippet("유전체분석", 2), "유전...");
        assert_eq!(snippet("abc", 3), "abc");
    }

    #[tokio::test]
    async fn test_search_content() {
        let dir = tempfile::TempDir::new().unwrap();
        let tools = indexed_tools(dir.path()).await;

        let result = tools.search_content("genomics", None, 10).await;
        assert_eq!(result.search_type, "all");
        assert!(result.total_found > 0);
        assert_eq!(result.total_found, result.results.len());
        for r in &result.results {
            assert!(r.summary.chars().count() <= SUMMARY_CHARS + 3);
            assert!(!r.title.is_empty());
        }

        let projects = tools
            .search_content("genomics", Some(ObjectType::Project), 10)
            .await;
        assert_eq!(projects.search_type, "project");
        assert!(projects
            .results
            .iter()
            .all(|r| r.object_type == ObjectType::Project));
    }

    #[tokio::test]
    async fn test_related_excludes_source() {
        let dir = tempfile::TempDir::new().unwrap();
        let tools = indexed_tools(dir.path()).await;

        let related = tools
            .get_related_content("genomics-dl", ObjectType::Publication, 3)
            .await;
        assert!(related.error.is_none());
        assert_eq!(related.source_content.as_ref().unwrap().title, "Genomics and Deep Learning");
        assert!(!related.related.is_empty());
        assert!(related.related.len() <= 3);
        assert!(related
            .related
            .iter()
            .all(|r| !(r.object_type == ObjectType::Publication && r.id == "genomics-dl")));
        for item in &related.related {
            assert!(item.similarity <= 100);
            assert!(item.tags.len() <= 3);
        }
    }

    #[tokio::test]
    async fn test_related_unknown_source() {
        let dir = tempfile::TempDir::new().unwrap();
        let tools = indexed_tools(dir.path()).await;

        let related = tools.get_related_content("missing", ObjectType::Project, 3).await;
        assert!(related.related.is_empty());
        assert!(related.error.is_some());
        assert!(related.source_content.is_none());
    }

    #[tokio::test]
    async fn test_summarize_and_details() {
        let dir = tempfile::TempDir::new().unwrap();
        let tools = indexed_tools(dir.path()).await;

        match tools.summarize_content("genomics-dl", ObjectType::Publication).unwrap() {
            ContentSummary::Publication { key_takeaway, year, .. } => {
                assert_eq!(year, 2024);
                assert!(key_takeaway.starts_with("This 2024 research published in NeurIPS explores "));
                assert!(key_takeaway.ends_with("..."));
            }
            other => panic!("unexpected summary: {:?}", other),
        }

        match tools.summarize_content("cell-atlas", ObjectType::Project).unwrap() {
            ContentSummary::Project { key_takeaway, .. } => {
                assert_eq!(key_takeaway, "Ongoing project using Rust, Tokio, Axum");
            }
            other => panic!("unexpected summary: {:?}", other),
        }

        assert!(tools.summarize_content("cell-atlas", ObjectType::Publication).is_none());

        let details = tools.get_content_details("cell-atlas", ObjectType::Project).unwrap();
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["type"], "project");
        assert_eq!(json["slug"], "cell-atlas");
        assert!(tools.get_content_details("nope", ObjectType::Project).is_none());
    }

    #[tokio::test]
    async fn test_get_graph_and_gallery() {
        let dir = tempfile::TempDir::new().unwrap();
        let tools = indexed_tools(dir.path()).await;

        let graph = tools.get_graph("cell-atlas", 1).await.unwrap();
        assert_eq!(graph.central_node, "cell-atlas");
        assert_eq!(graph.nodes[0].id, "cell-atlas");
        assert_eq!(graph.stats.nodes_in_graph, graph.nodes.len());
        assert!(graph.stats.total_nodes >= graph.nodes.len());

        let empty = tools.get_graph("nonexistent", 1).await.unwrap();
        assert!(empty.nodes.is_empty());

        let gallery = tools.render_gallery(GalleryQuery::default()).await.unwrap();
        assert_eq!(gallery.total_count, 0);
        assert_eq!(gallery.applied_filters.limit, 20);
    }
}
