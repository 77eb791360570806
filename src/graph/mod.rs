//! Graph 모듈 - 콘텐츠 지식 그래프
//!
//! - ids: 노드/엣지 ID 정규화
//! - extract: 카탈로그 → 노드/엣지 (순수 함수)
//! - store: SQLite 세대별 저장 + 서브그래프 조회
//!
//! `GraphService`는 추출과 저장을 묶어 재빌드/조회/롤백을 제공합니다.

mod extract;
mod ids;
mod model;
mod store;

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

pub use extract::extract_graph;
pub use ids::{edge_id, normalize_key, tech_id, topic_id, venue_id};
pub use model::{GraphData, GraphEdge, GraphGeneration, GraphNode, GraphStats, NodeType, Relation};
pub use store::{GraphStore, MAX_DEPTH, MAX_EDGES_PER_NODE};

use crate::content::ContentCatalog;

/// 재빌드 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebuildSummary {
    pub generation: i64,
    pub nodes: usize,
    pub edges: usize,
}

/// 그래프 서비스
///
/// SQLite 호출은 `spawn_blocking`으로 런타임 밖에서 실행합니다.
#[derive(Clone)]
pub struct GraphService {
    store: GraphStore,
    catalog: Arc<ContentCatalog>,
}

impl GraphService {
    pub fn new(store: GraphStore, catalog: Arc<ContentCatalog>) -> Self {
        Self { store, catalog }
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    /// 카탈로그에서 전체 재빌드 후 새 세대로 게시
    pub async fn rebuild(&self) -> Result<RebuildSummary> {
        let store = self.store.clone();
        let catalog = self.catalog.clone();

        tokio::task::spawn_blocking(move || {
            let graph = extract_graph(&catalog);
            let generation = store.publish(&graph)?;
            Ok(RebuildSummary {
                generation,
                nodes: graph.nodes.len(),
                edges: graph.edges.len(),
            })
        })
        .await
        .context("Graph rebuild task failed")?
    }

    /// 노드 중심 서브그래프
    pub async fn node_graph(&self, node_id: &str, depth: usize) -> Result<GraphData> {
        let store = self.store.clone();
        let node_id = node_id.to_string();

        tokio::task::spawn_blocking(move || store.node_graph(&node_id, depth))
            .await
            .context("Graph query task failed")?
    }

    /// 서브그래프 조회, 게시된 세대가 한 번도 없으면 먼저 빌드
    pub async fn node_graph_or_build(&self, node_id: &str, depth: usize) -> Result<GraphData> {
        if self.current_generation().await?.is_none() {
            tracing::info!("No graph generation published yet, building");
            self.rebuild().await?;
        }
        self.node_graph(node_id, depth).await
    }

    pub async fn current_generation(&self) -> Result<Option<i64>> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.current_generation())
            .await
            .context("Graph query task failed")?
    }

    pub async fn stats(&self) -> Result<GraphStats> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.stats())
            .await
            .context("Graph stats task failed")?
    }

    /// 직전 세대로 롤백
    pub async fn rollback(&self) -> Result<i64> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.rollback())
            .await
            .context("Graph rollback task failed")?
    }

    pub async fn generations(&self) -> Result<Vec<GraphGeneration>> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.generations())
            .await
            .context("Graph query task failed")?
    }
}
