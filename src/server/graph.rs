//! 그래프 핸들러

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::error::{ApiError, ApiResult};
use super::{non_blank, AppState};
use crate::graph::{GraphData, GraphEdge, GraphNode, GraphStats};

#[derive(Debug, Deserialize)]
pub struct GraphParams {
    depth: Option<String>,
}

fn parse_depth(raw: Option<&str>) -> ApiResult<usize> {
    match non_blank(raw) {
        Some(d) => d
            .parse::<usize>()
            .map_err(|_| ApiError::bad_request(format!("Invalid depth: {}", d))),
        None => Ok(1),
    }
}

/// `GET /api/graph/{id}?depth=`
///
/// 게시된 세대가 없으면 먼저 빌드합니다. 빌드가 실패하면 빈 그래프입니다.
pub async fn node_graph(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<GraphParams>,
) -> ApiResult<Json<GraphData>> {
    let depth = parse_depth(params.depth.as_deref())?;

    match state.tools.graph().node_graph_or_build(&id, depth).await {
        Ok(graph) => Ok(Json(graph)),
        Err(e) => {
            tracing::warn!("Graph query for {} failed: {:#}", id, e);
            Ok(Json(GraphData::default()))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RebuildResponse {
    message: String,
    generation: i64,
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

/// `POST /api/graph/{id}` - 전체 재빌드 후 해당 노드 그래프
pub async fn rebuild(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<RebuildResponse>> {
    let graph = state.tools.graph();
    let summary = graph.rebuild().await?;
    let sub = graph.node_graph(&id, 1).await?;

    Ok(Json(RebuildResponse {
        message: format!(
            "Graph regenerated: {} nodes, {} edges",
            summary.nodes, summary.edges
        ),
        generation: summary.generation,
        nodes: sub.nodes,
        edges: sub.edges,
    }))
}

/// `GET /api/graph`
pub async fn stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<GraphStats>> {
    Ok(Json(state.tools.graph().stats().await?))
}
