//! 그래프 타입

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 노드 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Publication,
    Project,
    Author,
    Venue,
    Topic,
    Technology,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Publication => "publication",
            NodeType::Project => "project",
            NodeType::Author => "author",
            NodeType::Venue => "venue",
            NodeType::Topic => "topic",
            NodeType::Technology => "technology",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "publication" => Ok(NodeType::Publication),
            "project" => Ok(NodeType::Project),
            "author" => Ok(NodeType::Author),
            "venue" => Ok(NodeType::Venue),
            "topic" => Ok(NodeType::Topic),
            "technology" => Ok(NodeType::Technology),
            other => anyhow::bail!("Unknown node type: {}", other),
        }
    }
}

/// 관계 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// 논문 → 게재처
    PublishedIn,
    /// 논문/프로젝트 → 주제
    RelatesTo,
    /// 주제 ↔ 주제 (같은 논문의 태그)
    CoOccursWith,
    /// 프로젝트 → 기술
    UsesTechnology,
    /// 기술 ↔ 기술 (같은 프로젝트의 스택)
    UsedTogether,
    /// 논문 → 프로젝트 (공통 태그)
    RelatedTo,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::PublishedIn => "published_in",
            Relation::RelatesTo => "relates_to",
            Relation::CoOccursWith => "co_occurs_with",
            Relation::UsesTechnology => "uses_technology",
            Relation::UsedTogether => "used_together",
            Relation::RelatedTo => "related_to",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "published_in" => Ok(Relation::PublishedIn),
            "relates_to" => Ok(Relation::RelatesTo),
            "co_occurs_with" => Ok(Relation::CoOccursWith),
            "uses_technology" => Ok(Relation::UsesTechnology),
            "used_together" => Ok(Relation::UsedTogether),
            "related_to" => Ok(Relation::RelatedTo),
            other => anyhow::bail!("Unknown relation: {}", other),
        }
    }
}

/// 그래프 노드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub label: String,
    pub metadata: Value,
}

/// 그래프 엣지
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub relation: Relation,
    pub weight: f64,
    pub metadata: Value,
}

/// 노드 + 엣지 묶음
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphData {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// 현재 세대의 그래프 통계
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub node_types: BTreeMap<String, usize>,
    pub relation_types: BTreeMap<String, usize>,
    /// 게시된 세대가 없으면 None
    pub generation: Option<i64>,
}

/// 게시된 그래프 세대
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphGeneration {
    pub id: i64,
    pub created_at: String,
    pub node_count: usize,
    pub edge_count: usize,
    pub current: bool,
}
