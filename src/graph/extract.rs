//! 콘텐츠 → 그래프 추출
//!
//! 순수 함수입니다. 같은 카탈로그는 항상 같은 노드/엣지 ID 집합을 만듭니다.

use std::collections::HashSet;

use serde_json::{json, Value};

use super::ids::{edge_id, tech_id, topic_id, venue_id};
use super::model::{GraphData, GraphEdge, GraphNode, NodeType, Relation};
use crate::content::{ContentCatalog, Project, Publication};

pub const WEIGHT_PUBLISHED_IN: f64 = 1.0;
pub const WEIGHT_RELATES_TO: f64 = 0.8;
pub const WEIGHT_CO_OCCURS_WITH: f64 = 0.5;
pub const WEIGHT_USES_TECHNOLOGY: f64 = 1.0;
pub const WEIGHT_USED_TOGETHER: f64 = 0.6;
/// 공통 태그 하나당 가중치
pub const WEIGHT_RELATED_TO_PER_TAG: f64 = 0.3;

/// 노드/엣지 누적기 (먼저 들어온 쪽 유지)
#[derive(Default)]
struct GraphBuilder {
    nodes: Vec<GraphNode>,
    node_ids: HashSet<String>,
    edges: Vec<GraphEdge>,
    edge_ids: HashSet<String>,
}

impl GraphBuilder {
    fn add_node(&mut self, id: &str, node_type: NodeType, label: &str, metadata: Value) {
        if self.node_ids.insert(id.to_string()) {
            self.nodes.push(GraphNode {
                id: id.to_string(),
                node_type,
                label: label.trim().to_string(),
                metadata,
            });
        }
    }

    fn add_edge(&mut self, source: &str, target: &str, relation: Relation, weight: f64, metadata: Value) {
        let id = edge_id(source, relation.as_str(), target);
        if self.edge_ids.insert(id.clone()) {
            self.edges.push(GraphEdge {
                id,
                source: source.to_string(),
                target: target.to_string(),
                relation,
                weight,
                metadata,
            });
        }
    }

    /// 서로 다른 ID 쌍마다 엣지 (입력 순서 유지, 자기 자신 제외)
    fn add_pairwise(&mut self, ids: &[String], relation: Relation, weight: f64) {
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                self.add_edge(a, b, relation, weight, json!({}));
            }
        }
    }

    fn finish(self) -> GraphData {
        GraphData {
            nodes: self.nodes,
            edges: self.edges,
        }
    }
}

/// 중복 제거된 ID 목록 (첫 등장 순서)
fn distinct(ids: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

/// 카탈로그에서 그래프 추출
pub fn extract_graph(catalog: &ContentCatalog) -> GraphData {
    let mut builder = GraphBuilder::default();

    for publication in &catalog.publications {
        add_publication(&mut builder, publication);
    }
    for project in &catalog.projects {
        add_project(&mut builder, project);
    }
    for publication in &catalog.publications {
        for project in &catalog.projects {
            let common = common_tags(publication, project);
            if !common.is_empty() {
                builder.add_edge(
                    &publication.slug,
                    &project.slug,
                    Relation::RelatedTo,
                    WEIGHT_RELATED_TO_PER_TAG * common.len() as f64,
                    json!({ "commonTags": common, "type": "cross_content" }),
                );
            }
        }
    }

    let graph = builder.finish();
    tracing::debug!(
        "Extracted graph: {} nodes, {} edges",
        graph.nodes.len(),
        graph.edges.len()
    );
    graph
}

fn add_publication(builder: &mut GraphBuilder, publication: &Publication) {
    builder.add_node(
        &publication.slug,
        NodeType::Publication,
        &publication.title,
        json!({
            "year": publication.year,
            "venue": publication.venue,
            "abstract": publication.abstract_text,
            "tags": publication.tags,
            "featured": publication.featured,
            "url": publication.url,
        }),
    );

    if let Some(venue) = venue_id(&publication.venue) {
        builder.add_node(&venue, NodeType::Venue, &publication.venue, json!({ "type": "conference" }));
        builder.add_edge(
            &publication.slug,
            &venue,
            Relation::PublishedIn,
            WEIGHT_PUBLISHED_IN,
            json!({ "year": publication.year }),
        );
    }

    let mut topics = Vec::new();
    for tag in &publication.tags {
        let Some(topic) = topic_id(tag) else { continue };
        builder.add_node(&topic, NodeType::Topic, tag, json!({ "category": "research_area" }));
        builder.add_edge(&publication.slug, &topic, Relation::RelatesTo, WEIGHT_RELATES_TO, json!({}));
        topics.push(topic);
    }
    builder.add_pairwise(&distinct(topics), Relation::CoOccursWith, WEIGHT_CO_OCCURS_WITH);
}

fn add_project(builder: &mut GraphBuilder, project: &Project) {
    builder.add_node(
        &project.slug,
        NodeType::Project,
        &project.title,
        json!({
            "status": project.status,
            "summary": project.summary,
            "stack": project.stack,
            "tags": project.tags,
            "featured": project.featured,
            "url": project.url,
            "startDate": project.start_date,
            "endDate": project.end_date,
        }),
    );

    let mut techs = Vec::new();
    for tech in &project.stack {
        let Some(id) = tech_id(tech) else { continue };
        builder.add_node(
            &id,
            NodeType::Technology,
            tech,
            json!({ "category": "programming_language_or_framework" }),
        );
        builder.add_edge(&project.slug, &id, Relation::UsesTechnology, WEIGHT_USES_TECHNOLOGY, json!({}));
        techs.push(id);
    }

    for tag in &project.tags {
        let Some(topic) = topic_id(tag) else { continue };
        builder.add_node(&topic, NodeType::Topic, tag, json!({ "category": "project_area" }));
        builder.add_edge(&project.slug, &topic, Relation::RelatesTo, WEIGHT_RELATES_TO, json!({}));
    }

    builder.add_pairwise(&distinct(techs), Relation::UsedTogether, WEIGHT_USED_TOGETHER);
}

/// 논문 태그 중 프로젝트와 겹치는 것
///
/// 프로젝트 태그와 대소문자 무시 일치, 또는 스택 항목에 포함되면 공통 태그입니다.
fn common_tags(publication: &Publication, project: &Project) -> Vec<String> {
    publication
        .tags
        .iter()
        .filter(|tag| !tag.trim().is_empty())
        .filter(|tag| {
            let tag = tag.to_lowercase();
            project.tags.iter().any(|t| t.to_lowercase() == tag)
                || project.stack.iter().any(|s| s.to_lowercase().contains(&tag))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::fixtures;

    fn edge<'a>(graph: &'a GraphData, id: &str) -> Option<&'a GraphEdge> {
        graph.edges.iter().find(|e| e.id == id)
    }

    #[test]
    fn test_publication_topics() {
        let mut publication = fixtures::publication("genomics-dl", "Genomics and Deep Learning", &["ml", "genomics"]);
        publication.venue = String::new();
        let graph = extract_graph(&fixtures::catalog(vec![publication], vec![]));

        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.edges.len(), 3);
        assert_eq!(graph.nodes[0].id, "genomics-dl");

        let relates = edge(&graph, "genomics-dl-relates_to-topic-ml").unwrap();
        assert_eq!(relates.weight, WEIGHT_RELATES_TO);
        let co = edge(&graph, "topic-ml-co_occurs_with-topic-genomics").unwrap();
        assert_eq!(co.weight, WEIGHT_CO_OCCURS_WITH);
        assert_eq!(
            graph.nodes.iter().find(|n| n.id == "topic-ml").unwrap().metadata["category"],
            "research_area"
        );
    }

    #[test]
    fn test_venue_edge() {
        let publication = fixtures::publication("genomics-dl", "Genomics and Deep Learning", &[]);
        let graph = extract_graph(&fixtures::catalog(vec![publication], vec![]));

        let venue = graph.nodes.iter().find(|n| n.id == "venue-neurips").unwrap();
        assert_eq!(venue.node_type, NodeType::Venue);
        assert_eq!(venue.label, "NeurIPS");
        let published = edge(&graph, "genomics-dl-published_in-venue-neurips").unwrap();
        assert_eq!(published.metadata["year"], 2024);
    }

    #[test]
    fn test_co_occurrence_count() {
        let publication = fixtures::publication("p", "P", &["a", "b", "c", "d", "A"]);
        let graph = extract_graph(&fixtures::catalog(vec![publication], vec![]));

        let co = graph
            .edges
            .iter()
            .filter(|e| e.relation == Relation::CoOccursWith)
            .count();
        // 중복 태그 "A"는 topic-a 하나로 합쳐짐: 4개 주제 → 4*3/2
        assert_eq!(co, 6);
        assert!(graph.edges.iter().all(|e| e.source != e.target));
    }

    #[test]
    fn test_project_technologies() {
        let project = fixtures::project("cell-atlas", "Cell Atlas", &["single cell"], &["Rust", "Py Torch", "rust"]);
        let graph = extract_graph(&fixtures::catalog(vec![], vec![project]));

        assert!(edge(&graph, "cell-atlas-uses_technology-tech-rust").is_some());
        assert!(edge(&graph, "cell-atlas-uses_technology-tech-py-torch").is_some());
        assert!(edge(&graph, "cell-atlas-relates_to-topic-single-cell").is_some());
        let together: Vec<_> = graph
            .edges
            .iter()
            .filter(|e| e.relation == Relation::UsedTogether)
            .collect();
        assert_eq!(together.len(), 1);
        assert_eq!(together[0].weight, WEIGHT_USED_TOGETHER);

        let project_node = &graph.nodes[0];
        assert_eq!(project_node.metadata["status"], "in-progress");
        let topic = graph.nodes.iter().find(|n| n.id == "topic-single-cell").unwrap();
        assert_eq!(topic.metadata["category"], "project_area");
    }

    #[test]
    fn test_cross_content_edge() {
        let publication = fixtures::publication("genomics-dl", "Genomics and Deep Learning", &["ML", "genomics", "python"]);
        let project = fixtures::project("cell-atlas", "Cell Atlas", &["ml"], &["Python 3"]);
        let graph = extract_graph(&fixtures::catalog(vec![publication], vec![project]));

        let related = edge(&graph, "genomics-dl-related_to-cell-atlas").unwrap();
        assert!((related.weight - 0.6).abs() < 1e-9);
        assert_eq!(related.metadata["commonTags"], json!(["ML", "python"]));
        assert_eq!(related.metadata["type"], "cross_content");
    }

    #[test]
    fn test_no_cross_edge_without_common_tags() {
        let publication = fixtures::publication("p", "P", &["genomics"]);
        let project = fixtures::project("q", "Q", &["web"], &["React"]);
        let graph = extract_graph(&fixtures::catalog(vec![publication], vec![project]));

        assert!(graph.edges.iter().all(|e| e.relation != Relation::RelatedTo));
    }

    #[test]
    fn test_first_emission_wins() {
        let publication = fixtures::publication("p", "P", &["Machine Learning"]);
        let project = fixtures::project("q", "Q", &["machine  learning"], &[]);
        let graph = extract_graph(&fixtures::catalog(vec![publication], vec![project]));

        let topics: Vec<_> = graph
            .nodes
            .iter()
            .filter(|n| n.node_type == NodeType::Topic)
            .collect();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].label, "Machine Learning");
        assert_eq!(topics[0].metadata["category"], "research_area");
    }

    #[test]
    fn test_blank_tags_skipped() {
        let publication = fixtures::publication("p", "P", &["  ", ""]);
        let graph = extract_graph(&fixtures::catalog(vec![publication], vec![]));

        assert!(graph.nodes.iter().all(|n| n.node_type != NodeType::Topic));
    }

    #[test]
    fn test_idempotent() {
        let catalog = fixtures::catalog(
            vec![fixtures::publication("p", "P", &["ml", "genomics"])],
            vec![fixtures::project("q", "Q", &["ml"], &["Rust", "Tokio"])],
        );

        assert_eq!(extract_graph(&catalog), extract_graph(&catalog));
    }
}
