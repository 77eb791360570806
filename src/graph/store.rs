//! Graph Store - 세대(generation) 단위 그래프 저장소
//!
//! 재빌드는 새 세대를 통째로 쓰고 `current_generation` 포인터를 같은
//! 트랜잭션 안에서 바꿉니다. 읽는 쪽은 항상 완성된 세대 하나만 봅니다.
//! 현재 세대와 직전 세대만 남기고 나머지는 정리합니다.

use std::collections::{HashSet, VecDeque};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use super::model::{GraphData, GraphEdge, GraphGeneration, GraphNode, GraphStats};
use crate::db::Database;

/// 노드 하나가 확장될 때 가져오는 최대 엣지 수
pub const MAX_EDGES_PER_NODE: usize = 20;
/// 탐색 깊이 상한
pub const MAX_DEPTH: usize = 3;

const CURRENT_GENERATION_KEY: &str = "current_generation";

/// 그래프 저장소
#[derive(Clone)]
pub struct GraphStore {
    db: Database,
}

impl GraphStore {
    /// 공유 DB 위에 저장소 생성 (스키마 초기화 포함)
    pub fn new(db: Database) -> Result<Self> {
        let store = Self { db };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.db.lock()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS graph_generations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                node_count INTEGER NOT NULL,
                edge_count INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS graph_nodes (
                generation INTEGER NOT NULL,
                node_id TEXT NOT NULL,
                type TEXT NOT NULL,
                label TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                PRIMARY KEY (generation, node_id)
            );

            CREATE TABLE IF NOT EXISTS graph_edges (
                generation INTEGER NOT NULL,
                edge_id TEXT NOT NULL,
                src_node_id TEXT NOT NULL,
                dst_node_id TEXT NOT NULL,
                relation TEXT NOT NULL,
                weight REAL NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                PRIMARY KEY (generation, edge_id)
            );

            CREATE INDEX IF NOT EXISTS idx_graph_edges_src ON graph_edges(generation, src_node_id);
            CREATE INDEX IF NOT EXISTS idx_graph_edges_dst ON graph_edges(generation, dst_node_id);

            CREATE TABLE IF NOT EXISTS graph_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )
        .context("Failed to create graph tables")?;

        Ok(())
    }

    // ========================================================================
    // Generations
    // ========================================================================

    /// 새 세대로 게시
    ///
    /// # Returns
    /// 새 세대 ID
    pub fn publish(&self, graph: &GraphData) -> Result<i64> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;

        let previous = read_current(&tx)?;

        tx.execute(
            "INSERT INTO graph_generations (created_at, node_count, edge_count) VALUES (?1, ?2, ?3)",
            params![
                Utc::now().to_rfc3339(),
                graph.nodes.len() as i64,
                graph.edges.len() as i64
            ],
        )?;
        let generation = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO graph_nodes (generation, node_id, type, label, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for node in &graph.nodes {
                stmt.execute(params![
                    generation,
                    node.id,
                    node.node_type.as_str(),
                    node.label,
                    node.metadata.to_string()
                ])
                .with_context(|| format!("Failed to insert node {}", node.id))?;
            }
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO graph_edges
                 (generation, edge_id, src_node_id, dst_node_id, relation, weight, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for edge in &graph.edges {
                stmt.execute(params![
                    generation,
                    edge.id,
                    edge.source,
                    edge.target,
                    edge.relation.as_str(),
                    edge.weight,
                    edge.metadata.to_string()
                ])
                .with_context(|| format!("Failed to insert edge {}", edge.id))?;
            }
        }

        write_current(&tx, generation)?;

        // 현재 + 직전 세대만 유지
        let keep = previous.unwrap_or(generation);
        let pruned = tx.execute(
            "DELETE FROM graph_generations WHERE id NOT IN (?1, ?2)",
            params![generation, keep],
        )?;
        tx.execute(
            "DELETE FROM graph_nodes WHERE generation NOT IN (?1, ?2)",
            params![generation, keep],
        )?;
        tx.execute(
            "DELETE FROM graph_edges WHERE generation NOT IN (?1, ?2)",
            params![generation, keep],
        )?;

        tx.commit()?;

        tracing::info!(
            "Published graph generation {} ({} nodes, {} edges, pruned {})",
            generation,
            graph.nodes.len(),
            graph.edges.len(),
            pruned
        );
        Ok(generation)
    }

    /// 직전 세대로 되돌리기
    ///
    /// # Returns
    /// 되돌린 후의 현재 세대 ID
    pub fn rollback(&self) -> Result<i64> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;

        let current = read_current(&tx)?.context("No graph generation has been published")?;
        let previous: Option<i64> = tx.query_row(
            "SELECT MAX(id) FROM graph_generations WHERE id < ?1",
            params![current],
            |row| row.get(0),
        )?;
        let previous = previous
            .with_context(|| format!("No generation before {} to roll back to", current))?;

        write_current(&tx, previous)?;
        tx.commit()?;

        tracing::info!("Rolled back graph generation {} -> {}", current, previous);
        Ok(previous)
    }

    /// 현재 세대 ID
    pub fn current_generation(&self) -> Result<Option<i64>> {
        let conn = self.db.lock()?;
        read_current(&conn)
    }

    /// 남아 있는 세대 목록 (최신순)
    pub fn generations(&self) -> Result<Vec<GraphGeneration>> {
        let conn = self.db.lock()?;
        let current = read_current(&conn)?;

        let mut stmt = conn.prepare(
            "SELECT id, created_at, node_count, edge_count FROM graph_generations ORDER BY id DESC",
        )?;
        let generations = stmt
            .query_map([], |row| {
                let id: i64 = row.get(0)?;
                Ok(GraphGeneration {
                    id,
                    created_at: row.get(1)?,
                    node_count: row.get::<_, i64>(2)? as usize,
                    edge_count: row.get::<_, i64>(3)? as usize,
                    current: Some(id) == current,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(generations)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// 노드 중심 서브그래프 (BFS)
    ///
    /// 깊이는 1..=3으로 제한되고, 확장되는 노드마다 가중치 높은 엣지
    /// 최대 20개를 가져옵니다. 중심 노드가 항상 첫 번째입니다.
    /// 노드가 없거나 게시된 세대가 없으면 빈 그래프입니다.
    pub fn node_graph(&self, node_id: &str, depth: usize) -> Result<GraphData> {
        let depth = depth.clamp(1, MAX_DEPTH);
        let conn = self.db.lock()?;

        let Some(generation) = read_current(&conn)? else {
            return Ok(GraphData::default());
        };
        let Some(center) = load_node(&conn, generation, node_id)? else {
            return Ok(GraphData::default());
        };

        let mut visited: HashSet<String> = HashSet::from([center.id.clone()]);
        let mut seen_edges: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::from([(center.id.clone(), 0)]);
        let mut graph = GraphData {
            nodes: vec![center],
            edges: Vec::new(),
        };

        while let Some((current, level)) = queue.pop_front() {
            if level >= depth {
                continue;
            }

            for edge in load_edges(&conn, generation, &current)? {
                let neighbor = if edge.source == current {
                    edge.target.clone()
                } else {
                    edge.source.clone()
                };

                if !visited.contains(&neighbor) {
                    let Some(node) = load_node(&conn, generation, &neighbor)? else {
                        tracing::debug!("Edge {} points at missing node {}", edge.id, neighbor);
                        continue;
                    };
                    visited.insert(neighbor.clone());
                    graph.nodes.push(node);
                    queue.push_back((neighbor, level + 1));
                }

                if seen_edges.insert(edge.id.clone()) {
                    graph.edges.push(edge);
                }
            }
        }

        tracing::debug!(
            "Node graph for {} (depth {}): {} nodes, {} edges",
            node_id,
            depth,
            graph.nodes.len(),
            graph.edges.len()
        );
        Ok(graph)
    }

    /// 현재 세대 통계
    pub fn stats(&self) -> Result<GraphStats> {
        let conn = self.db.lock()?;
        let Some(generation) = read_current(&conn)? else {
            return Ok(GraphStats::default());
        };

        let mut stats = GraphStats {
            generation: Some(generation),
            ..Default::default()
        };

        let mut stmt = conn.prepare(
            "SELECT type, COUNT(*) FROM graph_nodes WHERE generation = ?1 GROUP BY type",
        )?;
        for row in stmt.query_map(params![generation], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })? {
            let (node_type, count) = row?;
            stats.total_nodes += count as usize;
            stats.node_types.insert(node_type, count as usize);
        }

        let mut stmt = conn.prepare(
            "SELECT relation, COUNT(*) FROM graph_edges WHERE generation = ?1 GROUP BY relation",
        )?;
        for row in stmt.query_map(params![generation], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })? {
            let (relation, count) = row?;
            stats.total_edges += count as usize;
            stats.relation_types.insert(relation, count as usize);
        }

        Ok(stats)
    }
}

// ============================================================================
// Row helpers
// ============================================================================

fn read_current(conn: &Connection) -> Result<Option<i64>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM graph_meta WHERE key = ?1",
            params![CURRENT_GENERATION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    value
        .map(|v| v.parse::<i64>().context("Corrupt current_generation pointer"))
        .transpose()
}

fn write_current(conn: &Connection, generation: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO graph_meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![CURRENT_GENERATION_KEY, generation.to_string()],
    )?;
    Ok(())
}

fn parse_metadata(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::Object(Default::default()))
}

fn load_node(conn: &Connection, generation: i64, node_id: &str) -> Result<Option<GraphNode>> {
    let row: Option<(String, String, String, String)> = conn
        .query_row(
            "SELECT node_id, type, label, metadata FROM graph_nodes
             WHERE generation = ?1 AND node_id = ?2",
            params![generation, node_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?;

    row.map(|(id, node_type, label, metadata)| {
        Ok::<_, anyhow::Error>(GraphNode {
            id,
            node_type: node_type.parse()?,
            label,
            metadata: parse_metadata(&metadata),
        })
    })
    .transpose()
}

fn load_edges(conn: &Connection, generation: i64, node_id: &str) -> Result<Vec<GraphEdge>> {
    let mut stmt = conn.prepare(
        "SELECT edge_id, src_node_id, dst_node_id, relation, weight, metadata FROM graph_edges
         WHERE generation = ?1 AND (src_node_id = ?2 OR dst_node_id = ?2)
         ORDER BY weight DESC, edge_id ASC
         LIMIT ?3",
    )?;

    let rows = stmt
        .query_map(params![generation, node_id, MAX_EDGES_PER_NODE as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|(id, source, target, relation, weight, metadata)| {
            Ok::<_, anyhow::Error>(GraphEdge {
                id,
                source,
                target,
                relation: relation.parse()?,
                weight,
                metadata: parse_metadata(&metadata),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::fixtures;
    use crate::graph::extract::extract_graph;
    use crate::graph::model::NodeType;
    use tempfile::TempDir;

    fn store() -> GraphStore {
        GraphStore::new(Database::open_in_memory().unwrap()).unwrap()
    }

    fn sample_graph() -> GraphData {
        let catalog = fixtures::catalog(
            vec![fixtures::publication("genomics-dl", "Genomics and Deep Learning", &["ml", "genomics"])],
            vec![fixtures::project("cell-atlas", "Cell Atlas", &["ml"], &["Rust", "Tokio"])],
        );
        extract_graph(&catalog)
    }

    fn ids(graph: &GraphData) -> HashSet<&str> {
        graph.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn test_empty_store() {
        let store = store();

        assert_eq!(store.current_generation().unwrap(), None);
        assert!(store.node_graph("genomics-dl", 1).unwrap().is_empty());
        assert_eq!(store.stats().unwrap(), GraphStats::default());
        assert!(store.rollback().is_err());
    }

    #[test]
    fn test_publish_and_query() {
        let store = store();
        let graph = sample_graph();
        let generation = store.publish(&graph).unwrap();

        assert_eq!(store.current_generation().unwrap(), Some(generation));

        let sub = store.node_graph("genomics-dl", 1).unwrap();
        assert_eq!(sub.nodes[0].id, "genomics-dl");
        assert_eq!(sub.nodes[0].node_type, NodeType::Publication);
        assert_eq!(sub.nodes[0].metadata["year"], 2024);
        assert!(ids(&sub).contains("topic-ml"));
        assert!(ids(&sub).contains("venue-neurips"));
        assert!(ids(&sub).contains("cell-atlas"));
        // 모든 엣지의 양 끝이 결과 노드 안에 있음
        let node_ids = ids(&sub);
        assert!(sub
            .edges
            .iter()
            .all(|e| node_ids.contains(e.source.as_str()) && node_ids.contains(e.target.as_str())));
    }

    #[test]
    fn test_depth_expansion() {
        let store = store();
        store.publish(&sample_graph()).unwrap();

        let shallow = store.node_graph("genomics-dl", 1).unwrap();
        assert!(!ids(&shallow).contains("tech-rust"));

        // genomics-dl → cell-atlas → tech-rust
        let deep = store.node_graph("genomics-dl", 2).unwrap();
        assert!(ids(&deep).contains("tech-rust"));
        assert_eq!(deep.nodes[0].id, "genomics-dl");

        // 깊이 상한
        assert_eq!(
            store.node_graph("genomics-dl", 10).unwrap(),
            store.node_graph("genomics-dl", MAX_DEPTH).unwrap()
        );
        assert_eq!(
            store.node_graph("genomics-dl", 0).unwrap(),
            store.node_graph("genomics-dl", 1).unwrap()
        );
    }

    #[test]
    fn test_missing_node_is_empty() {
        let store = store();
        store.publish(&sample_graph()).unwrap();

        let sub = store.node_graph("nonexistent", 2).unwrap();
        assert!(sub.nodes.is_empty());
        assert!(sub.edges.is_empty());
    }

    #[test]
    fn test_edges_per_node_capped() {
        let tags: Vec<String> = (0..30).map(|i| format!("tag{:02}", i)).collect();
        let tag_refs: Vec<&str> = tags.iter().map(String::as_str).collect();
        let mut publication = fixtures::publication("wide", "Wide", &tag_refs);
        publication.venue = String::new();

        let store = store();
        store
            .publish(&extract_graph(&fixtures::catalog(vec![publication], vec![])))
            .unwrap();

        let sub = store.node_graph("wide", 1).unwrap();
        assert_eq!(sub.edges.len(), MAX_EDGES_PER_NODE);
        assert_eq!(sub.nodes.len(), MAX_EDGES_PER_NODE + 1);
    }

    #[test]
    fn test_edges_ordered_by_weight() {
        let store = store();
        store.publish(&sample_graph()).unwrap();

        let sub = store.node_graph("genomics-dl", 1).unwrap();
        let weights: Vec<f64> = sub.edges.iter().map(|e| e.weight).collect();
        let mut sorted = weights.clone();
        sorted.sort_by(|a, b| b.total_cmp(a));
        assert_eq!(weights, sorted);
    }

    #[test]
    fn test_generation_swap_rollback_and_prune() {
        let store = store();

        let first = store.publish(&sample_graph()).unwrap();
        let mut smaller = sample_graph();
        smaller.nodes.retain(|n| n.id != "cell-atlas");
        smaller.edges.retain(|e| e.source != "cell-atlas" && e.target != "cell-atlas");
        let second = store.publish(&smaller).unwrap();
        assert!(second > first);
        assert_eq!(store.current_generation().unwrap(), Some(second));
        assert!(store.node_graph("cell-atlas", 1).unwrap().is_empty());

        assert_eq!(store.rollback().unwrap(), first);
        assert_eq!(store.current_generation().unwrap(), Some(first));
        assert!(!store.node_graph("cell-atlas", 1).unwrap().is_empty());

        let third = store.publish(&sample_graph()).unwrap();
        let kept: Vec<i64> = store.generations().unwrap().iter().map(|g| g.id).collect();
        assert_eq!(kept, vec![third, first]);
        assert!(store.generations().unwrap()[0].current);

        let orphan_nodes: i64 = store
            .db
            .lock()
            .unwrap()
            .query_row(
                "SELECT COUNT(*) FROM graph_nodes WHERE generation = ?1",
                params![second],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(orphan_nodes, 0);
    }

    #[test]
    fn test_stats() {
        let store = store();
        let graph = sample_graph();
        let generation = store.publish(&graph).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.generation, Some(generation));
        assert_eq!(stats.total_nodes, graph.nodes.len());
        assert_eq!(stats.total_edges, graph.edges.len());
        assert_eq!(stats.node_types.get("publication"), Some(&1));
        assert_eq!(stats.node_types.get("technology"), Some(&2));
        assert_eq!(stats.relation_types.get("related_to"), Some(&1));
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("folio.db");

        let generation = {
            let store = GraphStore::new(Database::open(&path).unwrap()).unwrap();
            store.publish(&sample_graph()).unwrap()
        };

        let store = GraphStore::new(Database::open(&path).unwrap()).unwrap();
        assert_eq!(store.current_generation().unwrap(), Some(generation));
        assert!(!store.node_graph("cell-atlas", 1).unwrap().is_empty());
    }
}
