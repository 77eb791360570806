//! 테스트용 가짜 임베더/벡터 저장소 (네트워크 없음)

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use super::vector::{cosine_similarity, SearchResult, VectorEntry, VectorQuery, VectorStore};
use crate::content::ObjectType;
use crate::embedding::EmbeddingProvider;

/// 주제어 기반 임베더
///
/// 각 주제어가 한 축이 되고, 텍스트에 포함된 주제어 축이 1이 됩니다.
/// 어떤 주제어도 없으면 마지막 "기타" 축만 1입니다.
pub(crate) struct TopicEmbedder {
    topics: Vec<String>,
    fail: bool,
}

impl TopicEmbedder {
    pub(crate) fn new(topics: &[&str]) -> Self {
        Self {
            topics: topics.iter().map(|t| t.to_lowercase()).collect(),
            fail: false,
        }
    }

    /// 항상 실패하는 임베더
    pub(crate) fn failing() -> Self {
        Self {
            topics: vec![],
            fail: true,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for TopicEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.fail {
            anyhow::bail!("embedding API unavailable");
        }

        let lower = text.to_lowercase();
        let mut vector: Vec<f32> = self
            .topics
            .iter()
            .map(|t| if lower.contains(t.as_str()) { 1.0 } else { 0.0 })
            .collect();
        let other = if vector.iter().any(|v| *v > 0.0) { 0.0 } else { 1.0 };
        vector.push(other);
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.topics.len() + 1
    }

    fn name(&self) -> &str {
        "topic-embedder"
    }
}

/// 인메모리 벡터 저장소 (전수 코사인 비교)
#[derive(Default)]
pub(crate) struct MemoryVectorStore {
    entries: Mutex<Vec<VectorEntry>>,
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn replace_object(
        &self,
        object_type: ObjectType,
        object_id: &str,
        entries: &[VectorEntry],
    ) -> Result<usize> {
        let mut stored = self.entries.lock().unwrap();
        stored.retain(|e| !(e.object_type == object_type && e.object_id == object_id));
        stored.extend(entries.iter().cloned());
        Ok(entries.len())
    }

    async fn search(&self, query_embedding: &[f32], query: &VectorQuery) -> Result<Vec<SearchResult>> {
        let stored = self.entries.lock().unwrap();

        let mut results: Vec<SearchResult> = stored
            .iter()
            .filter(|e| query.object_type.map_or(true, |t| t == e.object_type))
            .map(|e| SearchResult {
                object_type: e.object_type,
                object_id: e.object_id.clone(),
                chunk_index: e.chunk_index,
                chunk_text: e.chunk_text.clone(),
                metadata: e.metadata.clone(),
                similarity: cosine_similarity(query_embedding, &e.embedding),
            })
            .filter(|r| r.similarity >= query.threshold)
            .collect();

        results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        results.truncate(query.limit);
        Ok(results)
    }

    async fn delete_object(&self, object_type: ObjectType, object_id: &str) -> Result<usize> {
        let mut stored = self.entries.lock().unwrap();
        let before = stored.len();
        stored.retain(|e| !(e.object_type == object_type && e.object_id == object_id));
        Ok(before - stored.len())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.lock().unwrap().len())
    }

    async fn has_embeddings(&self, object_type: ObjectType, object_id: &str) -> Result<bool> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.object_type == object_type && e.object_id == object_id))
    }
}
