//! LanceDB Vector Store - 고성능 벡터 검색
//!
//! 청크 임베딩을 객체 종류/ID와 함께 저장하고 코사인 거리로 검색합니다.
//! ref: https://lancedb.github.io/lancedb/

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::DistanceType;

use super::vector::{distance_to_similarity, SearchResult, VectorEntry, VectorQuery, VectorStore};
use crate::content::ObjectType;

/// 벡터 테이블 이름
const TABLE_NAME: &str = "embeddings";

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소 구현
///
/// 임베딩 차원은 열 때 고정됩니다 (FixedSizeList 컬럼).
pub struct LanceVectorStore {
    db: Connection,
    dimension: i32,
}

impl LanceVectorStore {
    /// LanceDB 저장소 열기
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    /// * `dimension` - 임베딩 차원
    pub async fn open(path: &Path, dimension: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create LanceDB directory")?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        let dimension = i32::try_from(dimension).context("Embedding dimension out of range")?;

        Ok(Self { db, dimension })
    }

    /// 벡터 테이블 스키마 생성
    fn create_schema(&self) -> Schema {
        Schema::new(vec![
            Field::new("object_type", DataType::Utf8, false),
            Field::new("object_id", DataType::Utf8, false),
            Field::new("chunk_index", DataType::Int32, false),
            Field::new("chunk_text", DataType::Utf8, false),
            Field::new("metadata", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimension,
                ),
                false,
            ),
        ])
    }

    /// 엔트리들을 Arrow RecordBatch로 변환
    fn entries_to_batch(&self, entries: &[VectorEntry]) -> Result<RecordBatch> {
        if entries.is_empty() {
            anyhow::bail!("Cannot create batch from empty entries");
        }

        if let Some(bad) = entries
            .iter()
            .find(|e| e.embedding.len() != self.dimension as usize)
        {
            anyhow::bail!(
                "Embedding dimension mismatch for {}/{}: expected {}, got {}",
                bad.object_type,
                bad.object_id,
                self.dimension,
                bad.embedding.len()
            );
        }

        let object_types: Vec<&str> = entries.iter().map(|e| e.object_type.as_str()).collect();
        let object_ids: Vec<&str> = entries.iter().map(|e| e.object_id.as_str()).collect();
        let chunk_indices: Vec<i32> = entries.iter().map(|e| e.chunk_index).collect();
        let chunk_texts: Vec<&str> = entries.iter().map(|e| e.chunk_text.as_str()).collect();
        let metadata: Vec<&str> = entries.iter().map(|e| e.metadata.as_str()).collect();

        let embeddings_flat: Vec<f32> = entries
            .iter()
            .flat_map(|e| e.embedding.iter().copied())
            .collect();

        let values = Float32Array::from(embeddings_flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings_list = FixedSizeListArray::try_new(
            field,
            self.dimension,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create embedding array")?;

        let batch = RecordBatch::try_new(
            Arc::new(self.create_schema()),
            vec![
                Arc::new(StringArray::from(object_types)),
                Arc::new(StringArray::from(object_ids)),
                Arc::new(Int32Array::from(chunk_indices)),
                Arc::new(StringArray::from(chunk_texts)),
                Arc::new(StringArray::from(metadata)),
                Arc::new(embeddings_list),
            ],
        )
        .context("Failed to create RecordBatch")?;

        Ok(batch)
    }

    /// 테이블 존재 여부 확인
    async fn table_exists(&self) -> bool {
        self.db
            .table_names()
            .execute()
            .await
            .map(|names| names.iter().any(|n| n == TABLE_NAME))
            .unwrap_or(false)
    }

    async fn open_table(&self) -> Result<lancedb::table::Table> {
        self.db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open vector table")
    }
}

/// 객체 필터 (작은따옴표 이스케이프)
fn object_filter(object_type: ObjectType, object_id: &str) -> String {
    format!(
        "object_type = '{}' AND object_id = '{}'",
        object_type.as_str(),
        object_id.replace('\'', "''")
    )
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow::anyhow!("Missing {} column", name))
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn replace_object(
        &self,
        object_type: ObjectType,
        object_id: &str,
        entries: &[VectorEntry],
    ) -> Result<usize> {
        if self.table_exists().await {
            let table = self.open_table().await?;
            table
                .delete(&object_filter(object_type, object_id))
                .await
                .context("Failed to delete previous vectors")?;

            if entries.is_empty() {
                return Ok(0);
            }

            let batch = self.entries_to_batch(entries)?;
            let schema = batch.schema();
            let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
            table
                .add(batches)
                .execute()
                .await
                .context("Failed to add vectors to table")?;
        } else {
            if entries.is_empty() {
                return Ok(0);
            }

            let batch = self.entries_to_batch(entries)?;
            let schema = batch.schema();
            let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
            self.db
                .create_table(TABLE_NAME, batches)
                .execute()
                .await
                .context("Failed to create vector table")?;
        }

        Ok(entries.len())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        query: &VectorQuery,
    ) -> Result<Vec<SearchResult>> {
        if query.limit == 0 || !self.table_exists().await {
            return Ok(vec![]);
        }

        let table = self.open_table().await?;

        let mut vector_query = table
            .vector_search(query_embedding.to_vec())
            .context("Failed to create vector search")?
            .distance_type(DistanceType::Cosine)
            .limit(query.limit);

        if let Some(object_type) = query.object_type {
            vector_query = vector_query.only_if(format!("object_type = '{}'", object_type.as_str()));
        }

        let batches: Vec<RecordBatch> = vector_query
            .execute()
            .await
            .context("Failed to execute vector search")?
            .try_collect()
            .await?;

        let mut search_results = Vec::new();

        for batch in batches {
            let object_types = string_column(&batch, "object_type")?;
            let object_ids = string_column(&batch, "object_id")?;
            let chunk_texts = string_column(&batch, "chunk_text")?;
            let metadata = string_column(&batch, "metadata")?;

            let chunk_indices = batch
                .column_by_name("chunk_index")
                .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing chunk_index column"))?;

            // _distance 컬럼 (LanceDB가 자동 추가)
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing _distance column"))?;

            for i in 0..batch.num_rows() {
                let similarity = distance_to_similarity(distances.value(i));
                if similarity < query.threshold {
                    continue;
                }

                let object_type: ObjectType = match object_types.value(i).parse() {
                    Ok(t) => t,
                    Err(e) => {
                        tracing::debug!("Skipping vector row: {}", e);
                        continue;
                    }
                };

                search_results.push(SearchResult {
                    object_type,
                    object_id: object_ids.value(i).to_string(),
                    chunk_index: chunk_indices.value(i),
                    chunk_text: chunk_texts.value(i).to_string(),
                    metadata: metadata.value(i).to_string(),
                    similarity,
                });
            }
        }

        search_results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        search_results.truncate(query.limit);

        Ok(search_results)
    }

    async fn delete_object(&self, object_type: ObjectType, object_id: &str) -> Result<usize> {
        if !self.table_exists().await {
            return Ok(0);
        }

        let table = self.open_table().await?;
        let filter = object_filter(object_type, object_id);

        let before_count = table
            .count_rows(Some(filter.clone()))
            .await
            .context("Failed to count rows")?;
        table
            .delete(&filter)
            .await
            .context("Failed to delete vectors")?;

        Ok(before_count)
    }

    async fn count(&self) -> Result<usize> {
        if !self.table_exists().await {
            return Ok(0);
        }

        let table = self.open_table().await?;
        let count = table.count_rows(None).await.context("Failed to count rows")?;
        Ok(count)
    }

    async fn has_embeddings(&self, object_type: ObjectType, object_id: &str) -> Result<bool> {
        if !self.table_exists().await {
            return Ok(false);
        }

        let table = self.open_table().await?;
        let count = table
            .count_rows(Some(object_filter(object_type, object_id)))
            .await
            .context("Failed to count rows for object")?;

        Ok(count > 0)
    }
}

// ============================================================================
// Tests
// ============================================================================
