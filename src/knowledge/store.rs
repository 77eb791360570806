//! Knowledge Store - rusqlite 기반 청크 저장소 + FTS5 키워드 검색
//!
//! 임베딩 대상 청크를 객체(논문/프로젝트/사진) 단위로 저장하고,
//! FTS5로 키워드 검색을 제공합니다. 벡터는 LanceDB에 따로 저장됩니다.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

use crate::content::ObjectType;
use crate::db::Database;

// ============================================================================
// Types
// ============================================================================

/// FTS5 검색 결과
#[derive(Debug, Clone)]
pub struct FtsSearchResult {
    pub object_type: ObjectType,
    pub object_id: String,
    pub chunk_index: i32,
    pub chunk: String,
    /// 저장된 메타데이터 JSON
    pub metadata: String,
    pub bm25_score: f64,
}

/// 저장소 통계
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub object_count: usize,
    pub chunk_count: usize,
    pub total_chunk_bytes: usize,
    pub db_path: Option<PathBuf>,
}

// ============================================================================
// KnowledgeStore
// ============================================================================

/// Knowledge Store - 청크 저장 및 FTS5 키워드 검색
#[derive(Clone)]
pub struct KnowledgeStore {
    db: Database,
}

impl KnowledgeStore {
    /// 공유 DB 위에 저장소 생성 (스키마 초기화 포함)
    pub fn new(db: Database) -> Result<Self> {
        let store = Self { db };
        store.initialize()?;
        Ok(store)
    }

    /// 스키마 초기화
    fn initialize(&self) -> Result<()> {
        let conn = self.db.lock()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                object_type TEXT NOT NULL,
                object_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                chunk TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                UNIQUE(object_type, object_id, chunk_index)
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_object ON chunks(object_type, object_id);

            CREATE TABLE IF NOT EXISTS index_state (
                object_type TEXT NOT NULL,
                object_id TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                chunk_count INTEGER NOT NULL,
                indexed_at TEXT NOT NULL,
                PRIMARY KEY (object_type, object_id)
            );",
        )
        .context("Failed to create chunks table")?;

        // FTS5 가상 테이블 (키워드 검색용)
        // ref: https://www.sqlite.org/fts5.html
        conn.execute_batch(
            r#"
            CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
                chunk,
                content=chunks,
                content_rowid=id
            );

            CREATE TRIGGER IF NOT EXISTS chunks_ai AFTER INSERT ON chunks BEGIN
                INSERT INTO chunks_fts(rowid, chunk) VALUES (new.id, new.chunk);
            END;

            CREATE TRIGGER IF NOT EXISTS chunks_ad AFTER DELETE ON chunks BEGIN
                INSERT INTO chunks_fts(chunks_fts, rowid, chunk)
                VALUES('delete', old.id, old.chunk);
            END;

            CREATE TRIGGER IF NOT EXISTS chunks_au AFTER UPDATE ON chunks BEGIN
                INSERT INTO chunks_fts(chunks_fts, rowid, chunk)
                VALUES('delete', old.id, old.chunk);
                INSERT INTO chunks_fts(rowid, chunk) VALUES (new.id, new.chunk);
            END;
            "#,
        )
        .context("Failed to create FTS5 index")?;

        tracing::debug!("Knowledge store initialized at {:?}", self.db.path());
        Ok(())
    }

    /// 객체의 청크를 통째로 교체 (삭제 후 삽입, 한 트랜잭션)
    ///
    /// # Returns
    /// 저장된 청크 수
    pub fn replace_object_chunks(
        &self,
        object_type: ObjectType,
        object_id: &str,
        chunks: &[String],
        metadata_json: &str,
    ) -> Result<usize> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        tx.execute(
            "DELETE FROM chunks WHERE object_type = ?1 AND object_id = ?2",
            params![object_type.as_str(), object_id],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO chunks (object_type, object_id, chunk_index, chunk, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for (i, chunk) in chunks.iter().enumerate() {
                stmt.execute(params![
                    object_type.as_str(),
                    object_id,
                    i as i64,
                    chunk,
                    metadata_json,
                    now
                ])?;
            }
        }

        tx.commit().context("Failed to commit chunk replacement")?;
        Ok(chunks.len())
    }

    /// 객체의 청크 삭제
    pub fn delete_object(&self, object_type: ObjectType, object_id: &str) -> Result<usize> {
        let conn = self.db.lock()?;

        let rows = conn.execute(
            "DELETE FROM chunks WHERE object_type = ?1 AND object_id = ?2",
            params![object_type.as_str(), object_id],
        )?;
        conn.execute(
            "DELETE FROM index_state WHERE object_type = ?1 AND object_id = ?2",
            params![object_type.as_str(), object_id],
        )?;

        Ok(rows)
    }

    /// 인덱스에 남아 있는 객체 키 (청크 또는 인덱싱 상태 기준)
    pub fn indexed_objects(&self) -> Result<Vec<(ObjectType, String)>> {
        let conn = self.db.lock()?;

        let mut stmt = conn.prepare(
            "SELECT object_type, object_id FROM index_state
             UNION
             SELECT object_type, object_id FROM chunks
             ORDER BY 1, 2",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(raw_type, object_id)| match raw_type.parse() {
                Ok(object_type) => Some((object_type, object_id)),
                Err(e) => {
                    tracing::debug!("Skipping indexed row {}: {}", object_id, e);
                    None
                }
            })
            .collect())
    }

    /// 객체의 청크 수
    pub fn chunk_count(&self, object_type: ObjectType, object_id: &str) -> Result<usize> {
        let conn = self.db.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE object_type = ?1 AND object_id = ?2",
            params![object_type.as_str(), object_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// FTS5 키워드 검색
    ///
    /// 쿼리 단어를 OR로 묶고 BM25 순으로 정렬합니다.
    /// ref: https://www.sqlite.org/fts5.html#the_bm25_function
    pub fn search_fts(
        &self,
        query: &str,
        object_type: Option<ObjectType>,
        limit: usize,
    ) -> Result<Vec<FtsSearchResult>> {
        let escaped_query = escape_fts5_query(query);
        if escaped_query.is_empty() || limit == 0 {
            return Ok(vec![]);
        }

        let conn = self.db.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT
                c.object_type,
                c.object_id,
                c.chunk_index,
                c.chunk,
                c.metadata,
                bm25(chunks_fts) AS bm25_score
            FROM chunks_fts
            JOIN chunks c ON c.id = chunks_fts.rowid
            WHERE chunks_fts MATCH ?1
              AND (?2 IS NULL OR c.object_type = ?2)
            ORDER BY bm25(chunks_fts), c.id
            LIMIT ?3
            "#,
        )?;

        let type_filter = object_type.map(|t| t.as_str());

        let rows = stmt
            .query_map(params![escaped_query, type_filter, limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i32>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, f64>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let results = rows
            .into_iter()
            .filter_map(|(raw_type, object_id, chunk_index, chunk, metadata, bm25_score)| {
                Some(FtsSearchResult {
                    object_type: raw_type.parse().ok()?,
                    object_id,
                    chunk_index,
                    chunk,
                    metadata,
                    bm25_score,
                })
            })
            .collect();

        Ok(results)
    }

    /// 마지막 인덱싱 때의 콘텐츠 해시
    pub fn content_hash(&self, object_type: ObjectType, object_id: &str) -> Result<Option<String>> {
        let conn = self.db.lock()?;

        let hash = conn
            .query_row(
                "SELECT content_hash FROM index_state WHERE object_type = ?1 AND object_id = ?2",
                params![object_type.as_str(), object_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(hash)
    }

    /// 인덱싱 상태 기록
    pub fn record_index_state(
        &self,
        object_type: ObjectType,
        object_id: &str,
        content_hash: &str,
        chunk_count: usize,
    ) -> Result<()> {
        let conn = self.db.lock()?;

        conn.execute(
            "INSERT INTO index_state (object_type, object_id, content_hash, chunk_count, indexed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(object_type, object_id) DO UPDATE SET
                content_hash = excluded.content_hash,
                chunk_count = excluded.chunk_count,
                indexed_at = excluded.indexed_at",
            params![
                object_type.as_str(),
                object_id,
                content_hash,
                chunk_count as i64,
                Utc::now().to_rfc3339()
            ],
        )?;

        Ok(())
    }

    /// 저장소 통계
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.db.lock()?;

        let (chunk_count, total_bytes): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(LENGTH(chunk)), 0) FROM chunks",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let object_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM (SELECT DISTINCT object_type, object_id FROM chunks)",
            [],
            |row| row.get(0),
        )?;

        Ok(StoreStats {
            object_count: object_count as usize,
            chunk_count: chunk_count as usize,
            total_chunk_bytes: total_bytes as usize,
            db_path: self.db.path().map(|p| p.to_path_buf()),
        })
    }

    /// FTS5 인덱스 리빌드
    ///
    /// 트리거가 동작하지 않은 경우 수동으로 인덱스를 재생성합니다.
    pub fn rebuild_fts_index(&self) -> Result<()> {
        let conn = self.db.lock()?;
        conn.execute("INSERT INTO chunks_fts(chunks_fts) VALUES('rebuild')", [])?;
        tracing::info!("Rebuilt FTS5 index");
        Ok(())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// FTS5 쿼리 이스케이프
///
/// 단어별로 특수 문자를 제거하고 따옴표로 감싼 뒤 OR로 묶습니다.
/// ref: https://www.sqlite.org/fts5.html#full_text_query_syntax
fn escape_fts5_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
                .collect::<String>()
        })
        .filter(|w| w.chars().any(|c| c.is_alphanumeric()))
        .map(|w| format!("\"{}\"", w))
        .collect::<Vec<_>>()
        .join(" OR ")
}

// ============================================================================
// Tests
// ============================================================================
