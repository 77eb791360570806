//! Photo Store - 사진 메타데이터 (SQLite)

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{GalleryQuery, NewPhoto, Photo};
use crate::db::Database;

/// 사진 메타데이터 저장소
#[derive(Clone)]
pub struct PhotoStore {
    db: Database,
}

impl PhotoStore {
    pub fn new(db: Database) -> Result<Self> {
        {
            let conn = db.lock()?;
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS photos (
                    id TEXT PRIMARY KEY,
                    image_url TEXT NOT NULL,
                    caption TEXT,
                    album TEXT,
                    tags TEXT NOT NULL DEFAULT '[]',
                    exif TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_photos_created ON photos(created_at);
                CREATE INDEX IF NOT EXISTS idx_photos_album ON photos(album);",
            )
            .context("Failed to create photos table")?;
        }
        Ok(Self { db })
    }

    /// 사진 행 추가 (exif는 항상 null)
    pub fn insert(&self, photo: NewPhoto) -> Result<Photo> {
        let photo = Photo {
            id: uuid::Uuid::new_v4().to_string(),
            image_url: photo.image_url,
            caption: photo.caption,
            album: photo.album,
            tags: photo.tags,
            exif: None,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };

        let conn = self.db.lock()?;
        conn.execute(
            "INSERT INTO photos (id, image_url, caption, album, tags, exif, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6)",
            params![
                photo.id,
                photo.image_url,
                photo.caption,
                photo.album,
                serde_json::to_string(&photo.tags)?,
                photo.created_at
            ],
        )
        .context("Failed to insert photo")?;

        Ok(photo)
    }

    pub fn get(&self, id: &str) -> Result<Option<Photo>> {
        let conn = self.db.lock()?;
        let photo = conn
            .query_row(
                "SELECT id, image_url, caption, album, tags, exif, created_at FROM photos WHERE id = ?1",
                params![id],
                photo_from_row,
            )
            .optional()?;
        Ok(photo)
    }

    /// 갤러리 조회 (최신순)
    ///
    /// 태그 필터는 주어진 태그를 모두 가진 사진만 남깁니다.
    pub fn list(&self, query: &GalleryQuery) -> Result<Vec<Photo>> {
        let conn = self.db.lock()?;
        let tags = serde_json::to_string(&query.tags)?;

        let mut stmt = conn.prepare(
            "SELECT id, image_url, caption, album, tags, exif, created_at FROM photos
             WHERE (?1 IS NULL OR album = ?1)
               AND NOT EXISTS (
                   SELECT 1 FROM json_each(?2) wanted
                   WHERE wanted.value NOT IN (SELECT value FROM json_each(photos.tags))
               )
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?3",
        )?;

        let photos = stmt
            .query_map(params![query.album, tags, query.limit as i64], photo_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(photos)
    }

    /// 전체 사진 (인덱싱용)
    pub fn all(&self) -> Result<Vec<Photo>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, image_url, caption, album, tags, exif, created_at FROM photos
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let photos = stmt
            .query_map([], photo_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.db.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM photos", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn photo_from_row(row: &Row<'_>) -> rusqlite::Result<Photo> {
    let tags: String = row.get(4)?;
    let exif: Option<String> = row.get(5)?;

    Ok(Photo {
        id: row.get(0)?,
        image_url: row.get(1)?,
        caption: row.get(2)?,
        album: row.get(3)?,
        tags: serde_json::from_str(&tags).unwrap_or_default(),
        exif: exif.and_then(|e| serde_json::from_str(&e).ok()),
        created_at: row.get(6)?,
    })
}
