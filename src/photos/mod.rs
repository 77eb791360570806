//! Photos 모듈 - 사진 업로드/갤러리
//!
//! - blob: 업로드 파일 저장 (로컬 디렉토리)
//! - store: 사진 메타데이터 (SQLite `photos` 테이블)
//!
//! 업로드는 관리자 키가 있어야 합니다.

mod blob;
mod store;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

pub use blob::{BlobStore, LocalBlobStore};
pub use store::PhotoStore;

use crate::content::{ObjectMetadata, ObjectType, PhotoMeta};
use crate::knowledge::IndexDocument;

/// 갤러리 기본 개수
pub const DEFAULT_GALLERY_LIMIT: usize = 20;

// ============================================================================
// Types
// ============================================================================

/// 사진
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: String,
    pub image_url: String,
    pub caption: Option<String>,
    pub album: Option<String>,
    pub tags: Vec<String>,
    pub exif: Option<serde_json::Value>,
    pub created_at: String,
}

/// 새 사진 행
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub image_url: String,
    pub caption: Option<String>,
    pub album: Option<String>,
    pub tags: Vec<String>,
}

/// 갤러리 필터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryQuery {
    pub album: Option<String>,
    pub tags: Vec<String>,
    pub limit: usize,
}

impl Default for GalleryQuery {
    fn default() -> Self {
        Self {
            album: None,
            tags: Vec::new(),
            limit: DEFAULT_GALLERY_LIMIT,
        }
    }
}

/// 업로드 요청 (multipart 필드에서 조립)
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub caption: Option<String>,
    pub album: Option<String>,
    /// 쉼표 구분 원문
    pub tags: Option<String>,
}

// ============================================================================
// Helpers
// ============================================================================

/// 관리자 키 확인 (상수 시간 비교)
///
/// 설정된 키나 요청 키가 없으면 거부합니다.
pub fn verify_admin_key(configured: Option<&str>, provided: Option<&str>) -> bool {
    let (Some(configured), Some(provided)) = (configured, provided) else {
        return false;
    };
    if configured.is_empty() || provided.is_empty() {
        return false;
    }

    let a = configured.as_bytes();
    let b = provided.as_bytes();
    if a.len() != b.len() {
        return false;
    }

    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// 쉼표 구분 태그 파싱 (trim, 소문자, 빈 값 제거)
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Blob 이름 `uploads/<unix-millis>-<random>.<ext>`
pub fn blob_name(file_name: &str, millis: i64) -> String {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string());

    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("uploads/{}-{}.{}", millis, &random[..12], ext)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// 검색 인덱싱용 문서 (캡션이나 태그가 있을 때만)
pub fn photo_document(photo: &Photo) -> Option<IndexDocument> {
    let caption = photo.caption.as_deref().unwrap_or("").trim();
    if caption.is_empty() && photo.tags.is_empty() {
        return None;
    }

    let title = if !caption.is_empty() {
        caption.to_string()
    } else {
        photo.album.clone().unwrap_or_else(|| "Photo".to_string())
    };

    let mut text = title.clone();
    if let Some(album) = &photo.album {
        text.push_str(&format!(". Album: {}", album));
    }
    if !photo.tags.is_empty() {
        text.push_str(&format!(". Tags: {}", photo.tags.join(", ")));
    }
    text.push('.');

    Some(IndexDocument {
        object_type: ObjectType::Photo,
        object_id: photo.id.clone(),
        sections: vec![text],
        metadata: ObjectMetadata::Photo(PhotoMeta {
            title,
            caption: photo.caption.clone(),
            album: photo.album.clone(),
            tags: photo.tags.clone(),
            image_url: photo.image_url.clone(),
        }),
    })
}

// ============================================================================
// PhotoService
// ============================================================================

/// 사진 서비스 - 인증, 업로드, 갤러리
#[derive(Clone)]
pub struct PhotoService {
    store: PhotoStore,
    blobs: Arc<dyn BlobStore>,
    admin_key: Option<String>,
}

impl PhotoService {
    pub fn new(store: PhotoStore, blobs: Arc<dyn BlobStore>, admin_key: Option<String>) -> Self {
        if admin_key.is_none() {
            tracing::warn!("ADMIN_SECRET_KEY not set, photo uploads are disabled");
        }
        Self {
            store,
            blobs,
            admin_key,
        }
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// 관리자 키 확인
    pub fn authorize(&self, key: Option<&str>) -> bool {
        verify_admin_key(self.admin_key.as_deref(), key)
    }

    /// 파일 저장 후 사진 행 추가
    pub async fn upload(&self, request: UploadRequest) -> Result<Photo> {
        let name = blob_name(&request.file_name, Utc::now().timestamp_millis());
        self.blobs
            .put(&name, &request.bytes)
            .await
            .context("Upload failed")?;

        let new_photo = NewPhoto {
            image_url: self.blobs.public_url(&name),
            caption: non_empty(request.caption),
            album: non_empty(request.album),
            tags: request.tags.as_deref().map(parse_tags).unwrap_or_default(),
        };

        let store = self.store.clone();
        let photo = tokio::task::spawn_blocking(move || store.insert(new_photo))
            .await
            .context("Photo insert task failed")?
            .context("Database insert failed")?;

        tracing::info!("Uploaded photo {} ({} bytes) as {}", photo.id, request.bytes.len(), name);
        Ok(photo)
    }

    /// 갤러리 조회
    pub async fn gallery(&self, mut query: GalleryQuery) -> Result<Vec<Photo>> {
        query.tags = query.tags.iter().flat_map(|t| parse_tags(t)).collect();
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.list(&query))
            .await
            .context("Gallery query task failed")?
    }

    pub async fn count(&self) -> Result<usize> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.count())
            .await
            .context("Photo count task failed")?
    }

    pub async fn all(&self) -> Result<Vec<Photo>> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.all())
            .await
            .context("Photo query task failed")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use tempfile::TempDir;

    #[test]
    fn test_verify_admin_key() {
        assert!(verify_admin_key(Some("s3cret"), Some("s3cret")));
        assert!(!verify_admin_key(Some("s3cret"), Some("s3cres")));
        assert!(!verify_admin_key(Some("s3cret"), Some("s3cret!")));
        assert!(!verify_admin_key(Some("s3cret"), None));
        assert!(!verify_admin_key(None, Some("s3cret")));
        assert!(!verify_admin_key(Some(""), Some("")));
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(parse_tags(" Sea, SUNSET ,,  "), vec!["sea", "sunset"]);
        assert!(parse_tags("").is_empty());
    }

    #[test]
    fn test_blob_name() {
        let name = blob_name("Beach.JPG", 1_700_000_000_000);
        assert!(name.starts_with("uploads/1700000000000-"));
        assert!(name.ends_with(".jpg"));

        assert!(blob_name("noext", 1).ends_with(".bin"));
        assert!(blob_name("weird.j/pg", 1).ends_with(".bin"));
        assert_ne!(blob_name("a.png", 1), blob_name("a.png", 1));
    }

    #[test]
    fn test_photo_document() {
        let mut photo = Photo {
            id: "p1".to_string(),
            image_url: "http://x/blobs/uploads/1.jpg".to_string(),
            caption: None,
            album: Some("Trips".to_string()),
            tags: vec![],
            exif: None,
            created_at: "2024-01-01T00:00:00.000Z".to_string(),
        };
        assert!(photo_document(&photo).is_none());

        photo.tags = vec!["sea".to_string()];
        let doc = photo_document(&photo).unwrap();
        assert_eq!(doc.object_type, ObjectType::Photo);
        assert_eq!(doc.sections, vec!["Trips. Album: Trips. Tags: sea."]);
        assert_eq!(doc.metadata.url(), "http://x/blobs/uploads/1.jpg");
    }

    #[tokio::test]
    async fn test_upload_and_gallery() {
        let dir = TempDir::new().unwrap();
        let service = PhotoService::new(
            PhotoStore::new(Database::open_in_memory().unwrap()).unwrap(),
            Arc::new(LocalBlobStore::new(dir.path(), "http://localhost:3000")),
            Some("key".to_string()),
        );

        assert!(service.authorize(Some("key")));
        assert!(!service.authorize(Some("nope")));

        let photo = service
            .upload(UploadRequest {
                file_name: "sunset.png".to_string(),
                bytes: b"png".to_vec(),
                caption: Some("  Sunset over the bay ".to_string()),
                album: Some("".to_string()),
                tags: Some("Sea, Sunset".to_string()),
            })
            .await
            .unwrap();

        assert!(photo.image_url.starts_with("http://localhost:3000/blobs/uploads/"));
        assert_eq!(photo.caption.as_deref(), Some("Sunset over the bay"));
        assert_eq!(photo.album, None);
        assert_eq!(photo.tags, vec!["sea", "sunset"]);

        let blob_path = photo.image_url.trim_start_matches("http://localhost:3000/blobs/");
        assert_eq!(service.blobs().get(blob_path).await.unwrap(), Some(b"png".to_vec()));

        let gallery = service
            .gallery(GalleryQuery {
                tags: vec!["SEA".to_string()],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(gallery, vec![photo]);
        assert_eq!(service.count().await.unwrap(), 1);
    }
}
