//! Blob 저장소 - 업로드 파일 보관
//!
//! 로컬 디렉토리 구현 하나뿐이지만 trait 뒤에 두어 교체할 수 있게 합니다.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

/// Blob 저장소 trait
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// 상대 경로에 바이트 저장
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()>;

    /// 저장된 바이트 읽기 (없으면 None)
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// 공개 URL
    fn public_url(&self, path: &str) -> String;
}

/// 로컬 디렉토리 Blob 저장소
///
/// 공개 URL은 `<base_url>/blobs/<path>` 입니다.
pub struct LocalBlobStore {
    root: PathBuf,
    base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 상대 경로 검증 후 절대 경로로
    ///
    /// `..`, 절대 경로는 거부합니다.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            anyhow::bail!("Invalid blob path: {}", path);
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create blob directory")?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .with_context(|| format!("Failed to write blob {:?}", target))?;

        tracing::debug!("Stored blob {} ({} bytes)", path, bytes.len());
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let target = self.resolve(path)?;
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read blob {:?}", target)),
        }
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/blobs/{}", self.base_url, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_and_get() {
        let dir = TempDir::new().unwrap();
        let blobs = LocalBlobStore::new(dir.path(), "http://localhost:3000/");

        blobs.put("uploads/a.jpg", b"jpeg").await.unwrap();
        assert_eq!(blobs.get("uploads/a.jpg").await.unwrap(), Some(b"jpeg".to_vec()));
        assert_eq!(blobs.get("uploads/missing.jpg").await.unwrap(), None);
        assert!(dir.path().join("uploads").join("a.jpg").exists());
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let dir = TempDir::new().unwrap();
        let blobs = LocalBlobStore::new(dir.path(), "http://localhost:3000");

        assert!(blobs.put("../outside.jpg", b"x").await.is_err());
        assert!(blobs.put("/etc/passwd", b"x").await.is_err());
        assert!(blobs.get("").await.is_err());
    }

    #[test]
    fn test_public_url() {
        let blobs = LocalBlobStore::new("/tmp/blobs", "https://example.org/");
        assert_eq!(
            blobs.public_url("uploads/1-abc.png"),
            "https://example.org/blobs/uploads/1-abc.png"
        );
    }
}
