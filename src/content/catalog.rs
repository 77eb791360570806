//! 콘텐츠 카탈로그 - MDX 파일 로더

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;
use walkdir::WalkDir;

use super::frontmatter::split_frontmatter;
use super::{ContentItem, ObjectType, Project, Publication, SiteProfile};

/// 콘텐츠 로드 에러
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing frontmatter in {0}")]
    MissingFrontmatter(PathBuf),

    #[error("Invalid frontmatter in {path}: {source}")]
    Frontmatter {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Duplicate {object_type} slug '{slug}' ({path})")]
    DuplicateSlug {
        object_type: ObjectType,
        slug: String,
        path: PathBuf,
    },
}

/// 읽기 전용 콘텐츠 카탈로그
#[derive(Debug, Clone, Default)]
pub struct ContentCatalog {
    pub publications: Vec<Publication>,
    pub projects: Vec<Project>,
    pub site: SiteProfile,
}

impl ContentCatalog {
    /// 콘텐츠 디렉토리에서 로드
    ///
    /// 하위 디렉토리가 없으면 해당 종류는 비어 있는 것으로 취급합니다.
    /// 필수 필드가 빠진 파일은 에러입니다.
    pub fn load(dir: &Path) -> Result<Self, ContentError> {
        let mut publications: Vec<Publication> =
            load_documents::<Publication>(&dir.join("publications"), ObjectType::Publication)?
                .into_iter()
                .map(|(slug, mut publication, body)| {
                    publication.url = format!("/publications/{}", slug);
                    publication.slug = slug;
                    publication.body = body;
                    publication
                })
                .collect();

        let mut projects: Vec<Project> = load_documents::<Project>(&dir.join("projects"), ObjectType::Project)?
            .into_iter()
            .map(|(slug, mut project, body)| {
                project.url = format!("/projects/{}", slug);
                project.slug = slug;
                project.body = body;
                project
            })
            .collect();

        publications.sort_by(|a, b| a.slug.cmp(&b.slug));
        projects.sort_by(|a, b| a.slug.cmp(&b.slug));

        let site_path = dir.join("site.yaml");
        let site = if site_path.exists() {
            let raw = std::fs::read_to_string(&site_path).map_err(|source| ContentError::Io {
                path: site_path.clone(),
                source,
            })?;
            serde_yaml::from_str(&raw).map_err(|source| ContentError::Frontmatter {
                path: site_path.clone(),
                source,
            })?
        } else {
            SiteProfile::default()
        };

        tracing::info!(
            "Loaded content catalog from {:?} ({} publications, {} projects)",
            dir,
            publications.len(),
            projects.len()
        );

        Ok(Self {
            publications,
            projects,
            site,
        })
    }

    /// 메모리에서 직접 생성
    pub fn from_parts(
        publications: Vec<Publication>,
        projects: Vec<Project>,
        site: SiteProfile,
    ) -> Self {
        Self {
            publications,
            projects,
            site,
        }
    }

    pub fn publication(&self, slug: &str) -> Option<&Publication> {
        self.publications.iter().find(|p| p.slug == slug)
    }

    pub fn project(&self, slug: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.slug == slug)
    }

    /// 종류 + 슬러그로 조회 (사진은 카탈로그에 없음)
    pub fn find(&self, object_type: ObjectType, slug: &str) -> Option<ContentItem<'_>> {
        match object_type {
            ObjectType::Publication => self.publication(slug).map(ContentItem::Publication),
            ObjectType::Project => self.project(slug).map(ContentItem::Project),
            ObjectType::Photo => None,
        }
    }

    /// 모든 항목 (논문 먼저)
    pub fn items(&self) -> impl Iterator<Item = ContentItem<'_>> {
        self.publications
            .iter()
            .map(ContentItem::Publication)
            .chain(self.projects.iter().map(ContentItem::Project))
    }

    pub fn is_empty(&self) -> bool {
        self.publications.is_empty() && self.projects.is_empty()
    }
}

/// 디렉토리의 MDX 문서를 (slug, frontmatter, body)로 로드
fn load_documents<T: DeserializeOwned>(
    dir: &Path,
    object_type: ObjectType,
) -> Result<Vec<(String, T, String)>, ContentError> {
    if !dir.is_dir() {
        tracing::debug!("Content directory not found, skipping: {:?}", dir);
        return Ok(vec![]);
    }

    let mut documents = Vec::new();
    let mut seen = HashSet::new();

    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let is_mdx = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext.to_lowercase().as_str(), "mdx" | "md"))
            .unwrap_or(false);
        if !is_mdx {
            continue;
        }

        let slug = match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => stem.to_string(),
            None => continue,
        };

        let raw = std::fs::read_to_string(path).map_err(|source| ContentError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let (yaml, body) = split_frontmatter(&raw)
            .ok_or_else(|| ContentError::MissingFrontmatter(path.to_path_buf()))?;

        let parsed: T = serde_yaml::from_str(yaml).map_err(|source| ContentError::Frontmatter {
            path: path.to_path_buf(),
            source,
        })?;

        if !seen.insert(slug.clone()) {
            return Err(ContentError::DuplicateSlug {
                object_type,
                slug,
                path: path.to_path_buf(),
            });
        }

        documents.push((slug, parsed, body.to_string()));
    }

    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ProjectStatus;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_load_catalog() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "publications/genomics-dl.mdx",
            "---\ntitle: Genomics and Deep Learning\nabstract: We study genomes.\nyear: 2024\nvenue: NeurIPS\ntags: [ml, genomics]\npdfUrl: /papers/g.pdf\n---\n\nBody text.",
        );
        write(
            dir.path(),
            "projects/2023/cell-atlas.mdx",
            "---\ntitle: Cell Atlas\nsummary: Single-cell browser.\nstatus: in-progress\nstack: [Rust, PyTorch]\nstartDate: 2023-01-15\n---\nProject body.",
        );
        write(
            dir.path(),
            "site.yaml",
            "name: Test Owner\nskills: [R, Python]\n",
        );

        let catalog = ContentCatalog::load(dir.path()).unwrap();
        assert_eq!(catalog.publications.len(), 1);
        assert_eq!(catalog.projects.len(), 1);

        let publication = catalog.publication("genomics-dl").unwrap();
        assert_eq!(publication.url, "/publications/genomics-dl");
        assert_eq!(publication.tags, vec!["ml", "genomics"]);
        assert_eq!(publication.pdf_url.as_deref(), Some("/papers/g.pdf"));
        assert_eq!(publication.body, "Body text.");
        assert!(!publication.featured);

        let project = catalog.project("cell-atlas").unwrap();
        assert_eq!(project.status, ProjectStatus::InProgress);
        assert_eq!(project.url, "/projects/cell-atlas");
        assert_eq!(
            project.start_date,
            chrono::NaiveDate::from_ymd_opt(2023, 1, 15)
        );

        assert_eq!(catalog.site.name, "Test Owner");
        assert_eq!(catalog.items().count(), 2);
    }

    #[test]
    fn test_missing_required_field() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "publications/broken.mdx",
            "---\ntitle: No venue\nabstract: x\nyear: 2020\n---\n",
        );

        let err = ContentCatalog::load(dir.path()).unwrap_err();
        assert!(matches!(err, ContentError::Frontmatter { .. }));
        assert!(err.to_string().contains("broken.mdx"));
    }

    #[test]
    fn test_duplicate_slug() {
        let dir = TempDir::new().unwrap();
        let doc = "---\ntitle: A\nsummary: s\nstatus: planned\n---\n";
        write(dir.path(), "projects/a/same.mdx", doc);
        write(dir.path(), "projects/b/same.mdx", doc);

        let err = ContentCatalog::load(dir.path()).unwrap_err();
        assert!(matches!(err, ContentError::DuplicateSlug { .. }));
    }

    #[test]
    fn test_empty_dir() {
        let dir = TempDir::new().unwrap();
        let catalog = ContentCatalog::load(dir.path()).unwrap();
        assert!(catalog.is_empty());
        assert!(catalog.find(ObjectType::Photo, "x").is_none());
    }
}
