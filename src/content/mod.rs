//! Content 모듈 - 논문/프로젝트 콘텐츠 타입
//!
//! 콘텐츠는 시작 시 `content/` 디렉토리의 MDX 파일에서 한 번 로드되고
//! 이후 읽기 전용으로 사용됩니다.
//!
//! - `publications/**/*.mdx`: 논문
//! - `projects/**/*.mdx`: 프로젝트
//! - `site.yaml`: 사이트 소유자 프로필 (선택)

mod catalog;
mod frontmatter;

#[cfg(test)]
pub(crate) mod fixtures;

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use catalog::{ContentCatalog, ContentError};
pub use frontmatter::split_frontmatter;

// ============================================================================
// Object Type
// ============================================================================

/// 인덱싱/검색 대상 객체 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Publication,
    Project,
    Photo,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Publication => "publication",
            ObjectType::Project => "project",
            ObjectType::Photo => "photo",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "publication" => Ok(ObjectType::Publication),
            "project" => Ok(ObjectType::Project),
            "photo" => Ok(ObjectType::Photo),
            other => anyhow::bail!("Unknown object type: {}", other),
        }
    }
}

// ============================================================================
// Content Types
// ============================================================================

/// 논문
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Publication {
    /// 파일명에서 계산 (프론트매터 아님)
    #[serde(skip_deserializing)]
    pub slug: String,
    /// `/publications/<slug>`
    #[serde(skip_deserializing)]
    pub url: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub year: i32,
    pub venue: String,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub pdf_url: Option<String>,
    #[serde(default)]
    pub code_url: Option<String>,
    #[serde(default)]
    pub slides_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub featured: bool,
    /// MDX 본문
    #[serde(skip_deserializing)]
    pub body: String,
}

/// 프로젝트 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    Completed,
    InProgress,
    Planned,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Completed => "completed",
            ProjectStatus::InProgress => "in-progress",
            ProjectStatus::Planned => "planned",
        }
    }

    /// 진행 중 여부 (completed/planned 제외)
    pub fn is_active(&self) -> bool {
        matches!(self, ProjectStatus::InProgress)
    }
}

/// 프로젝트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(skip_deserializing)]
    pub slug: String,
    /// `/projects/<slug>`
    #[serde(skip_deserializing)]
    pub url: String,
    pub title: String,
    pub summary: String,
    pub status: ProjectStatus,
    #[serde(default)]
    pub role: Option<String>,
    /// 기술 스택
    #[serde(default)]
    pub stack: Vec<String>,
    #[serde(default)]
    pub repo_url: Option<String>,
    #[serde(default)]
    pub demo_url: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(skip_deserializing)]
    pub body: String,
}

/// 사이트 소유자 프로필 (`site.yaml`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    pub name: String,
    pub title: String,
    pub bio: String,
    pub location: String,
    pub current_role: String,
    pub university: String,
    pub skills: Vec<String>,
    pub research_areas: Vec<String>,
}

/// 카탈로그 항목 참조
#[derive(Debug, Clone, Copy)]
pub enum ContentItem<'a> {
    Publication(&'a Publication),
    Project(&'a Project),
}

impl<'a> ContentItem<'a> {
    pub fn object_type(&self) -> ObjectType {
        match self {
            ContentItem::Publication(_) => ObjectType::Publication,
            ContentItem::Project(_) => ObjectType::Project,
        }
    }

    pub fn slug(&self) -> &'a str {
        match self {
            ContentItem::Publication(p) => &p.slug,
            ContentItem::Project(p) => &p.slug,
        }
    }

    pub fn title(&self) -> &'a str {
        match self {
            ContentItem::Publication(p) => &p.title,
            ContentItem::Project(p) => &p.title,
        }
    }

    pub fn tags(&self) -> &'a [String] {
        match self {
            ContentItem::Publication(p) => &p.tags,
            ContentItem::Project(p) => &p.tags,
        }
    }

    pub fn url(&self) -> &'a str {
        match self {
            ContentItem::Publication(p) => &p.url,
            ContentItem::Project(p) => &p.url,
        }
    }

    /// 검색 결과용 메타데이터
    pub fn metadata(&self) -> ObjectMetadata {
        match self {
            ContentItem::Publication(p) => ObjectMetadata::Publication(PublicationMeta {
                title: p.title.clone(),
                year: Some(p.year),
                venue: Some(p.venue.clone()),
                tags: p.tags.clone(),
                url: p.url.clone(),
                featured: p.featured,
                pdf_url: p.pdf_url.clone(),
                code_url: p.code_url.clone(),
            }),
            ContentItem::Project(p) => ObjectMetadata::Project(ProjectMeta {
                title: p.title.clone(),
                status: Some(p.status),
                stack: p.stack.clone(),
                tags: p.tags.clone(),
                url: p.url.clone(),
                featured: p.featured,
                repo_url: p.repo_url.clone(),
                demo_url: p.demo_url.clone(),
            }),
        }
    }
}

// ============================================================================
// Object Metadata
// ============================================================================

/// 검색 결과에 실리는 객체 메타데이터
///
/// `kind` 필드로 구분되는 종류별 고정 필드 집합입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectMetadata {
    Publication(PublicationMeta),
    Project(ProjectMeta),
    Photo(PhotoMeta),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublicationMeta {
    pub title: String,
    pub year: Option<i32>,
    pub venue: Option<String>,
    pub tags: Vec<String>,
    pub url: String,
    pub featured: bool,
    pub pdf_url: Option<String>,
    pub code_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectMeta {
    pub title: String,
    pub status: Option<ProjectStatus>,
    pub stack: Vec<String>,
    pub tags: Vec<String>,
    pub url: String,
    pub featured: bool,
    pub repo_url: Option<String>,
    pub demo_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhotoMeta {
    pub title: String,
    pub caption: Option<String>,
    pub album: Option<String>,
    pub tags: Vec<String>,
    pub image_url: String,
}

impl ObjectMetadata {
    /// 빈 메타데이터 (저장된 JSON을 읽을 수 없을 때)
    pub fn bare(object_type: ObjectType) -> Self {
        match object_type {
            ObjectType::Publication => ObjectMetadata::Publication(PublicationMeta::default()),
            ObjectType::Project => ObjectMetadata::Project(ProjectMeta::default()),
            ObjectType::Photo => ObjectMetadata::Photo(PhotoMeta::default()),
        }
    }

    /// 저장된 JSON 문자열에서 복원
    pub fn from_json_or_bare(json: &str, object_type: ObjectType) -> Self {
        serde_json::from_str(json).unwrap_or_else(|e| {
            tracing::debug!("Unreadable stored metadata for {}: {}", object_type, e);
            Self::bare(object_type)
        })
    }

    pub fn title(&self) -> &str {
        match self {
            ObjectMetadata::Publication(m) => &m.title,
            ObjectMetadata::Project(m) => &m.title,
            ObjectMetadata::Photo(m) => &m.title,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            ObjectMetadata::Publication(m) => &m.url,
            ObjectMetadata::Project(m) => &m.url,
            ObjectMetadata::Photo(m) => &m.image_url,
        }
    }

    pub fn tags(&self) -> &[String] {
        match self {
            ObjectMetadata::Publication(m) => &m.tags,
            ObjectMetadata::Project(m) => &m.tags,
            ObjectMetadata::Photo(m) => &m.tags,
        }
    }
}
