//! 인덱싱 문서 - 카탈로그 항목을 임베딩 대상 섹션으로 변환

use sha2::{Digest, Sha256};

use crate::content::{ContentCatalog, ContentItem, ObjectMetadata, ObjectType};

/// 인덱싱 대상 문서
///
/// 섹션마다 따로 청킹되고, 청크 인덱스는 섹션을 가로질러 이어집니다.
#[derive(Debug, Clone)]
pub struct IndexDocument {
    pub object_type: ObjectType,
    pub object_id: String,
    pub sections: Vec<String>,
    pub metadata: ObjectMetadata,
}

impl IndexDocument {
    /// 카탈로그 항목에서 생성
    ///
    /// 1. 요약 섹션 (제목, 초록/요약, 게재처/상태, 기술, 태그)
    /// 2. 본문 섹션 (있을 때만)
    pub fn from_item(item: ContentItem<'_>) -> Self {
        let (summary, body) = match item {
            ContentItem::Publication(p) => (
                format!(
                    "{}. {}. Published in {} ({}). Tags: {}.",
                    p.title,
                    p.abstract_text,
                    p.venue,
                    p.year,
                    p.tags.join(", ")
                ),
                p.body.as_str(),
            ),
            ContentItem::Project(p) => (
                format!(
                    "{}. {}. Status: {}. Technologies: {}. Tags: {}.",
                    p.title,
                    p.summary,
                    p.status.as_str(),
                    p.stack.join(", "),
                    p.tags.join(", ")
                ),
                p.body.as_str(),
            ),
        };

        let mut sections = vec![summary];
        if !body.trim().is_empty() {
            sections.push(body.to_string());
        }

        Self {
            object_type: item.object_type(),
            object_id: item.slug().to_string(),
            sections,
            metadata: item.metadata(),
        }
    }

    /// 콘텐츠 해시 (SHA-256 hex)
    ///
    /// 임베딩 모델이 바뀌어도 재인덱싱되도록 모델 이름을 포함합니다.
    pub fn content_hash(&self, embedder_name: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.object_type.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(self.object_id.as_bytes());
        for section in &self.sections {
            hasher.update([0]);
            hasher.update(section.as_bytes());
        }
        hasher.update([0]);
        hasher.update(serde_json::to_string(&self.metadata).unwrap_or_default().as_bytes());
        hasher.update([0]);
        hasher.update(embedder_name.as_bytes());

        format!("{:x}", hasher.finalize())
    }
}

/// 카탈로그 전체를 인덱싱 문서로 (논문 먼저)
pub fn catalog_documents(catalog: &ContentCatalog) -> Vec<IndexDocument> {
    catalog.items().map(IndexDocument::from_item).collect()
}
