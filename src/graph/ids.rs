//! 그래프 노드/엣지 ID 규칙
//!
//! 모든 파생 ID는 `normalize_key` 하나를 거칩니다.
//! - 앞뒤 공백 제거
//! - 유니코드 소문자화
//! - 연속 공백 → `-` 하나
//!
//! 결과가 빈 문자열이면 노드를 만들지 않습니다.

/// 키 정규화
pub fn normalize_key(raw: &str) -> String {
    raw.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

fn prefixed(prefix: &str, raw: &str) -> Option<String> {
    let key = normalize_key(raw);
    if key.is_empty() {
        None
    } else {
        Some(format!("{}-{}", prefix, key))
    }
}

/// 주제 노드 ID (`topic-<key>`)
pub fn topic_id(tag: &str) -> Option<String> {
    prefixed("topic", tag)
}

/// 게재처 노드 ID (`venue-<key>`)
pub fn venue_id(venue: &str) -> Option<String> {
    prefixed("venue", venue)
}

/// 기술 노드 ID (`tech-<key>`)
pub fn tech_id(tech: &str) -> Option<String> {
    prefixed("tech", tech)
}

/// 엣지 ID (`<source>-<relation>-<target>`)
pub fn edge_id(source: &str, relation: &str, target: &str) -> String {
    format!("{}-{}-{}", source, relation, target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("  Deep   Learning "), "deep-learning");
        assert_eq!(normalize_key("Machine\tLearning\nSystems"), "machine-learning-systems");
        assert_eq!(normalize_key("single-cell"), "single-cell");
        assert_eq!(normalize_key("   "), "");
    }

    #[test]
    fn test_normalize_unicode() {
        assert_eq!(normalize_key("ÜBER Daten"), "über-daten");
        assert_eq!(normalize_key("유전체 분석"), "유전체-분석");
    }

    #[test]
    fn test_prefixed_ids() {
        assert_eq!(topic_id("ML").as_deref(), Some("topic-ml"));
        assert_eq!(venue_id("NeurIPS 2024").as_deref(), Some("venue-neurips-2024"));
        assert_eq!(tech_id("Py Torch").as_deref(), Some("tech-py-torch"));
        assert_eq!(topic_id(" "), None);
        assert_eq!(venue_id(""), None);
    }

    #[test]
    fn test_edge_id() {
        assert_eq!(
            edge_id("genomics-dl", "relates_to", "topic-ml"),
            "genomics-dl-relates_to-topic-ml"
        );
    }
}
