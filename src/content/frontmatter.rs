//! MDX 프론트매터 분리

use std::sync::LazyLock;

use regex::Regex;

static FRONTMATTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A---\r?\n(.*?)\r?\n---[ \t]*(?:\r?\n|\z)").unwrap()
});

/// 문서를 (프론트매터 YAML, 본문)으로 분리
///
/// 프론트매터가 없으면 `None`을 반환합니다.
pub fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let caps = FRONTMATTER_RE.captures(content)?;
    let yaml = caps.get(1)?.as_str();
    let end = caps.get(0)?.end();
    Some((yaml, content[end..].trim_start_matches(['\r', '\n'])))
}
