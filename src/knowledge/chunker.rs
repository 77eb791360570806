//! Text Chunking Module
//!
//! 문장 경계(`.`, `!`, `?`) 기반 텍스트 분할을 제공합니다.
//! 문장은 `". "`로 다시 이어 붙이고, 최대 크기를 넘으면 새 청크를 시작합니다.

use std::sync::LazyLock;

use regex::Regex;

/// 문장 종결 부호 연속
static SENTENCE_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]+").unwrap());

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// 최대 청크 크기 (문자 수)
    pub max_characters: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_characters: 1000,
        }
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// SentenceChunker
// ============================================================================

/// 문장 경계 청커
///
/// - 종결 부호 연속으로 문장 분리, 빈 문장 제거
/// - 현재 청크 + 다음 문장이 최대 크기를 넘으면 현재 청크를 확정
/// - 살아남은 문장이 없으면 원문 전체가 단일 청크
///
/// 단일 문장이 최대 크기보다 길면 그대로 한 청크가 됩니다.
pub struct SentenceChunker {
    config: ChunkConfig,
}

impl SentenceChunker {
    /// 설정으로 생성
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    /// 기본 설정으로 생성
    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }
}

impl Chunker for SentenceChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;

        for sentence in SENTENCE_BOUNDARY
            .split(text)
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            let sentence_len = sentence.chars().count();

            if current_len > 0 && current_len + sentence_len > self.config.max_characters {
                chunks.push(current.trim().to_string());
                current = sentence.to_string();
                current_len = sentence_len;
            } else {
                if current_len > 0 {
                    current.push_str(". ");
                    current_len += 2;
                }
                current.push_str(sentence);
                current_len += sentence_len;
            }
        }

        if !current.trim().is_empty() {
            chunks.push(current.trim().to_string());
        }

        if chunks.is_empty() {
            // 문장이 하나도 없으면 원문 그대로
            return vec![text.to_string()];
        }

        chunks
    }

    fn name(&self) -> &'static str {
        "SentenceChunker"
    }
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 기본 청커 생성
pub fn default_chunker() -> Box<dyn Chunker> {
    Box::new(SentenceChunker::with_defaults())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn small(max: usize) -> SentenceChunker {
        SentenceChunker::new(ChunkConfig {
            max_characters: max,
        })
    }

    #[test]
    fn test_single_chunk() {
        let chunker = SentenceChunker::with_defaults();
        let chunks = chunker.chunk("We study genomes. Deep models help!");
        assert_eq!(chunks, vec!["We study genomes. Deep models help"]);
    }

    #[test]
    fn test_respects_cap() {
        let chunker = small(20);
        let chunks = chunker.chunk("Alpha beta gamma. Delta epsilon. Zeta eta theta iota.");

        assert_eq!(
            chunks,
            vec!["Alpha beta gamma", "Delta epsilon", "Zeta eta theta iota"]
        );
        assert!(chunks.iter().all(|c| c.chars().count() <= 20));
    }

    #[test]
    fn test_joins_sentences_until_cap() {
        let chunker = small(30);
        let chunks = chunker.chunk("One. Two. Three. Four?! Five");
        assert_eq!(chunks, vec!["One. Two. Three. Four. Five"]);
    }

    #[test]
    fn test_long_sentence_kept_whole() {
        let chunker = small(5);
        let chunks = chunker.chunk("A very long sentence without breaks");
        assert_eq!(chunks, vec!["A very long sentence without breaks"]);
    }

    #[test]
    fn test_no_sentence_fallback() {
        let chunker = SentenceChunker::with_defaults();
        assert_eq!(chunker.chunk("...!?"), vec!["...!?"]);
        assert_eq!(chunker.chunk(""), vec![""]);
    }

    #[test]
    fn test_multibyte_text() {
        let chunker = small(20);
        let chunks = chunker.chunk("유전체 분석. 딥러닝 모델.");
        assert_eq!(chunks, vec!["유전체 분석. 딥러닝 모델"]);
    }

    #[test]
    fn test_default_chunker() {
        let chunker = default_chunker();
        assert_eq!(chunker.name(), "SentenceChunker");
    }
}
