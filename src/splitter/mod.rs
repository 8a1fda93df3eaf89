//! 텍스트 분할 모듈
//!
//! 문서를 오버랩이 있는 청크로 나누는 전략들을 제공합니다.
//! 모든 전략은 동일한 계약을 따릅니다:
//! - `chunk_size == 0` 또는 `chunk_overlap >= chunk_size`이면 검증 에러
//! - 입력이 `chunk_size` 이하면 입력 전체가 단일 청크
//! - 같은 입력은 항상 같은 출력 (결정적, 부수효과 없음)

use regex::Regex;

use crate::error::{RagError, Result};

// ============================================================================
// Split Configuration
// ============================================================================

/// 분할 설정
#[derive(Debug, Clone)]
pub struct SplitConfig {
    /// 청크 최대 크기 (문자 수)
    pub chunk_size: usize,
    /// 연속 청크 간 오버랩 (문자 수)
    pub chunk_overlap: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl SplitConfig {
    /// 파라미터 검증
    ///
    /// 실패는 작업 시작 전에 동기적으로 반환됩니다.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::InvalidParameter(
                "chunk_size must be positive".into(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::InvalidParameter(
                "chunk_overlap must be smaller than chunk_size".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Splitter Trait
// ============================================================================

/// 텍스트 분할 전략 트레이트
pub trait Splitter: Send + Sync {
    /// 텍스트를 순서 있는 청크 목록으로 분할
    fn split(&self, text: &str) -> Result<Vec<String>>;

    /// 전략 이름
    fn name(&self) -> &'static str;

    /// 이 전략이 원문의 연속 부분 문자열을 그대로 내보내는지 여부
    ///
    /// true이면 각 청크의 원문 오프셋을 전방 탐색으로 정확히 복원할 수
    /// 있습니다. 오버랩을 재작성하는 전략은 false를 반환합니다.
    fn emits_substrings(&self) -> bool {
        true
    }
}

// ============================================================================
// SeparatorSplitter
// ============================================================================

/// 구분자 기반 분할기
///
/// 텍스트를 구분자 단위(기본: 줄)로 나눈 뒤, 단위를 누적하다가
/// `chunk_size`를 넘기 직전에 청크를 내보냅니다. 다음 청크는 직전 청크의
/// 단위들을 뒤에서부터 `chunk_overlap` 문자가 넘을 때까지 되짚어 시드합니다.
/// 단일 단위가 `chunk_size`보다 길면 그대로 하나의 초과 청크가 됩니다.
pub struct SeparatorSplitter {
    config: SplitConfig,
    separator: String,
}

impl SeparatorSplitter {
    pub fn new(config: SplitConfig) -> Self {
        Self::with_separator(config, "\n")
    }

    pub fn with_separator(config: SplitConfig, separator: impl Into<String>) -> Self {
        Self {
            config,
            separator: separator.into(),
        }
    }
}

impl Splitter for SeparatorSplitter {
    fn split(&self, text: &str) -> Result<Vec<String>> {
        self.config.validate()?;

        if char_len(text) <= self.config.chunk_size {
            return Ok(vec![text.to_string()]);
        }

        let sep = self.separator.as_str();
        let sep_len = char_len(sep);
        let units: Vec<&str> = text.split(sep).collect();

        let mut chunks: Vec<String> = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_len = 0usize;

        for unit in units {
            let unit_len = char_len(unit);
            let added = if current.is_empty() {
                unit_len
            } else {
                unit_len + sep_len
            };

            // 현재 단위를 더하면 초과하고 이미 내용이 있으면 청크 확정
            if current_len + added > self.config.chunk_size && current_len > 0 {
                chunks.push(current.join(sep));

                if self.config.chunk_overlap > 0 {
                    // 뒤에서부터 오버랩 목표를 넘을 때까지 단위를 유지
                    let mut overlap_len = 0usize;
                    let mut start = 0usize;
                    for i in (0..current.len()).rev() {
                        let mut len = char_len(current[i]);
                        if i > 0 {
                            len += sep_len;
                        }
                        overlap_len += len;
                        start = i;
                        if overlap_len > self.config.chunk_overlap {
                            break;
                        }
                    }
                    current.drain(..start);
                    current_len = joined_len(&current, sep_len);
                } else {
                    current.clear();
                    current_len = 0;
                }
            }

            if current.is_empty() {
                current_len += unit_len;
            } else {
                current_len += unit_len + sep_len;
            }
            current.push(unit);
        }

        if !current.is_empty() {
            chunks.push(current.join(sep));
        }

        Ok(chunks)
    }

    fn name(&self) -> &'static str {
        "SeparatorSplitter"
    }
}

// ============================================================================
// SentenceSplitter
// ============================================================================

/// 문장 단위 분할기
///
/// 문장 경계([.!?] 뒤 공백)를 존중하며 청크를 구성합니다.
/// `chunk_size`보다 긴 단일 문장은 공백 구분자로 다시 분할됩니다.
pub struct SentenceSplitter {
    config: SplitConfig,
    boundary: Regex,
}

impl SentenceSplitter {
    pub fn new(config: SplitConfig) -> Self {
        Self {
            config,
            // 구두점 뒤 공백이 문장 경계
            boundary: Regex::new(r"[.!?]\s+").unwrap(),
        }
    }

    /// 문장 목록으로 분해 (빈 문장 제외)
    fn sentences<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut out = Vec::new();
        let mut cursor = 0usize;
        for m in self.boundary.find_iter(text) {
            // 구두점 문자(1바이트)까지가 문장
            let end = m.start() + 1;
            let sentence = &text[cursor..end];
            if !sentence.trim().is_empty() {
                out.push(sentence);
            }
            cursor = m.end();
        }
        let tail = &text[cursor..];
        if !tail.trim().is_empty() {
            out.push(tail);
        }
        out
    }
}

impl Splitter for SentenceSplitter {
    fn split(&self, text: &str) -> Result<Vec<String>> {
        self.config.validate()?;

        if char_len(text) <= self.config.chunk_size {
            return Ok(vec![text.to_string()]);
        }

        let word_fallback =
            SeparatorSplitter::with_separator(self.config.clone(), " ");

        let mut chunks: Vec<String> = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_len = 0usize;

        for sentence in self.sentences(text) {
            let sentence_len = char_len(sentence);

            // 단일 문장이 청크보다 길면 공백 기준으로 재분할
            if sentence_len > self.config.chunk_size {
                if !current.is_empty() {
                    chunks.push(current.join(" "));
                    current.clear();
                    current_len = 0;
                }
                chunks.extend(word_fallback.split(sentence)?);
                continue;
            }

            if current_len + sentence_len > self.config.chunk_size && !current.is_empty() {
                chunks.push(current.join(" "));

                if self.config.chunk_overlap > 0 {
                    let mut overlap_len = 0usize;
                    let mut start = 0usize;
                    for i in (0..current.len()).rev() {
                        overlap_len += char_len(current[i]);
                        start = i;
                        if overlap_len > self.config.chunk_overlap {
                            break;
                        }
                    }
                    current.drain(..start);
                    current_len = current.iter().map(|s| char_len(s)).sum();
                } else {
                    current.clear();
                    current_len = 0;
                }
            }

            current.push(sentence);
            current_len += sentence_len;
        }

        if !current.is_empty() {
            chunks.push(current.join(" "));
        }

        Ok(chunks)
    }

    fn name(&self) -> &'static str {
        "SentenceSplitter"
    }

    fn emits_substrings(&self) -> bool {
        // 문장 사이 공백이 단일 공백으로 재조립됨
        false
    }
}

// ============================================================================
// MarkdownSplitter
// ============================================================================

/// Markdown 구조 인식 분할기
///
/// 헤더 경계에서 섹션을 나누고 (코드 블록 내부 헤더는 무시),
/// 섹션을 누적해 청크를 구성합니다. 오버랩은 직전 청크의 끝부분을
/// 복사해 붙이므로 청크가 원문의 연속 부분 문자열이 아닐 수 있습니다.
pub struct MarkdownSplitter {
    config: SplitConfig,
}

impl MarkdownSplitter {
    pub fn new(config: SplitConfig) -> Self {
        Self { config }
    }

    /// 헤더 경계 기준 섹션 분할
    fn split_sections(&self, text: &str) -> Vec<String> {
        let header_re = Regex::new(r"^#{1,6}\s+").unwrap();
        let mut sections = Vec::new();
        let mut current = String::new();
        let mut in_code_block = false;

        for line in text.lines() {
            if line.trim_start().starts_with("```") {
                in_code_block = !in_code_block;
            }

            if !in_code_block && header_re.is_match(line) && !current.trim().is_empty() {
                sections.push(current.trim_end().to_string());
                current = String::new();
            }

            current.push_str(line);
            current.push('\n');
        }

        if !current.trim().is_empty() {
            sections.push(current.trim_end().to_string());
        }

        sections
    }

    /// 직전 청크 끝에서 오버랩 시드 추출
    fn overlap_tail<'a>(&self, prev: &'a str) -> &'a str {
        let total = char_len(prev);
        if total <= self.config.chunk_overlap {
            return prev;
        }
        let byte_start = prev
            .char_indices()
            .nth(total - self.config.chunk_overlap)
            .map(|(i, _)| i)
            .unwrap_or(0);

        let tail = &prev[byte_start..];
        // 문단 경계가 있으면 거기서부터
        match tail.find("\n\n") {
            Some(p) => &tail[p + 2..],
            None => tail,
        }
    }
}

impl Splitter for MarkdownSplitter {
    fn split(&self, text: &str) -> Result<Vec<String>> {
        self.config.validate()?;

        if char_len(text) <= self.config.chunk_size {
            return Ok(vec![text.to_string()]);
        }

        let mut chunks: Vec<String> = Vec::new();
        let mut current = String::new();

        for section in self.split_sections(text) {
            let section_len = char_len(&section);

            if !current.is_empty()
                && char_len(&current) + section_len + 1 > self.config.chunk_size
            {
                chunks.push(current.clone());

                if self.config.chunk_overlap > 0 {
                    current = self.overlap_tail(&chunks[chunks.len() - 1]).to_string();
                } else {
                    current.clear();
                }
            }

            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(&section);

            // 섹션 하나로 이미 초과하면 그대로 확정
            if char_len(&current) > self.config.chunk_size {
                chunks.push(current.clone());
                current.clear();
            }
        }

        if !current.trim().is_empty() {
            chunks.push(current);
        }

        Ok(chunks)
    }

    fn name(&self) -> &'static str {
        "MarkdownSplitter"
    }

    fn emits_substrings(&self) -> bool {
        false
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

#[inline]
fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// 구분자로 join했을 때의 문자 길이
fn joined_len(units: &[&str], sep_len: usize) -> usize {
    if units.is_empty() {
        return 0;
    }
    units.iter().map(|u| char_len(u)).sum::<usize>() + sep_len * (units.len() - 1)
}

// ============================================================================
// Factory Functions
// ============================================================================

/// mimetype에 맞는 분할 전략 선택
pub fn splitter_for_mimetype(mimetype: &str, config: SplitConfig) -> Box<dyn Splitter> {
    match mimetype {
        "text/markdown" => Box::new(MarkdownSplitter::new(config)),
        _ => Box::new(SeparatorSplitter::new(config)),
    }
}

/// 기본 분할기 (줄 구분자)
pub fn default_splitter(config: SplitConfig) -> Box<dyn Splitter> {
    Box::new(SeparatorSplitter::new(config))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config(size: usize, overlap: usize) -> SplitConfig {
        SplitConfig {
            chunk_size: size,
            chunk_overlap: overlap,
        }
    }

    #[test]
    fn test_validation() {
        assert!(config(0, 0).validate().is_err());
        assert!(config(100, 100).validate().is_err());
        assert!(config(100, 200).validate().is_err());
        assert!(config(100, 99).validate().is_ok());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let splitter = SeparatorSplitter::new(config(1000, 200));
        let text = "짧은 문서입니다.\n두 번째 줄.";
        let chunks = splitter.split(text).unwrap();
        assert_eq!(chunks, vec![text.to_string()]);
    }

    #[test]
    fn test_separator_chunks_within_size() {
        let splitter = SeparatorSplitter::new(config(100, 20));
        let lines: Vec<String> = (0..20).map(|i| format!("line number {:02}", i)).collect();
        let text = lines.join("\n");

        let chunks = splitter.split(&text).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn test_separator_overlap_seeds_next_chunk() {
        let splitter = SeparatorSplitter::new(config(60, 20));
        let text = (0..10)
            .map(|i| format!("unit-{:02} padding text", i))
            .collect::<Vec<_>>()
            .join("\n");

        let chunks = splitter.split(&text).unwrap();
        assert!(chunks.len() > 1);

        // 다음 청크는 직전 청크의 꼬리 단위로 시작해야 함
        for pair in chunks.windows(2) {
            let first_unit = pair[1].split('\n').next().unwrap();
            assert!(
                pair[0].ends_with(first_unit),
                "expected {:?} to end with {:?}",
                pair[0],
                first_unit
            );
        }
    }

    #[test]
    fn test_oversized_unit_emitted_verbatim() {
        let splitter = SeparatorSplitter::new(config(50, 10));
        let long_unit = "x".repeat(120);
        let text = format!("short line\n{}\nanother short line", long_unit);

        let chunks = splitter.split(&text).unwrap();
        assert!(chunks.iter().any(|c| c.contains(&long_unit)));
    }

    #[test]
    fn test_three_chunk_scenario() {
        // 1000/200 설정에서 약 2,500자 문단 입력은 정확히 3개 청크
        let paragraphs: Vec<String> = (0..10)
            .map(|i| format!("{}{}", i, "p".repeat(248)))
            .collect();
        let text = paragraphs.join("\n");
        assert_eq!(text.chars().count(), 2499);

        let splitter = SeparatorSplitter::new(config(1000, 200));
        let chunks = splitter.split(&text).unwrap();

        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 1000);
        }
        // 뒤 청크의 선두는 앞 청크의 꼬리와 겹침 (~200자)
        for pair in chunks.windows(2) {
            let head: String = pair[1].chars().take(200).collect();
            assert!(pair[0].contains(head.split('\n').next().unwrap()));
        }
    }

    #[test]
    fn test_chunks_cover_and_reconstruct_original() {
        let splitter = SeparatorSplitter::new(config(60, 20));
        let text = (0..12)
            .map(|i| format!("unit-{:02} with some padding text", i))
            .collect::<Vec<_>>()
            .join("\n");

        let chunks = splitter.split(&text).unwrap();
        assert!(chunks.len() > 2);

        // 각 청크는 원문의 연속 부분 문자열이고, 앞 청크가 덮은 범위와
        // 겹치거나 맞닿아야 한다 (빈틈 없음). 겹치는 선두를 떼어내고
        // 이어 붙이면 원문이 복원된다.
        let mut rebuilt = String::new();
        let mut covered = 0usize;
        let mut search_from = 0usize;

        for chunk in &chunks {
            let start = text[search_from..]
                .find(chunk.as_str())
                .map(|pos| search_from + pos)
                .expect("chunk is not a substring of the original");
            assert!(start <= covered, "gap before chunk at byte {}", start);

            rebuilt.push_str(&chunk[covered - start..]);
            covered = start + chunk.len();
            search_from = start + 1;
        }

        assert_eq!(covered, text.len());
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_deterministic() {
        let splitter = SeparatorSplitter::new(config(80, 20));
        let text = (0..30)
            .map(|i| format!("line {}", i))
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(splitter.split(&text).unwrap(), splitter.split(&text).unwrap());
    }

    #[test]
    fn test_sentence_splitter_respects_boundaries() {
        let splitter = SentenceSplitter::new(config(80, 0));
        let text = "First sentence here. Second one follows! Third asks a question? \
                    Fourth keeps going. Fifth wraps it up. Sixth for good measure.";

        let chunks = splitter.split(text).unwrap();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            // 청크는 문장 경계에서 끝남
            let trimmed = chunk.trim_end();
            assert!(
                trimmed.ends_with('.') || trimmed.ends_with('!') || trimmed.ends_with('?'),
                "chunk not sentence-aligned: {:?}",
                chunk
            );
        }
    }

    #[test]
    fn test_sentence_splitter_long_sentence_fallback() {
        let splitter = SentenceSplitter::new(config(50, 10));
        let words = vec!["word"; 40].join(" ");
        let text = format!("{}.", words);

        let chunks = splitter.split(&text).unwrap();
        assert!(chunks.len() > 1);
    }

    #[test]
    fn test_markdown_splitter_keeps_headers_with_content() {
        let splitter = MarkdownSplitter::new(config(120, 0));
        let text = "# Alpha\n\nContent under alpha section, long enough to matter.\n\n\
                    # Beta\n\nContent under beta section, also long enough to matter.\n\n\
                    # Gamma\n\nContent under gamma, the final section of this file.";

        let chunks = splitter.split(text).unwrap();
        assert!(chunks.len() > 1);
        // 헤더는 자기 내용과 같은 청크에 있어야 함
        let alpha = chunks.iter().find(|c| c.contains("# Alpha")).unwrap();
        assert!(alpha.contains("under alpha"));
    }

    #[test]
    fn test_markdown_splitter_ignores_headers_in_code_blocks() {
        let splitter = MarkdownSplitter::new(config(500, 0));
        let text = "# Real Header\n\n```\n# not a header\ncode line\n```\n\ntrailing text";
        let sections = splitter.split_sections(text);
        assert_eq!(sections.len(), 1);
    }

    #[test]
    fn test_factory_selects_by_mimetype() {
        let md = splitter_for_mimetype("text/markdown", SplitConfig::default());
        assert_eq!(md.name(), "MarkdownSplitter");

        let plain = splitter_for_mimetype("text/plain", SplitConfig::default());
        assert_eq!(plain.name(), "SeparatorSplitter");
    }
}
