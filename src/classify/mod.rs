//! 문서 분류 모듈
//!
//! 문서 내용을 분석하여 분류체계 참조와 키워드를 식별합니다.
//! - `KeywordClassifier`: 분류체계 이름/규칙 기반 단순 매칭 (오프라인 폴백)
//! - `OllamaClassifier`: LLM 기반 분석 (JSON 응답 파싱)
//!
//! 분류 실패는 치명적이지 않습니다. 호출 측(파이프라인)은 실패 시
//! 빈 분석 결과로 degrade합니다.

use std::collections::HashMap;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::{RagError, Result};
use crate::taxonomy::{dedup_references, Taxonomy, TaxonomyReference};

// ============================================================================
// Document Analysis
// ============================================================================

/// 문서 분석 결과
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    /// 관련 분류체계 참조 목록
    #[serde(default)]
    pub taxonomy_references: Vec<TaxonomyReference>,
    /// 추출된 키워드
    #[serde(default)]
    pub keywords: Vec<String>,
    /// 내용 요약
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

// ============================================================================
// Classifier Trait
// ============================================================================

/// 문서 분류 트레이트
#[async_trait]
pub trait Classifier: Send + Sync {
    /// 문서 텍스트를 분석하여 분류체계 참조/키워드 추출
    async fn analyze(&self, text: &str, document_id: &str) -> Result<DocumentAnalysis>;

    /// 분류기 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Keyword Classifier
// ============================================================================

/// 분석 샘플 최대 길이 (문자 수)
const SAMPLE_MAX_CHARS: usize = 5000;
/// 키워드 매칭 스캔 범위 (문자 수)
const KEYWORD_SCAN_CHARS: usize = 10_000;

/// 키워드 기반 분류기
///
/// 분류체계의 카테고리/하위 카테고리 이름과 카테고리별 추가 규칙이
/// 문서 선두부에 나타나는지 검사합니다. 아무것도 매칭되지 않으면
/// 첫 번째 카테고리를 기본값으로 부여합니다.
pub struct KeywordClassifier {
    taxonomy: Taxonomy,
    /// 카테고리 id → 추가 매칭 키워드
    rules: HashMap<String, Vec<String>>,
}

impl KeywordClassifier {
    pub fn new(taxonomy: Taxonomy) -> Self {
        Self {
            taxonomy,
            rules: HashMap::new(),
        }
    }

    /// 카테고리별 추가 키워드 규칙 지정
    pub fn with_rules(mut self, rules: HashMap<String, Vec<String>>) -> Self {
        self.rules = rules;
        self
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn analyze(&self, text: &str, document_id: &str) -> Result<DocumentAnalysis> {
        let sample: String = text
            .chars()
            .take(KEYWORD_SCAN_CHARS)
            .collect::<String>()
            .to_lowercase();

        let mut references = Vec::new();
        let mut keywords = Vec::new();

        for category in &self.taxonomy.categories {
            let mut matched = false;

            // 카테고리 이름 직접 매칭
            if sample.contains(&category.name.to_lowercase()) {
                matched = true;
                keywords.push(category.name.clone());
            }

            // 카테고리별 추가 규칙
            if !matched {
                if let Some(rule_keywords) = self.rules.get(&category.id) {
                    for keyword in rule_keywords {
                        if sample.contains(&keyword.to_lowercase()) {
                            matched = true;
                            keywords.push(keyword.clone());
                            break;
                        }
                    }
                }
            }

            if matched {
                references.push(TaxonomyReference::category(&category.id, &category.name));
            }

            // 하위 카테고리 이름 매칭은 더 구체적인 참조를 만든다
            for sub in &category.subcategories {
                if sample.contains(&sub.name.to_lowercase()) {
                    references.push(
                        TaxonomyReference::category(&category.id, &category.name)
                            .with_subcategory(&sub.id, &sub.name),
                    );
                    keywords.push(sub.name.clone());
                }
            }
        }

        // 매칭이 전혀 없으면 첫 카테고리를 기본 부여
        if references.is_empty() {
            if let Some(first) = self.taxonomy.categories.first() {
                references.push(TaxonomyReference::category(&first.id, &first.name));
            }
        }

        dedup_references(&mut references);
        keywords.dedup();

        tracing::debug!(
            "Document {} matched {} taxonomy references (keyword classifier)",
            document_id,
            references.len()
        );

        Ok(DocumentAnalysis {
            taxonomy_references: references,
            keywords,
            summary: None,
        })
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

// ============================================================================
// Ollama Classifier
// ============================================================================

/// LLM 기반 분류기 (Ollama /api/generate)
pub struct OllamaClassifier {
    base_url: String,
    model: String,
    client: reqwest::Client,
    taxonomy: Taxonomy,
}

/// Ollama 생성 요청 본문
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    system: &'a str,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    /// 결정적 결과를 위한 낮은 temperature
    temperature: f32,
}

/// Ollama 생성 응답
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaClassifier {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        taxonomy: Taxonomy,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| RagError::Classification(format!("failed to create http client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
            taxonomy,
        })
    }

    /// 설정에서 생성
    pub fn from_settings(settings: &Settings, taxonomy: Taxonomy) -> Result<Self> {
        Self::new(
            settings.ollama_base_url.clone(),
            settings.classifier_model.clone(),
            taxonomy,
        )
    }

    /// 분석 프롬프트 구성
    fn build_prompt(&self, sample: &str) -> String {
        let mut category_lines = String::new();
        for category in &self.taxonomy.categories {
            category_lines.push_str(&format!(
                "Category {}: {}\n",
                category.id, category.name
            ));
        }

        format!(
            "You are an expert in analyzing documents against a fixed taxonomy.\n\n\
             The taxonomy has the following categories:\n{}\n\
             Analyze the following document and respond with JSON containing:\n\
             1. taxonomy_references: list of related categories, each with category_id and category_name\n\
             2. keywords: important keywords found in the document\n\
             3. summary: a short summary of the document\n\n\
             Document:\n```\n{}\n```\n\n\
             Respond with JSON only:",
            category_lines, sample
        )
    }

    /// LLM 응답에서 JSON 추출 및 파싱
    fn parse_response(&self, raw: &str) -> Result<DocumentAnalysis> {
        // ```json 펜스 내부 우선
        let fence = Regex::new(r"(?s)```json\s*(.*?)\s*```").unwrap();
        let json_str = match fence.captures(raw) {
            Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(raw),
            None => raw,
        };
        let json_str = json_str.trim().trim_matches('`');

        serde_json::from_str::<DocumentAnalysis>(json_str)
            .map_err(|e| RagError::Classification(format!("failed to parse llm response: {}", e)))
    }
}

#[async_trait]
impl Classifier for OllamaClassifier {
    async fn analyze(&self, text: &str, document_id: &str) -> Result<DocumentAnalysis> {
        let sample = extract_sample(text, SAMPLE_MAX_CHARS);
        let prompt = self.build_prompt(&sample);

        let request = GenerateRequest {
            model: &self.model,
            prompt: &prompt,
            stream: false,
            system: "You are an expert document analyst. Always respond with valid JSON.",
            options: GenerateOptions { temperature: 0.1 },
        };

        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Classification(format!("failed to query llm: {}", e)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            RagError::Classification(format!("failed to read llm response: {}", e))
        })?;

        if !status.is_success() {
            return Err(RagError::Classification(format!(
                "ollama api error ({}): {}",
                status, body
            )));
        }

        let generate: GenerateResponse = serde_json::from_str(&body).map_err(|e| {
            RagError::Classification(format!("failed to parse generate response: {}", e))
        })?;

        let mut analysis = self.parse_response(&generate.response)?;
        dedup_references(&mut analysis.taxonomy_references);

        tracing::info!(
            "Document {} analyzed: found {} taxonomy references",
            document_id,
            analysis.taxonomy_references.len()
        );

        Ok(analysis)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 긴 텍스트에서 대표 샘플 추출 (앞/중간/끝 1/3씩)
fn extract_sample(text: &str, max_chars: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return text.to_string();
    }

    let third = max_chars / 3;
    let beginning: String = chars[..third].iter().collect();
    let middle_start = (chars.len() - third) / 2;
    let middle: String = chars[middle_start..middle_start + third].iter().collect();
    let end: String = chars[chars.len() - third..].iter().collect();

    format!("{}\n\n[...]\n\n{}\n\n[...]\n\n{}", beginning, middle, end)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::{CategoryDef, SubcategoryDef};

    fn test_taxonomy() -> Taxonomy {
        Taxonomy {
            categories: vec![
                CategoryDef {
                    id: "1".into(),
                    name: "Leadership".into(),
                    description: String::new(),
                    subcategories: vec![SubcategoryDef {
                        id: "1.1".into(),
                        name: "Vision".into(),
                        criteria: vec![],
                    }],
                },
                CategoryDef {
                    id: "2".into(),
                    name: "Strategy".into(),
                    description: String::new(),
                    subcategories: vec![],
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_keyword_classifier_matches_category_names() {
        let classifier = KeywordClassifier::new(test_taxonomy());
        let analysis = classifier
            .analyze("This document is about strategy and planning.", "doc-1")
            .await
            .unwrap();

        assert_eq!(analysis.taxonomy_references.len(), 1);
        assert_eq!(analysis.taxonomy_references[0].category_id, "2");
    }

    #[tokio::test]
    async fn test_keyword_classifier_subcategory_reference() {
        let classifier = KeywordClassifier::new(test_taxonomy());
        let analysis = classifier
            .analyze("Our vision statement guides leadership decisions.", "doc-2")
            .await
            .unwrap();

        // Leadership 카테고리 + Vision 하위 카테고리 참조
        assert!(analysis
            .taxonomy_references
            .iter()
            .any(|r| r.subcategory_id.as_deref() == Some("1.1")));
    }

    #[tokio::test]
    async fn test_keyword_classifier_fallback_to_first_category() {
        let classifier = KeywordClassifier::new(test_taxonomy());
        let analysis = classifier
            .analyze("Nothing relevant here at all.", "doc-3")
            .await
            .unwrap();

        assert_eq!(analysis.taxonomy_references.len(), 1);
        assert_eq!(analysis.taxonomy_references[0].category_id, "1");
    }

    #[tokio::test]
    async fn test_keyword_classifier_custom_rules() {
        let mut rules = HashMap::new();
        rules.insert("2".to_string(), vec!["roadmap".to_string()]);

        let classifier = KeywordClassifier::new(test_taxonomy()).with_rules(rules);
        let analysis = classifier
            .analyze("The roadmap covers next year.", "doc-4")
            .await
            .unwrap();

        assert_eq!(analysis.taxonomy_references[0].category_id, "2");
        assert!(analysis.keywords.contains(&"roadmap".to_string()));
    }

    #[test]
    fn test_parse_response_with_json_fence() {
        let classifier = OllamaClassifier::new(
            "http://localhost:11434",
            "llama3",
            test_taxonomy(),
        )
        .unwrap();

        let raw = "Here is the analysis:\n```json\n{\"taxonomy_references\":[{\"category_id\":\"1\",\"category_name\":\"Leadership\"}],\"keywords\":[\"vision\"],\"summary\":\"About leadership.\"}\n```";
        let analysis = classifier.parse_response(raw).unwrap();

        assert_eq!(analysis.taxonomy_references.len(), 1);
        assert_eq!(analysis.keywords, vec!["vision"]);
        assert_eq!(analysis.summary.as_deref(), Some("About leadership."));
    }

    #[test]
    fn test_parse_response_bare_json() {
        let classifier = OllamaClassifier::new(
            "http://localhost:11434",
            "llama3",
            test_taxonomy(),
        )
        .unwrap();

        let raw = r#"{"taxonomy_references":[],"keywords":[]}"#;
        let analysis = classifier.parse_response(raw).unwrap();
        assert!(analysis.taxonomy_references.is_empty());
    }

    #[test]
    fn test_parse_response_garbage_fails() {
        let classifier = OllamaClassifier::new(
            "http://localhost:11434",
            "llama3",
            test_taxonomy(),
        )
        .unwrap();

        assert!(classifier.parse_response("not json at all").is_err());
    }

    #[test]
    fn test_extract_sample_short_text_unchanged() {
        assert_eq!(extract_sample("short", 100), "short");
    }

    #[test]
    fn test_extract_sample_long_text_has_three_sections() {
        let text = "a".repeat(20_000);
        let sample = extract_sample(&text, 3000);
        assert!(sample.chars().count() < 4000);
        assert_eq!(sample.matches("[...]").count(), 2);
    }
}
