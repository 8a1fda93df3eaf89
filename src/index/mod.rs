//! 인덱스 모듈
//!
//! 듀얼 스토어(유사도 인덱스 + 그래프 스토어)의 공통 타입과 트레이트를
//! 정의합니다. 두 스토어는 수집 파이프라인이 함께 채우고, 검색 엔진이
//! 각각 독립적으로 조회합니다.

pub mod graph;
pub mod lance;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::taxonomy::{Taxonomy, TaxonomyReference};

// ============================================================================
// Node / Edge Labels
// ============================================================================

/// 그래프 노드 라벨
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeLabel {
    Document,
    Chunk,
    Category,
    Subcategory,
    Criterion,
}

impl NodeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::Document => "Document",
            NodeLabel::Chunk => "Chunk",
            NodeLabel::Category => "Category",
            NodeLabel::Subcategory => "Subcategory",
            NodeLabel::Criterion => "Criterion",
        }
    }
}

/// 그래프 엣지 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeType {
    /// Document → Chunk
    HasChunk,
    /// Document/Chunk → 분류체계 노드
    RelatesTo,
    /// Category → Subcategory
    HasSubcategory,
    /// Subcategory → Criterion
    HasCriterion,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::HasChunk => "HAS_CHUNK",
            EdgeType::RelatesTo => "RELATES_TO",
            EdgeType::HasSubcategory => "HAS_SUBCATEGORY",
            EdgeType::HasCriterion => "HAS_CRITERION",
        }
    }
}

// ============================================================================
// Document Metadata
// ============================================================================

/// 문서 메타데이터 (생성 시 검증되는 명시적 타입)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// 문서 제목
    pub title: String,
    /// 설명
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// 작성자
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// 대표 카테고리 이름 (필터링용)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// MIME 타입
    pub mimetype: String,
    /// 발행일 (ISO-8601 날짜 문자열)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    /// 생성 시각
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// 수정 시각
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    /// 원본 파일 경로
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
}

impl DocumentMetadata {
    pub fn new(title: impl Into<String>, mimetype: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            mimetype: mimetype.into(),
            created_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// 검색 결과에 실어 보낼 평탄화된 맵
    pub fn to_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("title".to_string(), self.title.clone());
        map.insert("mimetype".to_string(), self.mimetype.clone());
        if let Some(ref v) = self.author {
            map.insert("author".to_string(), v.clone());
        }
        if let Some(ref v) = self.category {
            map.insert("category".to_string(), v.clone());
        }
        if let Some(ref v) = self.published_date {
            map.insert("published_date".to_string(), v.clone());
        }
        map
    }
}

// ============================================================================
// Chunk Records
// ============================================================================

/// 인덱스에 쓸 신규 청크
#[derive(Debug, Clone)]
pub struct NewChunk {
    /// 청크 텍스트
    pub content: String,
    /// 문서 내 순번 (0부터)
    pub chunk_index: usize,
    /// 원문 시작 오프셋 (문자)
    pub start_offset: usize,
    /// 원문 끝 오프셋 (문자)
    pub end_offset: usize,
    /// 분류체계 참조 (문서 분석 결과에서 복사)
    pub taxonomy_references: Vec<TaxonomyReference>,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
}

/// 유사도 인덱스 검색 결과
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub chunk_id: String,
    pub document_id: String,
    pub document_title: String,
    pub content: String,
    /// 인덱스가 보고한 원시 거리
    pub distance: f32,
    pub taxonomy_references: Vec<TaxonomyReference>,
    pub metadata: HashMap<String, String>,
}

/// 그래프 스토어 검색 결과
#[derive(Debug, Clone)]
pub struct GraphHit {
    pub chunk_id: String,
    pub document_id: String,
    pub document_title: String,
    pub content: String,
    /// 3/2/1 부분 문자열 매칭 점수
    pub score: f32,
    pub taxonomy_references: Vec<TaxonomyReference>,
    pub metadata: HashMap<String, String>,
}

// ============================================================================
// Search Filter
// ============================================================================

/// 메타데이터 필터
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilter {
    /// 카테고리 동등 비교
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// 작성자 동등 비교
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// 발행일 하한 (포함, ISO-8601)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_after: Option<String>,
    /// 발행일 상한 (포함, ISO-8601)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_before: Option<String>,
}

impl SearchFilter {
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.author.is_none()
            && self.published_after.is_none()
            && self.published_before.is_none()
    }
}

/// 그래프 청크 탐색 질의
#[derive(Debug, Clone)]
pub struct GraphChunkQuery {
    /// 질의 텍스트 (부분 문자열 매칭)
    pub text: String,
    /// 분류체계 제약 (가장 구체적인 레벨로 탐색)
    pub taxonomy: Option<TaxonomyReference>,
    /// 메타데이터 필터
    pub filter: Option<SearchFilter>,
    /// 최대 결과 수
    pub top_k: usize,
}

// ============================================================================
// Store Traits
// ============================================================================

/// 유사도(벡터) 인덱스 트레이트
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// 문서 단위 벡터 1건 저장
    async fn add_document(
        &self,
        document_id: &str,
        text: &str,
        metadata: &DocumentMetadata,
        references: &[TaxonomyReference],
        embedding: &[f32],
    ) -> Result<()>;

    /// 청크 벡터 일괄 저장, 생성된 청크 id 목록 반환
    async fn add_chunks(
        &self,
        chunks: &[NewChunk],
        metadata: &DocumentMetadata,
        document_id: &str,
    ) -> Result<Vec<String>>;

    /// 최근접 청크 검색 (선택적 메타데이터 필터)
    async fn query_chunks(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<VectorHit>>;

    /// 문서와 그 청크 벡터 삭제, 삭제된 행 수 반환
    async fn delete_document(&self, document_id: &str) -> Result<usize>;

    /// 저장된 청크 수
    async fn chunk_count(&self) -> Result<usize>;

    /// 저장된 문서 수
    async fn document_count(&self) -> Result<usize>;
}

/// 그래프 스토어 트레이트
///
/// 노드 라벨 {Document, Chunk, Category, Subcategory, Criterion}과
/// 엣지 타입 {HAS_CHUNK, RELATES_TO, HAS_SUBCATEGORY, HAS_CRITERION}을
/// 다룹니다. 쓰기는 모두 upsert 의미론입니다.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// 분류체계 노드/엣지 초기화
    async fn init_taxonomy(&self, taxonomy: &Taxonomy) -> Result<()>;

    /// 문서 노드 생성/갱신 + 분류체계 엣지
    async fn upsert_document(
        &self,
        document_id: &str,
        metadata: &DocumentMetadata,
        references: &[TaxonomyReference],
    ) -> Result<()>;

    /// 청크 노드 생성/갱신 + HAS_CHUNK/RELATES_TO 엣지
    async fn upsert_chunk(
        &self,
        chunk_id: &str,
        document_id: &str,
        content: &str,
        start_offset: usize,
        end_offset: usize,
        references: &[TaxonomyReference],
    ) -> Result<()>;

    /// 그래프 탐색 기반 청크 검색
    async fn query_chunks(&self, query: &GraphChunkQuery) -> Result<Vec<GraphHit>>;

    /// 문서 노드와 그 청크/엣지 삭제, 삭제된 노드 수 반환
    async fn delete_document(&self, document_id: &str) -> Result<usize>;

    /// 라벨별 노드 수
    async fn node_count(&self, label: NodeLabel) -> Result<usize>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_and_edges() {
        assert_eq!(NodeLabel::Criterion.as_str(), "Criterion");
        assert_eq!(EdgeType::HasChunk.as_str(), "HAS_CHUNK");
        assert_eq!(EdgeType::RelatesTo.as_str(), "RELATES_TO");
    }

    #[test]
    fn test_metadata_to_map_skips_missing() {
        let mut metadata = DocumentMetadata::new("Report", "text/plain");
        metadata.author = Some("kim".into());

        let map = metadata.to_map();
        assert_eq!(map.get("title").map(String::as_str), Some("Report"));
        assert_eq!(map.get("author").map(String::as_str), Some("kim"));
        assert!(!map.contains_key("category"));
    }

    #[test]
    fn test_filter_is_empty() {
        assert!(SearchFilter::default().is_empty());

        let filter = SearchFilter {
            category: Some("Strategy".into()),
            ..Default::default()
        };
        assert!(!filter.is_empty());
    }
}
