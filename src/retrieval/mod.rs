//! 하이브리드 검색 엔진
//!
//! 유사도 인덱스와 그래프 스토어를 병렬로 조회하고 가중합으로
//! 결과를 융합합니다. 한쪽 브랜치의 실패/타임아웃은 해당 브랜치만
//! 빈 결과로 degrade하고, 다른 쪽 결과는 그대로 반환합니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::{GraphChunkQuery, GraphHit, GraphStore, SearchFilter, SimilarityIndex, VectorHit};
use crate::taxonomy::{dedup_references, TaxonomyReference};

// ============================================================================
// Search Request / Response
// ============================================================================

/// 검색 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// 벡터 브랜치만
    Vector,
    /// 그래프 브랜치만
    Graph,
    /// 두 브랜치 병렬 + 가중합 융합
    Hybrid,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Vector => "vector",
            SearchMode::Graph => "graph",
            SearchMode::Hybrid => "hybrid",
        }
    }
}

/// 검색 요청
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// 질의 텍스트
    pub query: String,
    /// 검색 모드
    pub mode: SearchMode,
    /// 최대 결과 수
    pub top_k: usize,
    /// 벡터 브랜치 가중치
    pub vector_weight: f32,
    /// 그래프 브랜치 가중치
    pub graph_weight: f32,
    /// 메타데이터 필터
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<SearchFilter>,
    /// 분류체계 제약 (그래프 브랜치에만 적용)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxonomy: Option<TaxonomyReference>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            mode: SearchMode::Hybrid,
            top_k: 10,
            vector_weight: 0.6,
            graph_weight: 0.4,
            filter: None,
            taxonomy: None,
        }
    }

    /// 요청 검증 (작업 시작 전에 동기적으로 수행)
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(RagError::InvalidParameter("query must not be empty".into()));
        }
        if self.top_k == 0 {
            return Err(RagError::InvalidParameter("top_k must be positive".into()));
        }
        if self.vector_weight < 0.0 || self.graph_weight < 0.0 {
            return Err(RagError::InvalidParameter(
                "weights must not be negative".into(),
            ));
        }
        Ok(())
    }
}

/// 융합된 검색 결과 1건
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk_id: String,
    pub document_id: String,
    pub document_title: String,
    pub content: String,
    /// 벡터 브랜치 점수 (1 - 거리, 미등장 시 0)
    pub vector_score: f32,
    /// 그래프 브랜치 점수 (미등장 시 0)
    pub graph_score: f32,
    /// 정규화 가중합
    pub combined_score: f32,
    pub taxonomy_references: Vec<TaxonomyReference>,
    pub metadata: HashMap<String, String>,
}

/// 검색 응답
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub mode: SearchMode,
    pub total_results: usize,
    pub results: Vec<SearchResult>,
    pub execution_time_ms: u64,
}

// ============================================================================
// Retrieval Engine
// ============================================================================

/// 하이브리드 검색 엔진
pub struct RetrievalEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    similarity: Arc<dyn SimilarityIndex>,
    graph: Arc<dyn GraphStore>,
    /// 브랜치별 타임아웃
    branch_timeout: Duration,
}

impl RetrievalEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        similarity: Arc<dyn SimilarityIndex>,
        graph: Arc<dyn GraphStore>,
        branch_timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            similarity,
            graph,
            branch_timeout,
        }
    }

    /// 검색 실행
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        request.validate()?;
        let started = Instant::now();

        // 융합 후 상위 top_k가 바뀔 수 있으므로 브랜치는 여유 있게 가져온다
        let fetch_k = request.top_k * 2;

        let (vector_hits, graph_hits) = match request.mode {
            SearchMode::Vector => (self.vector_branch(request, fetch_k).await, Vec::new()),
            SearchMode::Graph => (Vec::new(), self.graph_branch(request, fetch_k).await),
            SearchMode::Hybrid => {
                tokio::join!(
                    self.vector_branch(request, fetch_k),
                    self.graph_branch(request, fetch_k)
                )
            }
        };

        let (vector_weight, graph_weight) = match request.mode {
            SearchMode::Vector => (1.0, 0.0),
            SearchMode::Graph => (0.0, 1.0),
            SearchMode::Hybrid => (request.vector_weight, request.graph_weight),
        };

        let results = combine_results(
            &vector_hits,
            &graph_hits,
            vector_weight,
            graph_weight,
            request.top_k,
        );

        Ok(SearchResponse {
            query: request.query.clone(),
            mode: request.mode,
            total_results: results.len(),
            results,
            execution_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// 벡터 브랜치: 질의 임베딩 → 최근접 청크
    ///
    /// 실패와 타임아웃은 빈 결과로 degrade됩니다.
    async fn vector_branch(&self, request: &SearchRequest, fetch_k: usize) -> Vec<VectorHit> {
        let run = async {
            let embedding = self.embedder.embed(&request.query).await?;
            self.similarity
                .query_chunks(&embedding, fetch_k, request.filter.as_ref())
                .await
        };

        match tokio::time::timeout(self.branch_timeout, run).await {
            Ok(Ok(hits)) => hits,
            Ok(Err(e)) => {
                tracing::warn!("Vector search branch failed: {}", e);
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(
                    "Vector search branch timed out after {:?}",
                    self.branch_timeout
                );
                Vec::new()
            }
        }
    }

    /// 그래프 브랜치: 분류체계/부분 문자열 탐색
    ///
    /// 실패와 타임아웃은 빈 결과로 degrade됩니다.
    async fn graph_branch(&self, request: &SearchRequest, fetch_k: usize) -> Vec<GraphHit> {
        let query = GraphChunkQuery {
            text: request.query.clone(),
            taxonomy: request.taxonomy.clone(),
            filter: request.filter.clone(),
            top_k: fetch_k,
        };

        match tokio::time::timeout(self.branch_timeout, self.graph.query_chunks(&query)).await {
            Ok(Ok(hits)) => hits,
            Ok(Err(e)) => {
                tracing::warn!("Graph search branch failed: {}", e);
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(
                    "Graph search branch timed out after {:?}",
                    self.branch_timeout
                );
                Vec::new()
            }
        }
    }
}

// ============================================================================
// Result Fusion
// ============================================================================

/// 두 브랜치 결과를 청크 id 기준 가중합으로 융합
///
/// - 가중치는 합이 1이 되도록 정규화합니다. 둘 다 0이면 빈 결과입니다.
/// - 벡터 점수는 `1 - 거리`, 브랜치에 없는 항목은 0점으로 취급합니다.
/// - 같은 combined_score 사이의 순서는 안정적입니다
///   (벡터 브랜치 순서 우선, 그 다음 그래프 브랜치 순서).
pub fn combine_results(
    vector_hits: &[VectorHit],
    graph_hits: &[GraphHit],
    vector_weight: f32,
    graph_weight: f32,
    top_k: usize,
) -> Vec<SearchResult> {
    let total_weight = vector_weight + graph_weight;
    if total_weight <= 0.0 {
        return Vec::new();
    }
    let vector_weight = vector_weight / total_weight;
    let graph_weight = graph_weight / total_weight;

    // 삽입 순서 보존을 위해 Vec + id 인덱스 맵을 함께 유지
    let mut results: Vec<SearchResult> = Vec::new();
    let mut by_chunk: HashMap<String, usize> = HashMap::new();

    for hit in vector_hits {
        let vector_score = 1.0 - hit.distance;
        let index = results.len();
        results.push(SearchResult {
            chunk_id: hit.chunk_id.clone(),
            document_id: hit.document_id.clone(),
            document_title: hit.document_title.clone(),
            content: hit.content.clone(),
            vector_score,
            graph_score: 0.0,
            combined_score: 0.0,
            taxonomy_references: hit.taxonomy_references.clone(),
            metadata: hit.metadata.clone(),
        });
        by_chunk.insert(hit.chunk_id.clone(), index);
    }

    for hit in graph_hits {
        match by_chunk.get(&hit.chunk_id) {
            Some(&index) => {
                let result = &mut results[index];
                result.graph_score = hit.score;
                result
                    .taxonomy_references
                    .extend(hit.taxonomy_references.iter().cloned());
                dedup_references(&mut result.taxonomy_references);
            }
            None => {
                let index = results.len();
                results.push(SearchResult {
                    chunk_id: hit.chunk_id.clone(),
                    document_id: hit.document_id.clone(),
                    document_title: hit.document_title.clone(),
                    content: hit.content.clone(),
                    vector_score: 0.0,
                    graph_score: hit.score,
                    combined_score: 0.0,
                    taxonomy_references: hit.taxonomy_references.clone(),
                    metadata: hit.metadata.clone(),
                });
                by_chunk.insert(hit.chunk_id.clone(), index);
            }
        }
    }

    for result in &mut results {
        result.combined_score =
            result.vector_score * vector_weight + result.graph_score * graph_weight;
    }

    results.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(top_k);
    results
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::index::{DocumentMetadata, NewChunk};
    use crate::taxonomy::Taxonomy;

    fn vector_hit(chunk_id: &str, distance: f32) -> VectorHit {
        VectorHit {
            chunk_id: chunk_id.to_string(),
            document_id: "doc-1".to_string(),
            document_title: "Doc".to_string(),
            content: format!("content of {}", chunk_id),
            distance,
            taxonomy_references: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    fn graph_hit(chunk_id: &str, score: f32) -> GraphHit {
        GraphHit {
            chunk_id: chunk_id.to_string(),
            document_id: "doc-1".to_string(),
            document_title: "Doc".to_string(),
            content: format!("content of {}", chunk_id),
            score,
            taxonomy_references: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    // ------------------------------------------------------------------
    // combine_results
    // ------------------------------------------------------------------

    #[test]
    fn test_combine_weighted_sum() {
        // c1: vector 0.9, graph 0.6 → 0.6*0.9 + 0.4*0.6 = 0.78
        // c2: vector 0.2만 → 0.6*0.2 = 0.12
        let vector = vec![vector_hit("c1", 0.1), vector_hit("c2", 0.8)];
        let graph = vec![graph_hit("c1", 0.6)];

        let results = combine_results(&vector, &graph, 0.6, 0.4, 10);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_id, "c1");
        assert!((results[0].combined_score - 0.78).abs() < 1e-5);
        assert!((results[1].combined_score - 0.12).abs() < 1e-5);
    }

    #[test]
    fn test_combine_seven_three_scenario() {
        // c1: vector 0.9, graph 0.6 → 0.7*0.9 + 0.3*0.6 = 0.81
        // c2: graph 0.4만     → 0.3*0.4 = 0.12
        let vector = vec![vector_hit("c1", 0.1)];
        let graph = vec![graph_hit("c1", 0.6), graph_hit("c2", 0.4)];

        let results = combine_results(&vector, &graph, 0.7, 0.3, 10);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_id, "c1");
        assert!((results[0].combined_score - 0.81).abs() < 1e-5);
        assert_eq!(results[1].chunk_id, "c2");
        assert!((results[1].combined_score - 0.12).abs() < 1e-5);
    }

    #[test]
    fn test_combine_normalizes_weights() {
        let vector = vec![vector_hit("c1", 0.0)];
        let results = combine_results(&vector, &[], 3.0, 1.0, 10);

        // 3.0/4.0 * 1.0 = 0.75
        assert!((results[0].combined_score - 0.75).abs() < 1e-5);
    }

    #[test]
    fn test_combine_zero_weights_returns_empty() {
        let vector = vec![vector_hit("c1", 0.0)];
        let graph = vec![graph_hit("c2", 1.0)];
        assert!(combine_results(&vector, &graph, 0.0, 0.0, 10).is_empty());
    }

    #[test]
    fn test_vector_only_reproduces_vector_ranking() {
        let vector = vec![
            vector_hit("c1", 0.1),
            vector_hit("c2", 0.3),
            vector_hit("c3", 0.5),
        ];
        let graph = vec![graph_hit("c3", 3.0)];

        let results = combine_results(&vector, &graph, 1.0, 0.0, 10);
        let order: Vec<&str> = results.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(order, vec!["c1", "c2", "c3"]);
    }

    #[test]
    fn test_graph_only_hit_included() {
        let vector = vec![vector_hit("c1", 0.5)];
        let graph = vec![graph_hit("c9", 1.0)];

        let results = combine_results(&vector, &graph, 0.5, 0.5, 10);
        assert_eq!(results.len(), 2);

        let c9 = results.iter().find(|r| r.chunk_id == "c9").unwrap();
        assert_eq!(c9.vector_score, 0.0);
        assert_eq!(c9.graph_score, 1.0);
    }

    #[test]
    fn test_combine_truncates_to_top_k() {
        let vector: Vec<VectorHit> = (0..10)
            .map(|i| vector_hit(&format!("c{}", i), i as f32 * 0.05))
            .collect();

        let results = combine_results(&vector, &[], 1.0, 0.0, 3);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].chunk_id, "c0");
    }

    // ------------------------------------------------------------------
    // request validation
    // ------------------------------------------------------------------

    #[test]
    fn test_request_validation() {
        assert!(SearchRequest::new("query").validate().is_ok());

        let mut request = SearchRequest::new("   ");
        assert!(matches!(
            request.validate(),
            Err(RagError::InvalidParameter(_))
        ));

        request = SearchRequest::new("query");
        request.top_k = 0;
        assert!(matches!(
            request.validate(),
            Err(RagError::InvalidParameter(_))
        ));

        request = SearchRequest::new("query");
        request.vector_weight = -0.1;
        assert!(matches!(
            request.validate(),
            Err(RagError::InvalidParameter(_))
        ));
    }

    // ------------------------------------------------------------------
    // branch isolation (실제 스토어 + 실패하는 임베더)
    // ------------------------------------------------------------------

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        async fn embed(&self, _text: &str) -> crate::error::Result<Vec<f32>> {
            Err(RagError::Embedding("connection refused".into()))
        }

        fn dimension(&self) -> usize {
            8
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct FixedEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, _text: &str) -> crate::error::Result<Vec<f32>> {
            Ok(vec![0.1; 8])
        }

        fn dimension(&self) -> usize {
            8
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    async fn seeded_engine(
        dir: &std::path::Path,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> RetrievalEngine {
        use crate::index::graph::SqliteGraphStore;
        use crate::index::lance::LanceSimilarityIndex;

        let similarity = Arc::new(
            LanceSimilarityIndex::open(&dir.join("index.lance"), 8)
                .await
                .unwrap(),
        );
        let graph = Arc::new(SqliteGraphStore::open_in_memory().unwrap());
        graph.init_taxonomy(&Taxonomy::minimal()).await.unwrap();

        let metadata = DocumentMetadata::new("Strategy Doc", "text/plain");
        let refs = vec![TaxonomyReference::category("1", "Category 1")];

        similarity
            .add_document("doc-1", "full text", &metadata, &refs, &vec![0.1; 8])
            .await
            .unwrap();
        let chunk = NewChunk {
            content: "vision and direction matter".to_string(),
            chunk_index: 0,
            start_offset: 0,
            end_offset: 27,
            taxonomy_references: refs.clone(),
            embedding: vec![0.1; 8],
        };
        let chunk_ids = similarity
            .add_chunks(&[chunk.clone()], &metadata, "doc-1")
            .await
            .unwrap();

        graph.upsert_document("doc-1", &metadata, &refs).await.unwrap();
        graph
            .upsert_chunk(
                &chunk_ids[0],
                "doc-1",
                &chunk.content,
                chunk.start_offset,
                chunk.end_offset,
                &refs,
            )
            .await
            .unwrap();

        RetrievalEngine::new(embedder, similarity, graph, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_hybrid_search_returns_results() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = seeded_engine(dir.path(), Arc::new(FixedEmbedder)).await;

        let response = engine.search(&SearchRequest::new("vision")).await.unwrap();
        assert_eq!(response.mode, SearchMode::Hybrid);
        assert!(response.total_results >= 1);
        assert!(response.results[0].combined_score > 0.0);
    }

    #[tokio::test]
    async fn test_failing_vector_branch_degrades_to_graph_results() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = seeded_engine(dir.path(), Arc::new(FailingEmbedder)).await;

        // 임베딩 실패로 벡터 브랜치는 비지만, 그래프 브랜치 결과는 살아남는다
        let response = engine.search(&SearchRequest::new("vision")).await.unwrap();
        assert_eq!(response.total_results, 1);
        assert_eq!(response.results[0].vector_score, 0.0);
        assert!(response.results[0].graph_score > 0.0);
    }

    #[tokio::test]
    async fn test_graph_mode_only_queries_graph() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = seeded_engine(dir.path(), Arc::new(FailingEmbedder)).await;

        let mut request = SearchRequest::new("vision");
        request.mode = SearchMode::Graph;

        let response = engine.search(&request).await.unwrap();
        assert_eq!(response.total_results, 1);
        assert_eq!(response.results[0].vector_score, 0.0);
    }

    #[tokio::test]
    async fn test_invalid_request_rejected_before_search() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = seeded_engine(dir.path(), Arc::new(FixedEmbedder)).await;

        let mut request = SearchRequest::new("query");
        request.graph_weight = -1.0;
        assert!(matches!(
            engine.search(&request).await,
            Err(RagError::InvalidParameter(_))
        ));
    }
}
