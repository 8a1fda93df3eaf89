//! 듀얼 스토어 writer
//!
//! 유사도 인덱스와 그래프 스토어에 같은 문서를 순서대로 투영합니다.
//! 두 스토어 간 원자성은 보장하지 않습니다. 후반 쓰기가 실패하면
//! 이미 완료된 전반 쓰기는 남아 있고, 실패는 태스크 에러로 드러납니다.
//!
//! 파이프라인은 진행률 보고를 위해 단계별 절반 연산 4개를 순서대로
//! 호출합니다. `write_document`/`write_chunks`는 그 합성입니다.

use std::sync::Arc;

use crate::error::Result;
use crate::index::{DocumentMetadata, GraphStore, NewChunk, SimilarityIndex};
use crate::taxonomy::TaxonomyReference;

/// 듀얼 스토어 writer
#[derive(Clone)]
pub struct DualStoreWriter {
    similarity: Arc<dyn SimilarityIndex>,
    graph: Arc<dyn GraphStore>,
}

impl DualStoreWriter {
    pub fn new(similarity: Arc<dyn SimilarityIndex>, graph: Arc<dyn GraphStore>) -> Self {
        Self { similarity, graph }
    }

    // ------------------------------------------------------------------
    // 단계별 절반 연산 (파이프라인 진행률 보고 단위)
    // ------------------------------------------------------------------

    /// 문서 벡터 저장 (유사도 인덱스)
    pub async fn write_document_vector(
        &self,
        document_id: &str,
        text: &str,
        metadata: &DocumentMetadata,
        references: &[TaxonomyReference],
        embedding: &[f32],
    ) -> Result<()> {
        self.similarity
            .add_document(document_id, text, metadata, references, embedding)
            .await
    }

    /// 청크 벡터 일괄 저장, 생성된 청크 id 반환
    pub async fn write_chunk_vectors(
        &self,
        chunks: &[NewChunk],
        metadata: &DocumentMetadata,
        document_id: &str,
    ) -> Result<Vec<String>> {
        self.similarity.add_chunks(chunks, metadata, document_id).await
    }

    /// 문서 노드 + 분류체계 엣지 (그래프 스토어)
    pub async fn write_document_node(
        &self,
        document_id: &str,
        metadata: &DocumentMetadata,
        references: &[TaxonomyReference],
    ) -> Result<()> {
        self.graph
            .upsert_document(document_id, metadata, references)
            .await
    }

    /// 청크 노드들 + HAS_CHUNK/RELATES_TO 엣지
    ///
    /// `chunk_ids`는 `write_chunk_vectors`가 반환한 id를 그대로 사용합니다.
    pub async fn write_chunk_nodes(
        &self,
        chunk_ids: &[String],
        chunks: &[NewChunk],
        document_id: &str,
    ) -> Result<()> {
        for (chunk_id, chunk) in chunk_ids.iter().zip(chunks.iter()) {
            self.graph
                .upsert_chunk(
                    chunk_id,
                    document_id,
                    &chunk.content,
                    chunk.start_offset,
                    chunk.end_offset,
                    &chunk.taxonomy_references,
                )
                .await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // 합성 연산
    // ------------------------------------------------------------------

    /// 문서 단위 쓰기: 벡터 → 그래프 노드
    pub async fn write_document(
        &self,
        document_id: &str,
        text: &str,
        metadata: &DocumentMetadata,
        references: &[TaxonomyReference],
        embedding: &[f32],
    ) -> Result<()> {
        self.write_document_vector(document_id, text, metadata, references, embedding)
            .await?;
        self.write_document_node(document_id, metadata, references)
            .await
    }

    /// 청크 일괄 쓰기: 벡터 → 그래프 노드, 청크 id 반환
    pub async fn write_chunks(
        &self,
        chunks: &[NewChunk],
        metadata: &DocumentMetadata,
        document_id: &str,
    ) -> Result<Vec<String>> {
        let chunk_ids = self.write_chunk_vectors(chunks, metadata, document_id).await?;
        self.write_chunk_nodes(&chunk_ids, chunks, document_id).await?;
        Ok(chunk_ids)
    }

    /// 문서를 두 스토어에서 모두 삭제, 삭제된 레코드 수 반환
    pub async fn delete_document(&self, document_id: &str) -> Result<usize> {
        let from_similarity = self.similarity.delete_document(document_id).await?;
        let from_graph = self.graph.delete_document(document_id).await?;
        Ok(from_similarity + from_graph)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::graph::SqliteGraphStore;
    use crate::index::lance::LanceSimilarityIndex;
    use crate::index::NodeLabel;
    use crate::taxonomy::Taxonomy;

    const DIM: usize = 8;

    async fn test_writer(dir: &std::path::Path) -> DualStoreWriter {
        let similarity = LanceSimilarityIndex::open(&dir.join("index.lance"), DIM)
            .await
            .unwrap();
        let graph = SqliteGraphStore::open_in_memory().unwrap();
        graph.init_taxonomy(&Taxonomy::minimal()).await.unwrap();

        DualStoreWriter::new(Arc::new(similarity), Arc::new(graph))
    }

    fn test_chunks(count: usize) -> Vec<NewChunk> {
        (0..count)
            .map(|i| NewChunk {
                content: format!("chunk {}", i),
                chunk_index: i,
                start_offset: i * 10,
                end_offset: i * 10 + 10,
                taxonomy_references: vec![TaxonomyReference::category("1", "Category 1")],
                embedding: vec![0.1; DIM],
            })
            .collect()
    }

    #[tokio::test]
    async fn test_write_document_populates_both_stores() {
        let dir = tempfile::TempDir::new().unwrap();
        let writer = test_writer(dir.path()).await;

        let metadata = DocumentMetadata::new("Doc", "text/plain");
        let refs = vec![TaxonomyReference::category("1", "Category 1")];

        writer
            .write_document("doc-1", "full text", &metadata, &refs, &vec![0.1; DIM])
            .await
            .unwrap();

        assert_eq!(writer.similarity.document_count().await.unwrap(), 1);
        assert_eq!(writer.graph.node_count(NodeLabel::Document).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_write_chunks_reuses_ids_in_graph() {
        let dir = tempfile::TempDir::new().unwrap();
        let writer = test_writer(dir.path()).await;

        let metadata = DocumentMetadata::new("Doc", "text/plain");
        let chunks = test_chunks(3);

        let chunk_ids = writer.write_chunks(&chunks, &metadata, "doc-1").await.unwrap();

        assert_eq!(chunk_ids.len(), 3);
        assert_eq!(writer.similarity.chunk_count().await.unwrap(), 3);
        assert_eq!(writer.graph.node_count(NodeLabel::Chunk).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_delete_document_clears_both_stores() {
        let dir = tempfile::TempDir::new().unwrap();
        let writer = test_writer(dir.path()).await;

        let metadata = DocumentMetadata::new("Doc", "text/plain");
        writer
            .write_document("doc-1", "text", &metadata, &[], &vec![0.1; DIM])
            .await
            .unwrap();
        writer
            .write_chunks(&test_chunks(2), &metadata, "doc-1")
            .await
            .unwrap();

        let deleted = writer.delete_document("doc-1").await.unwrap();
        assert!(deleted >= 5);
        assert_eq!(writer.similarity.chunk_count().await.unwrap(), 0);
        assert_eq!(writer.graph.node_count(NodeLabel::Chunk).await.unwrap(), 0);
    }
}
