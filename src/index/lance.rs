//! LanceDB 유사도 인덱스
//!
//! 문서 벡터와 청크 벡터를 각각의 테이블에 저장합니다.
//! Apache Arrow 기반 columnar 저장으로 빠른 ANN 검색을 제공합니다.
//! ref: https://lancedb.github.io/lancedb/

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, Int64Array, RecordBatch,
    RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};

use crate::error::{RagError, Result};
use crate::taxonomy::TaxonomyReference;

use super::{DocumentMetadata, NewChunk, SearchFilter, SimilarityIndex, VectorHit};

/// 문서 벡터 테이블
const DOCUMENTS_TABLE: &str = "documents";
/// 청크 벡터 테이블
const CHUNKS_TABLE: &str = "chunks";

// ============================================================================
// LanceSimilarityIndex
// ============================================================================

/// LanceDB 기반 유사도 인덱스 구현
pub struct LanceSimilarityIndex {
    db: Connection,
    dimension: i32,
}

impl LanceSimilarityIndex {
    /// 인덱스 열기
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    /// * `dimension` - 임베딩 차원
    pub async fn open(path: &Path, dimension: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    RagError::StoreWrite(format!("failed to create lancedb directory: {}", e))
                })?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| RagError::StoreWrite("invalid path encoding".into()))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .map_err(|e| RagError::StoreWrite(format!("failed to connect to lancedb: {}", e)))?;

        Ok(Self {
            db,
            dimension: dimension as i32,
        })
    }

    /// 임베딩 필드 타입
    fn embedding_field(&self) -> Field {
        Field::new(
            "embedding",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                self.dimension,
            ),
            false,
        )
    }

    /// 문서 테이블 스키마
    fn documents_schema(&self) -> Schema {
        Schema::new(vec![
            Field::new("document_id", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("metadata_json", DataType::Utf8, false),
            Field::new("taxonomy_json", DataType::Utf8, false),
            self.embedding_field(),
        ])
    }

    /// 청크 테이블 스키마
    fn chunks_schema(&self) -> Schema {
        Schema::new(vec![
            Field::new("chunk_id", DataType::Utf8, false),
            Field::new("document_id", DataType::Utf8, false),
            Field::new("document_title", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("chunk_index", DataType::Int32, false),
            Field::new("start_offset", DataType::Int64, false),
            Field::new("end_offset", DataType::Int64, false),
            Field::new("taxonomy_json", DataType::Utf8, false),
            Field::new("author", DataType::Utf8, true),
            Field::new("category", DataType::Utf8, true),
            Field::new("published_date", DataType::Utf8, true),
            self.embedding_field(),
        ])
    }

    /// 임베딩 목록을 FixedSizeList 배열로 변환
    fn embeddings_to_array(&self, embeddings: &[&[f32]]) -> Result<FixedSizeListArray> {
        for embedding in embeddings {
            if embedding.len() != self.dimension as usize {
                return Err(RagError::StoreWrite(format!(
                    "embedding dimension mismatch: expected {}, got {}",
                    self.dimension,
                    embedding.len()
                )));
            }
        }

        let flat: Vec<f32> = embeddings.iter().flat_map(|e| e.iter().copied()).collect();
        let values = Float32Array::from(flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));

        FixedSizeListArray::try_new(field, self.dimension, Arc::new(values) as Arc<dyn Array>, None)
            .map_err(|e| RagError::StoreWrite(format!("failed to create embedding array: {}", e)))
    }

    /// 테이블 존재 여부 확인
    async fn table_exists(&self, name: &str) -> bool {
        self.db
            .table_names()
            .execute()
            .await
            .map(|names| names.iter().any(|n| n == name))
            .unwrap_or(false)
    }

    /// 배치를 테이블에 추가 (없으면 생성)
    async fn append_batch(&self, table_name: &str, batch: RecordBatch) -> Result<()> {
        let schema = batch.schema();

        if self.table_exists(table_name).await {
            let table = self
                .db
                .open_table(table_name)
                .execute()
                .await
                .map_err(|e| RagError::StoreWrite(format!("failed to open table: {}", e)))?;

            let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
            table
                .add(batches)
                .execute()
                .await
                .map_err(|e| RagError::StoreWrite(format!("failed to add rows: {}", e)))?;
        } else {
            let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
            self.db
                .create_table(table_name, batches)
                .execute()
                .await
                .map_err(|e| RagError::StoreWrite(format!("failed to create table: {}", e)))?;
        }

        Ok(())
    }

    /// 테이블 행 수
    async fn count_rows(&self, table_name: &str) -> Result<usize> {
        if !self.table_exists(table_name).await {
            return Ok(0);
        }

        let table = self
            .db
            .open_table(table_name)
            .execute()
            .await
            .map_err(|e| RagError::StoreQuery(format!("failed to open table: {}", e)))?;

        table
            .count_rows(None)
            .await
            .map_err(|e| RagError::StoreQuery(format!("failed to count rows: {}", e)))
    }

    /// 테이블에서 document_id 기준 삭제, 삭제된 행 수 반환
    async fn delete_from_table(&self, table_name: &str, document_id: &str) -> Result<usize> {
        if !self.table_exists(table_name).await {
            return Ok(0);
        }

        let table = self
            .db
            .open_table(table_name)
            .execute()
            .await
            .map_err(|e| RagError::StoreWrite(format!("failed to open table: {}", e)))?;

        let before = self.count_rows(table_name).await?;

        let filter = format!("document_id = '{}'", escape_literal(document_id));
        table
            .delete(&filter)
            .await
            .map_err(|e| RagError::StoreWrite(format!("failed to delete rows: {}", e)))?;

        let after = self.count_rows(table_name).await?;
        Ok(before.saturating_sub(after))
    }
}

#[async_trait]
impl SimilarityIndex for LanceSimilarityIndex {
    async fn add_document(
        &self,
        document_id: &str,
        text: &str,
        metadata: &DocumentMetadata,
        references: &[TaxonomyReference],
        embedding: &[f32],
    ) -> Result<()> {
        let metadata_json = serde_json::to_string(metadata)
            .map_err(|e| RagError::StoreWrite(format!("failed to serialize metadata: {}", e)))?;
        let taxonomy_json = serde_json::to_string(references)
            .map_err(|e| RagError::StoreWrite(format!("failed to serialize references: {}", e)))?;

        let embeddings = self.embeddings_to_array(&[embedding])?;

        let batch = RecordBatch::try_new(
            Arc::new(self.documents_schema()),
            vec![
                Arc::new(StringArray::from(vec![document_id])),
                Arc::new(StringArray::from(vec![metadata.title.as_str()])),
                Arc::new(StringArray::from(vec![text])),
                Arc::new(StringArray::from(vec![metadata_json.as_str()])),
                Arc::new(StringArray::from(vec![taxonomy_json.as_str()])),
                Arc::new(embeddings),
            ],
        )
        .map_err(|e| RagError::StoreWrite(format!("failed to create record batch: {}", e)))?;

        self.append_batch(DOCUMENTS_TABLE, batch).await
    }

    async fn add_chunks(
        &self,
        chunks: &[NewChunk],
        metadata: &DocumentMetadata,
        document_id: &str,
    ) -> Result<Vec<String>> {
        if chunks.is_empty() {
            return Ok(vec![]);
        }

        // 청크 id는 인덱스가 생성하고 그래프 스토어가 재사용한다
        let chunk_ids: Vec<String> = chunks
            .iter()
            .map(|_| format!("chunk-{}", uuid::Uuid::new_v4()))
            .collect();

        let taxonomy_jsons: Vec<String> = chunks
            .iter()
            .map(|c| serde_json::to_string(&c.taxonomy_references))
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| RagError::StoreWrite(format!("failed to serialize references: {}", e)))?;

        let embeddings: Vec<&[f32]> = chunks.iter().map(|c| c.embedding.as_slice()).collect();
        let embeddings = self.embeddings_to_array(&embeddings)?;

        let author: Vec<Option<&str>> = chunks
            .iter()
            .map(|_| metadata.author.as_deref())
            .collect();
        let category: Vec<Option<&str>> = chunks
            .iter()
            .map(|_| metadata.category.as_deref())
            .collect();
        let published: Vec<Option<&str>> = chunks
            .iter()
            .map(|_| metadata.published_date.as_deref())
            .collect();

        let batch = RecordBatch::try_new(
            Arc::new(self.chunks_schema()),
            vec![
                Arc::new(StringArray::from(
                    chunk_ids.iter().map(String::as_str).collect::<Vec<_>>(),
                )),
                Arc::new(StringArray::from(vec![document_id; chunks.len()])),
                Arc::new(StringArray::from(vec![
                    metadata.title.as_str();
                    chunks.len()
                ])),
                Arc::new(StringArray::from(
                    chunks.iter().map(|c| c.content.as_str()).collect::<Vec<_>>(),
                )),
                Arc::new(Int32Array::from(
                    chunks.iter().map(|c| c.chunk_index as i32).collect::<Vec<_>>(),
                )),
                Arc::new(Int64Array::from(
                    chunks.iter().map(|c| c.start_offset as i64).collect::<Vec<_>>(),
                )),
                Arc::new(Int64Array::from(
                    chunks.iter().map(|c| c.end_offset as i64).collect::<Vec<_>>(),
                )),
                Arc::new(StringArray::from(
                    taxonomy_jsons.iter().map(String::as_str).collect::<Vec<_>>(),
                )),
                Arc::new(StringArray::from(author)),
                Arc::new(StringArray::from(category)),
                Arc::new(StringArray::from(published)),
                Arc::new(embeddings),
            ],
        )
        .map_err(|e| RagError::StoreWrite(format!("failed to create record batch: {}", e)))?;

        self.append_batch(CHUNKS_TABLE, batch).await?;
        Ok(chunk_ids)
    }

    async fn query_chunks(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<VectorHit>> {
        if !self.table_exists(CHUNKS_TABLE).await {
            return Ok(vec![]);
        }

        let table = self
            .db
            .open_table(CHUNKS_TABLE)
            .execute()
            .await
            .map_err(|e| RagError::StoreQuery(format!("failed to open chunks table: {}", e)))?;

        let mut query = table
            .vector_search(embedding.to_vec())
            .map_err(|e| RagError::StoreQuery(format!("failed to create vector search: {}", e)))?
            .limit(top_k);

        if let Some(sql) = filter.and_then(filter_to_sql) {
            query = query.only_if(sql);
        }

        let results = query
            .execute()
            .await
            .map_err(|e| RagError::StoreQuery(format!("failed to execute vector search: {}", e)))?;

        use futures::TryStreamExt;
        let batches: Vec<RecordBatch> = results
            .try_collect()
            .await
            .map_err(|e| RagError::StoreQuery(format!("failed to collect results: {}", e)))?;

        let mut hits = Vec::new();

        for batch in batches {
            let chunk_ids = string_column(&batch, "chunk_id")?;
            let document_ids = string_column(&batch, "document_id")?;
            let titles = string_column(&batch, "document_title")?;
            let contents = string_column(&batch, "content")?;
            let taxonomy_jsons = string_column(&batch, "taxonomy_json")?;
            let authors = string_column(&batch, "author")?;
            let categories = string_column(&batch, "category")?;
            let published = string_column(&batch, "published_date")?;

            // _distance 컬럼 (LanceDB가 자동 추가)
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| RagError::StoreQuery("missing _distance column".into()))?;

            for i in 0..batch.num_rows() {
                let taxonomy_references: Vec<TaxonomyReference> =
                    serde_json::from_str(taxonomy_jsons.value(i)).unwrap_or_default();

                let mut metadata = HashMap::new();
                metadata.insert("title".to_string(), titles.value(i).to_string());
                if !authors.is_null(i) {
                    metadata.insert("author".to_string(), authors.value(i).to_string());
                }
                if !categories.is_null(i) {
                    metadata.insert("category".to_string(), categories.value(i).to_string());
                }
                if !published.is_null(i) {
                    metadata.insert("published_date".to_string(), published.value(i).to_string());
                }

                hits.push(VectorHit {
                    chunk_id: chunk_ids.value(i).to_string(),
                    document_id: document_ids.value(i).to_string(),
                    document_title: titles.value(i).to_string(),
                    content: contents.value(i).to_string(),
                    distance: distances.value(i),
                    taxonomy_references,
                    metadata,
                });
            }
        }

        Ok(hits)
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize> {
        let from_documents = self.delete_from_table(DOCUMENTS_TABLE, document_id).await?;
        let from_chunks = self.delete_from_table(CHUNKS_TABLE, document_id).await?;
        Ok(from_documents + from_chunks)
    }

    async fn chunk_count(&self) -> Result<usize> {
        self.count_rows(CHUNKS_TABLE).await
    }

    async fn document_count(&self) -> Result<usize> {
        self.count_rows(DOCUMENTS_TABLE).await
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// SQL 문자열 리터럴 이스케이프
fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// 메타데이터 필터를 SQL WHERE 절로 변환
fn filter_to_sql(filter: &SearchFilter) -> Option<String> {
    if filter.is_empty() {
        return None;
    }

    let mut clauses = Vec::new();

    if let Some(ref category) = filter.category {
        clauses.push(format!("category = '{}'", escape_literal(category)));
    }
    if let Some(ref author) = filter.author {
        clauses.push(format!("author = '{}'", escape_literal(author)));
    }
    if let Some(ref after) = filter.published_after {
        clauses.push(format!("published_date >= '{}'", escape_literal(after)));
    }
    if let Some(ref before) = filter.published_before {
        clauses.push(format!("published_date <= '{}'", escape_literal(before)));
    }

    Some(clauses.join(" AND "))
}

/// 배치에서 문자열 컬럼 조회
fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| RagError::StoreQuery(format!("missing {} column", name)))
}

// ============================================================================
// Tests
// ============================================================================
