//! taxorag - 분류체계 기반 하이브리드 GraphRAG 문서 시스템
//!
//! LanceDB 유사도 인덱스 + SQLite 분류체계 그래프를 결합한
//! 하이브리드 검색 시스템입니다. 문서는 수집 파이프라인을 거쳐
//! 추출 → 분류 → 분할 → 임베딩 후 두 스토어에 함께 저장됩니다.

pub mod classify;
pub mod cli;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod index;
pub mod pipeline;
pub mod retrieval;
pub mod splitter;
pub mod taxonomy;

// Re-exports
pub use classify::{Classifier, DocumentAnalysis, KeywordClassifier, OllamaClassifier};
pub use config::{get_data_dir, Settings};
pub use embedding::{create_embedder, EmbeddingProvider, OllamaEmbedding};
pub use error::{RagError, Result};
pub use index::{
    DocumentMetadata, GraphChunkQuery, GraphHit, GraphStore, NewChunk, SearchFilter,
    SimilarityIndex, VectorHit,
};
pub use pipeline::{
    DualStoreWriter, FileStorage, IngestRequest, IngestionPipeline, PipelineConfig,
    ProcessingTask, TaskState,
};
pub use retrieval::{
    combine_results, RetrievalEngine, SearchMode, SearchRequest, SearchResponse, SearchResult,
};
pub use splitter::{splitter_for_mimetype, SplitConfig, Splitter};
pub use taxonomy::{Taxonomy, TaxonomyLevel, TaxonomyReference};
