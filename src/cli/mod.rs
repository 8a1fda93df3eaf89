//! CLI 모듈
//!
//! taxorag CLI 명령어 정의 및 구현

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::classify::{Classifier, KeywordClassifier, OllamaClassifier};
use crate::collector::{CollectionStats, CollectorConfig, FileCollector};
use crate::config::Settings;
use crate::embedding::{create_embedder, EmbeddingProvider};
use crate::extractor::FileExtractor;
use crate::index::graph::SqliteGraphStore;
use crate::index::lance::LanceSimilarityIndex;
use crate::index::{DocumentMetadata, GraphStore, NodeLabel, SearchFilter, SimilarityIndex};
use crate::pipeline::{
    DualStoreWriter, FileStorage, IngestRequest, IngestionPipeline, PipelineConfig, TaskState,
};
use crate::retrieval::{RetrievalEngine, SearchMode, SearchRequest};
use crate::taxonomy::{Taxonomy, TaxonomyReference};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "taxorag")]
#[command(version, about = "분류체계 기반 하이브리드 GraphRAG 문서 시스템", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 파일 또는 폴더를 수집하여 듀얼 스토어에 저장
    Ingest {
        /// 수집할 파일 경로
        #[arg(long)]
        file: Option<PathBuf>,

        /// 수집할 폴더 경로 (재귀)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// 문서 제목 (단일 파일일 때만, 기본값은 파일명)
        #[arg(short, long)]
        title: Option<String>,

        /// 작성자 메타데이터
        #[arg(short, long)]
        author: Option<String>,

        /// PDF 파일 건너뛰기
        #[arg(long)]
        skip_pdfs: bool,
    },

    /// 하이브리드 검색
    Search {
        /// 검색 쿼리
        query: String,

        /// 검색 모드: hybrid, vector, graph
        #[arg(short, long, default_value = "hybrid")]
        mode: String,

        /// 결과 개수 제한
        #[arg(short, long)]
        limit: Option<usize>,

        /// 벡터 브랜치 가중치
        #[arg(long, default_value = "0.6")]
        vector_weight: f32,

        /// 그래프 브랜치 가중치
        #[arg(long, default_value = "0.4")]
        graph_weight: f32,

        /// 카테고리 필터 (이름 동등 비교)
        #[arg(long)]
        category: Option<String>,

        /// 작성자 필터
        #[arg(long)]
        filter_author: Option<String>,

        /// 발행일 하한 (YYYY-MM-DD, 포함)
        #[arg(long)]
        published_after: Option<String>,

        /// 발행일 상한 (YYYY-MM-DD, 포함)
        #[arg(long)]
        published_before: Option<String>,

        /// 분류체계 제약 (id 경로: 카테고리[/하위분류[/기준]], 그래프 브랜치에 적용)
        #[arg(long)]
        taxonomy: Option<String>,
    },

    /// 문서 삭제 (두 스토어 모두)
    Delete {
        /// 삭제할 문서 id
        id: String,
    },

    /// 분류체계 초기화 (JSON 파일 또는 기본 분류체계)
    InitTaxonomy {
        /// 분류체계 JSON 파일 경로
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// 시스템 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Ingest {
            file,
            dir,
            title,
            author,
            skip_pdfs,
        } => cmd_ingest(file, dir, title, author, skip_pdfs).await,
        Commands::Search {
            query,
            mode,
            limit,
            vector_weight,
            graph_weight,
            category,
            filter_author,
            published_after,
            published_before,
            taxonomy,
        } => {
            cmd_search(
                &query,
                &mode,
                limit,
                vector_weight,
                graph_weight,
                category,
                filter_author,
                published_after,
                published_before,
                taxonomy,
            )
            .await
        }
        Commands::Delete { id } => cmd_delete(&id).await,
        Commands::InitTaxonomy { file } => cmd_init_taxonomy(file).await,
        Commands::Status => cmd_status().await,
    }
}

// ============================================================================
// App Context
// ============================================================================

/// 명령어가 공유하는 스토어/설정 묶음
struct AppContext {
    settings: Settings,
    taxonomy: Taxonomy,
    similarity: Arc<LanceSimilarityIndex>,
    graph: Arc<SqliteGraphStore>,
}

impl AppContext {
    /// 데이터 디렉토리의 스토어를 열고 분류체계를 로드
    async fn open() -> Result<Self> {
        let settings = Settings::from_env();

        let taxonomy_path = settings.data_dir.join("taxonomy.json");
        let taxonomy = if taxonomy_path.exists() {
            Taxonomy::from_file(&taxonomy_path).context("분류체계 파일 로드 실패")?
        } else {
            Taxonomy::minimal()
        };

        let similarity = Arc::new(
            LanceSimilarityIndex::open(
                &settings.data_dir.join("index.lance"),
                settings.embedding_dimension,
            )
            .await
            .context("유사도 인덱스 열기 실패")?,
        );

        let graph = Arc::new(
            SqliteGraphStore::open(&settings.data_dir.join("graph.db"))
                .context("그래프 스토어 열기 실패")?,
        );

        // upsert 의미론이므로 매 실행 초기화해도 안전
        graph
            .init_taxonomy(&taxonomy)
            .await
            .context("분류체계 노드 초기화 실패")?;

        Ok(Self {
            settings,
            taxonomy,
            similarity,
            graph,
        })
    }

    fn writer(&self) -> DualStoreWriter {
        DualStoreWriter::new(
            Arc::clone(&self.similarity) as Arc<dyn SimilarityIndex>,
            Arc::clone(&self.graph) as Arc<dyn GraphStore>,
        )
    }

    fn embedder(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        let embedder = create_embedder(&self.settings).context("임베딩 제공자 초기화 실패")?;
        Ok(Arc::new(embedder))
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 문서 수집 명령어 (ingest)
///
/// 파일/폴더를 수집하여 파이프라인에 등록하고 완료까지 대기합니다.
async fn cmd_ingest(
    file: Option<PathBuf>,
    dir: Option<PathBuf>,
    title: Option<String>,
    author: Option<String>,
    skip_pdfs: bool,
) -> Result<()> {
    let ctx = AppContext::open().await?;

    // 파일 수집
    let collector = FileCollector::new(CollectorConfig {
        skip_pdfs,
        ..Default::default()
    });

    let files = if let Some(ref file_path) = file {
        match collector.collect_file(file_path)? {
            Some(f) => vec![f],
            None => {
                println!("[!] 지원하지 않는 파일 형식: {:?}", file_path);
                return Ok(());
            }
        }
    } else if let Some(ref dir_path) = dir {
        collector.collect_directory(dir_path)?
    } else {
        bail!("--file 또는 --dir를 지정해야 합니다");
    };

    if files.is_empty() {
        println!("[!] 수집할 파일이 없습니다.");
        return Ok(());
    }

    // 통계 표시
    let stats = CollectionStats::from_files(&files);
    println!("[*] 수집 대상: {} 파일", stats.total_files);
    println!(
        "    텍스트: {}, Markdown: {}, PDF: {}",
        stats.text_files, stats.markdown_files, stats.pdf_files
    );
    println!("    총 크기: {}", format_bytes(stats.total_size as usize));
    println!();

    // 파이프라인 구성 (CLASSIFIER_MODEL=keyword이면 LLM 없이 키워드 분류)
    let classifier: Arc<dyn Classifier> = if ctx.settings.classifier_model == "keyword" {
        Arc::new(KeywordClassifier::new(ctx.taxonomy.clone()))
    } else {
        Arc::new(
            OllamaClassifier::from_settings(&ctx.settings, ctx.taxonomy.clone())
                .context("분류기 초기화 실패")?,
        )
    };
    let storage = FileStorage::new(&ctx.settings.data_dir, &ctx.taxonomy)
        .context("파일 저장소 초기화 실패")?;

    let pipeline = IngestionPipeline::new(
        PipelineConfig::from_settings(&ctx.settings),
        Arc::new(FileExtractor::new()),
        classifier,
        ctx.embedder()?,
        ctx.writer(),
        Some(storage.clone()),
    )
    .context("파이프라인 초기화 실패")?;

    // 등록
    let mut document_ids = Vec::with_capacity(files.len());
    for collected in &files {
        let file_name = collected
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");

        let document_title = if files.len() == 1 {
            title.clone().unwrap_or_else(|| file_name.to_string())
        } else {
            file_name.to_string()
        };

        let mut metadata = DocumentMetadata::new(document_title, collected.file_type.mimetype());
        metadata.author = author.clone();
        metadata.source_path = Some(collected.path.display().to_string());

        let stored_path = match storage.save_raw(&collected.path) {
            Ok(path) => Some(path),
            Err(e) => {
                println!("[!] 원본 보관 실패 ({}): {}", file_name, e);
                None
            }
        };

        let document_id = uuid::Uuid::new_v4().to_string();
        pipeline.enqueue(IngestRequest {
            document_id: document_id.clone(),
            path: collected.path.clone(),
            file_type: collected.file_type,
            metadata,
            stored_path,
        })?;

        document_ids.push((document_id, file_name.to_string()));
    }

    // 완료 대기 + 진행 표시
    let mut success_count = 0;
    let mut error_count = 0;

    for (document_id, file_name) in &document_ids {
        let mut last_message = String::new();
        loop {
            let Some(task) = pipeline.get_status(document_id) else {
                break;
            };

            if task.message != last_message {
                println!("[{}] {}% {}", file_name, task.progress, task.message);
                last_message = task.message.clone();
            }

            match task.state {
                TaskState::Completed => {
                    success_count += 1;
                    break;
                }
                TaskState::Failed => {
                    println!(
                        "[!] {} 실패: {}",
                        file_name,
                        task.error.as_deref().unwrap_or("unknown error")
                    );
                    error_count += 1;
                    break;
                }
                _ => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }
    }

    pipeline.shutdown().await;

    println!();
    println!("[OK] 완료: 성공 {}, 실패 {}", success_count, error_count);

    Ok(())
}

/// 검색 명령어 (search)
#[allow(clippy::too_many_arguments)]
async fn cmd_search(
    query: &str,
    mode: &str,
    limit: Option<usize>,
    vector_weight: f32,
    graph_weight: f32,
    category: Option<String>,
    filter_author: Option<String>,
    published_after: Option<String>,
    published_before: Option<String>,
    taxonomy_path: Option<String>,
) -> Result<()> {
    let ctx = AppContext::open().await?;

    let mode = parse_mode(mode)?;

    let filter = SearchFilter {
        category,
        author: filter_author,
        published_after,
        published_before,
    };

    let taxonomy = match taxonomy_path {
        Some(ref path) => Some(parse_taxonomy(&ctx.taxonomy, path)?),
        None => None,
    };

    let request = SearchRequest {
        query: query.to_string(),
        mode,
        top_k: limit.unwrap_or(ctx.settings.top_k),
        vector_weight,
        graph_weight,
        filter: if filter.is_empty() { None } else { Some(filter) },
        taxonomy,
    };

    println!("[*] 검색 중 ({}): \"{}\"", mode.as_str(), query);

    let engine = RetrievalEngine::new(
        ctx.embedder()?,
        Arc::clone(&ctx.similarity) as Arc<dyn SimilarityIndex>,
        Arc::clone(&ctx.graph) as Arc<dyn GraphStore>,
        ctx.settings.search_timeout,
    );

    let response = engine.search(&request).await.context("검색 실패")?;

    if response.results.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!(
        "\n[OK] 검색 결과 ({} 건, {} ms):\n",
        response.total_results, response.execution_time_ms
    );

    for (i, result) in response.results.iter().enumerate() {
        println!(
            "{}. [점수: {:.4}] [벡터: {:.4} | 그래프: {:.4}] {}",
            i + 1,
            result.combined_score,
            result.vector_score,
            result.graph_score,
            result.document_title
        );
        println!("   문서: {}", result.document_id);

        if !result.taxonomy_references.is_empty() {
            let refs: Vec<String> = result
                .taxonomy_references
                .iter()
                .map(|r| r.most_specific().1.to_string())
                .collect();
            println!("   분류: {}", refs.join(", "));
        }

        println!("   내용: {}", truncate_text(&result.content, 200));
        println!();
    }

    Ok(())
}

/// 삭제 명령어 (delete)
async fn cmd_delete(document_id: &str) -> Result<()> {
    let ctx = AppContext::open().await?;

    let deleted = ctx
        .writer()
        .delete_document(document_id)
        .await
        .context("문서 삭제 실패")?;

    if deleted > 0 {
        println!("[OK] 문서 {} 삭제됨 ({} 레코드)", document_id, deleted);
    } else {
        println!("[!] 삭제할 문서를 찾을 수 없습니다");
    }

    Ok(())
}

/// 분류체계 초기화 명령어 (init-taxonomy)
async fn cmd_init_taxonomy(file: Option<PathBuf>) -> Result<()> {
    let settings = Settings::from_env();

    let taxonomy = match file {
        Some(ref path) => Taxonomy::from_file(path).context("분류체계 파일 로드 실패")?,
        None => Taxonomy::minimal(),
    };

    // 데이터 디렉토리에 보관 (이후 실행에서 로드)
    std::fs::create_dir_all(&settings.data_dir)?;
    let target = settings.data_dir.join("taxonomy.json");
    let json = serde_json::to_string_pretty(&taxonomy)?;
    std::fs::write(&target, json)?;

    let ctx = AppContext::open().await?;

    let categories = ctx.graph.node_count(NodeLabel::Category).await?;
    let subcategories = ctx.graph.node_count(NodeLabel::Subcategory).await?;
    let criteria = ctx.graph.node_count(NodeLabel::Criterion).await?;

    println!("[OK] 분류체계 초기화 완료: {}", target.display());
    println!(
        "     카테고리: {}, 하위분류: {}, 기준: {}",
        categories, subcategories, criteria
    );

    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status() -> Result<()> {
    println!("taxorag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    let ctx = AppContext::open().await?;

    println!("[*] 데이터 디렉토리: {}", ctx.settings.data_dir.display());
    println!("[*] Ollama: {}", ctx.settings.ollama_base_url);
    println!(
        "    임베딩: {} ({}차원), 분류: {}",
        ctx.settings.embedding_model,
        ctx.settings.embedding_dimension,
        ctx.settings.classifier_model
    );
    println!("[*] 분류체계: {} 카테고리", ctx.taxonomy.categories.len());

    match ctx.similarity.document_count().await {
        Ok(documents) => {
            let chunks = ctx.similarity.chunk_count().await.unwrap_or(0);
            println!("[OK] 유사도 인덱스: {} 문서, {} 청크", documents, chunks);
        }
        Err(e) => println!("[!] 유사도 인덱스 조회 실패: {}", e),
    }

    match ctx.graph.node_count(NodeLabel::Document).await {
        Ok(documents) => {
            let chunks = ctx.graph.node_count(NodeLabel::Chunk).await.unwrap_or(0);
            println!("[OK] 그래프 스토어: {} 문서 노드, {} 청크 노드", documents, chunks);
        }
        Err(e) => println!("[!] 그래프 스토어 조회 실패: {}", e),
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 검색 모드 문자열 파싱
fn parse_mode(mode: &str) -> Result<SearchMode> {
    match mode.to_lowercase().as_str() {
        "hybrid" => Ok(SearchMode::Hybrid),
        "vector" => Ok(SearchMode::Vector),
        "graph" => Ok(SearchMode::Graph),
        other => bail!("알 수 없는 검색 모드: {} (hybrid|vector|graph)", other),
    }
}

/// 분류체계 id 경로 파싱 ("1", "1/1.1", "1/1.1/1.1.1")
///
/// 각 레벨의 id를 분류체계에서 조회하여 표시 이름까지 채운 참조를
/// 만듭니다. 알 수 없는 id는 에러입니다.
fn parse_taxonomy(taxonomy: &Taxonomy, path: &str) -> Result<TaxonomyReference> {
    let mut parts = path.split('/');

    let category_id = parts.next().unwrap_or_default();
    let category = taxonomy
        .category(category_id)
        .ok_or_else(|| anyhow::anyhow!("알 수 없는 카테고리 id: {}", category_id))?;
    let mut reference = TaxonomyReference::category(&category.id, &category.name);

    if let Some(subcategory_id) = parts.next() {
        let subcategory = category
            .subcategories
            .iter()
            .find(|s| s.id == subcategory_id)
            .ok_or_else(|| anyhow::anyhow!("알 수 없는 하위분류 id: {}", subcategory_id))?;
        reference = reference.with_subcategory(&subcategory.id, &subcategory.name);

        if let Some(criterion_id) = parts.next() {
            let criterion = subcategory
                .criteria
                .iter()
                .find(|c| c.id == criterion_id)
                .ok_or_else(|| anyhow::anyhow!("알 수 없는 기준 id: {}", criterion_id))?;
            reference = reference.with_criterion(&criterion.id, &criterion.name);
        }
    }

    Ok(reference)
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 5), "hello...");
        assert_eq!(truncate_text("hello\nworld", 20), "hello world");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }

    #[test]
    fn test_truncate_unicode() {
        let korean = "안녕하세요 세계";
        let truncated = truncate_text(korean, 5);
        assert_eq!(truncated, "안녕하세요...");
    }

    #[test]
    fn test_parse_taxonomy_path() {
        let taxonomy = Taxonomy::from_json(
            r#"{
                "categories": [{
                    "id": "1",
                    "name": "Leadership",
                    "subcategories": [{
                        "id": "1.1",
                        "name": "Vision",
                        "criteria": [{"id": "1.1.1", "name": "Direction"}]
                    }]
                }]
            }"#,
        )
        .unwrap();

        let cat = parse_taxonomy(&taxonomy, "1").unwrap();
        assert_eq!(cat.category_name, "Leadership");
        assert!(cat.subcategory_id.is_none());

        let full = parse_taxonomy(&taxonomy, "1/1.1/1.1.1").unwrap();
        assert_eq!(full.criterion_name.as_deref(), Some("Direction"));

        assert!(parse_taxonomy(&taxonomy, "9").is_err());
        assert!(parse_taxonomy(&taxonomy, "1/9.9").is_err());
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("hybrid").unwrap(), SearchMode::Hybrid);
        assert_eq!(parse_mode("VECTOR").unwrap(), SearchMode::Vector);
        assert!(parse_mode("fulltext").is_err());
    }
}
