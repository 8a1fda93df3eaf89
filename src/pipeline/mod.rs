//! 수집 파이프라인
//!
//! 문서를 큐에 넣고 워커 풀이 추출 → 분류 → 분할 → 임베딩 → 듀얼 스토어
//! 쓰기를 순서대로 수행합니다. 진행 상황은 문서 id로 조회할 수 있습니다.
//!
//! 진행률 계약:
//! - 10% 추출, 20% 분석, 30% 분할, 40% 문서 임베딩, 50% 청크 임베딩,
//!   60/70% 벡터 쓰기, 80/90% 그래프 쓰기, 100% 완료
//! - 진행률 100은 Completed 상태에서만 나타납니다.
//! - 실패 시 진행률은 실패한 단계에서 고정됩니다.

pub mod storage;
pub mod task;
pub mod writer;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::classify::{Classifier, DocumentAnalysis};
use crate::collector::FileType;
use crate::config::Settings;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::extractor::TextExtractor;
use crate::index::{DocumentMetadata, NewChunk};
use crate::splitter::{splitter_for_mimetype, SplitConfig};

pub use storage::FileStorage;
pub use task::{ProcessingTask, TaskState};
pub use writer::DualStoreWriter;

// ============================================================================
// Pipeline Configuration
// ============================================================================

/// 파이프라인 설정
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// 워커 수 (최소 1)
    pub worker_count: usize,
    /// 분할 설정
    pub split: SplitConfig,
    /// 종결 태스크 보존 기간
    pub task_retention: Duration,
}

impl PipelineConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            worker_count: settings.worker_count,
            split: SplitConfig {
                chunk_size: settings.chunk_size,
                chunk_overlap: settings.chunk_overlap,
            },
            task_retention: settings.task_retention,
        }
    }
}

// ============================================================================
// Ingest Request
// ============================================================================

/// 수집 요청
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// 문서 id (호출자가 지정)
    pub document_id: String,
    /// 읽을 파일 경로
    pub path: PathBuf,
    /// 파일 타입
    pub file_type: FileType,
    /// 문서 메타데이터
    pub metadata: DocumentMetadata,
    /// raw 저장소에 보관된 사본 (분류 후 카테고리 디렉토리로 이동)
    pub stored_path: Option<PathBuf>,
}

// ============================================================================
// Ingestion Pipeline
// ============================================================================

type TaskMap = Arc<RwLock<HashMap<String, ProcessingTask>>>;

/// 워커가 공유하는 처리 문맥
struct ProcessContext {
    extractor: Arc<dyn TextExtractor>,
    classifier: Arc<dyn Classifier>,
    embedder: Arc<dyn EmbeddingProvider>,
    writer: DualStoreWriter,
    storage: Option<FileStorage>,
    split: SplitConfig,
    tasks: TaskMap,
}

impl ProcessContext {
    /// 태스크 진행 갱신
    fn progress(&self, document_id: &str, progress: u8, message: &str) {
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = tasks.get_mut(document_id) {
            task.update(progress, message);
        }
    }

    /// 태스크 실패 처리
    fn fail(&self, document_id: &str, error: String) {
        tracing::error!("Processing failed for {}: {}", document_id, error);
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = tasks.get_mut(document_id) {
            task.fail(error);
        }
    }

    /// 태스크 완료 처리
    fn complete(&self, document_id: &str) {
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = tasks.get_mut(document_id) {
            task.complete("Document processed successfully");
        }
    }
}

/// 수집 파이프라인
pub struct IngestionPipeline {
    tasks: TaskMap,
    sender: Mutex<Option<mpsc::UnboundedSender<IngestRequest>>>,
    workers: Mutex<Vec<tokio::task::JoinHandle<()>>>,
    task_retention: Duration,
}

impl IngestionPipeline {
    /// 파이프라인 생성 및 워커 기동
    pub fn new(
        config: PipelineConfig,
        extractor: Arc<dyn TextExtractor>,
        classifier: Arc<dyn Classifier>,
        embedder: Arc<dyn EmbeddingProvider>,
        writer: DualStoreWriter,
        storage: Option<FileStorage>,
    ) -> Result<Self> {
        // 분할 파라미터는 큐 투입 전에 검증
        config.split.validate()?;

        let tasks: TaskMap = Arc::new(RwLock::new(HashMap::new()));
        let (sender, receiver) = mpsc::unbounded_channel::<IngestRequest>();
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let context = Arc::new(ProcessContext {
            extractor,
            classifier,
            embedder,
            writer,
            storage,
            split: config.split.clone(),
            tasks: Arc::clone(&tasks),
        });

        let worker_count = config.worker_count.max(1);
        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let receiver = Arc::clone(&receiver);
            let context = Arc::clone(&context);
            workers.push(tokio::spawn(async move {
                worker_loop(worker_id, receiver, context).await;
            }));
        }

        tracing::info!("Ingestion pipeline started with {} workers", worker_count);

        Ok(Self {
            tasks,
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            task_retention: config.task_retention,
        })
    }

    /// 문서를 큐에 등록
    ///
    /// 같은 문서 id로 다시 등록하면 이전 태스크 기록을 대체합니다.
    /// 등록 시 보존 기간이 지난 종결 태스크를 함께 정리합니다.
    pub fn enqueue(&self, request: IngestRequest) -> Result<ProcessingTask> {
        self.evict_expired();

        let task = ProcessingTask::queued(&request.document_id);

        {
            let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
            let sender = sender
                .as_ref()
                .ok_or_else(|| RagError::InvalidParameter("pipeline is shut down".into()))?;
            sender
                .send(request)
                .map_err(|_| RagError::InvalidParameter("pipeline is shut down".into()))?;
        }

        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        tasks.insert(task.document_id.clone(), task.clone());

        Ok(task)
    }

    /// 문서 id로 태스크 상태 조회
    pub fn get_status(&self, document_id: &str) -> Option<ProcessingTask> {
        let tasks = self.tasks.read().unwrap_or_else(PoisonError::into_inner);
        tasks.get(document_id).cloned()
    }

    /// 전체 태스크 목록 (생성 시각 순)
    pub fn list_tasks(&self) -> Vec<ProcessingTask> {
        let tasks = self.tasks.read().unwrap_or_else(PoisonError::into_inner);
        let mut list: Vec<ProcessingTask> = tasks.values().cloned().collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        list
    }

    /// 보존 기간이 지난 종결 태스크 제거
    fn evict_expired(&self) {
        let retention = match chrono::Duration::from_std(self.task_retention) {
            Ok(d) => d,
            Err(_) => return,
        };
        let now = chrono::Utc::now();

        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|_, task| {
            !(task.state.is_terminal() && now - task.updated_at > retention)
        });
    }

    /// 큐를 닫고 남은 작업이 끝날 때까지 대기
    pub async fn shutdown(&self) {
        {
            let mut sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
            sender.take();
        }

        let handles: Vec<_> = {
            let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
            workers.drain(..).collect()
        };

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!("Worker task join failed: {}", e);
            }
        }

        tracing::info!("Ingestion pipeline shut down");
    }
}

// ============================================================================
// Worker
// ============================================================================

/// 워커 루프: 큐에서 요청을 꺼내 순서대로 처리
async fn worker_loop(
    worker_id: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<IngestRequest>>>,
    context: Arc<ProcessContext>,
) {
    tracing::debug!("Worker {} started", worker_id);

    loop {
        // 락은 recv 동안만 유지 (FIFO 보장, 처리 중에는 다른 워커가 수신)
        let request = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };

        match request {
            Some(request) => {
                let document_id = request.document_id.clone();
                tracing::info!("Worker {} processing document {}", worker_id, document_id);
                process_document(&context, request).await;
            }
            None => break,
        }
    }

    tracing::debug!("Worker {} stopped", worker_id);
}

/// 문서 하나를 끝까지 처리
async fn process_document(ctx: &ProcessContext, request: IngestRequest) {
    let document_id = request.document_id.clone();
    let mut metadata = request.metadata.clone();

    {
        let mut tasks = ctx.tasks.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = tasks.get_mut(&document_id) {
            task.begin();
        }
    }

    // 1. 텍스트 추출 (실패는 치명적)
    ctx.progress(&document_id, 10, "Extracting text from document");
    let extracted = match ctx.extractor.extract(&request.path, request.file_type).await {
        Ok(content) => content,
        Err(e) => return ctx.fail(&document_id, e.to_string()),
    };
    let text = extracted.text;

    // 2. 문서 분석 (실패는 빈 분석으로 degrade)
    ctx.progress(&document_id, 20, "Analyzing document content");
    let analysis = match ctx.classifier.analyze(&text, &document_id).await {
        Ok(analysis) => analysis,
        Err(e) => {
            tracing::warn!(
                "Classification failed for {}, continuing without analysis: {}",
                document_id,
                e
            );
            DocumentAnalysis::default()
        }
    };

    if metadata.category.is_none() {
        metadata.category = analysis
            .taxonomy_references
            .first()
            .map(|r| r.category_name.clone());
    }
    if metadata.description.is_none() {
        metadata.description = analysis.summary.clone();
    }

    // 3. 청크 분할
    ctx.progress(&document_id, 30, "Splitting document into chunks");
    let splitter = splitter_for_mimetype(&metadata.mimetype, ctx.split.clone());
    let pieces = match splitter.split(&text) {
        Ok(pieces) => pieces,
        Err(e) => return ctx.fail(&document_id, e.to_string()),
    };
    let offsets = assign_offsets(&text, &pieces, splitter.emits_substrings(), &ctx.split);

    // 4. 문서 임베딩
    ctx.progress(&document_id, 40, "Creating document embedding");
    let document_embedding = match ctx.embedder.embed(&text).await {
        Ok(embedding) => embedding,
        Err(e) => return ctx.fail(&document_id, e.to_string()),
    };

    // 5. 청크 임베딩
    ctx.progress(&document_id, 50, "Creating chunk embeddings");
    let chunk_embeddings = match ctx.embedder.embed_batch(&pieces).await {
        Ok(embeddings) => embeddings,
        Err(e) => return ctx.fail(&document_id, e.to_string()),
    };

    let chunks: Vec<NewChunk> = pieces
        .into_iter()
        .zip(offsets)
        .zip(chunk_embeddings)
        .enumerate()
        .map(|(index, ((content, (start, end)), embedding))| NewChunk {
            content,
            chunk_index: index,
            start_offset: start,
            end_offset: end,
            taxonomy_references: analysis.taxonomy_references.clone(),
            embedding,
        })
        .collect();

    // 6~7. 유사도 인덱스 쓰기
    ctx.progress(&document_id, 60, "Storing document in vector index");
    if let Err(e) = ctx
        .writer
        .write_document_vector(
            &document_id,
            &text,
            &metadata,
            &analysis.taxonomy_references,
            &document_embedding,
        )
        .await
    {
        return ctx.fail(&document_id, e.to_string());
    }

    ctx.progress(&document_id, 70, "Storing chunks in vector index");
    let chunk_ids = match ctx
        .writer
        .write_chunk_vectors(&chunks, &metadata, &document_id)
        .await
    {
        Ok(ids) => ids,
        Err(e) => return ctx.fail(&document_id, e.to_string()),
    };

    // 8~9. 그래프 쓰기 (벡터 쓰기는 이미 반영된 상태)
    ctx.progress(&document_id, 80, "Creating document node in graph");
    if let Err(e) = ctx
        .writer
        .write_document_node(&document_id, &metadata, &analysis.taxonomy_references)
        .await
    {
        return ctx.fail(&document_id, e.to_string());
    }

    ctx.progress(&document_id, 90, "Creating chunk nodes in graph");
    if let Err(e) = ctx
        .writer
        .write_chunk_nodes(&chunk_ids, &chunks, &document_id)
        .await
    {
        return ctx.fail(&document_id, e.to_string());
    }

    // 원본 사본은 성공 경로에서만 카테고리 디렉토리로 이동합니다.
    // 중간 단계가 실패한 문서의 사본은 raw/에 남습니다.
    if let (Some(file_storage), Some(stored)) = (&ctx.storage, &request.stored_path) {
        if let Some(category_id) = analysis.taxonomy_references.first().map(|r| &r.category_id) {
            match file_storage.move_to_category(stored, category_id) {
                Ok(new_path) => {
                    // 문서 노드는 upsert이므로 최종 경로로 갱신
                    metadata.source_path = Some(new_path.display().to_string());
                    if let Err(e) = ctx
                        .writer
                        .write_document_node(&document_id, &metadata, &analysis.taxonomy_references)
                        .await
                    {
                        return ctx.fail(&document_id, e.to_string());
                    }
                }
                Err(e) => return ctx.fail(&document_id, e.to_string()),
            }
        }
    }

    ctx.complete(&document_id);
    tracing::info!(
        "Document {} processed: {} chunks",
        document_id,
        chunk_ids.len()
    );
}

// ============================================================================
// Offset Assignment
// ============================================================================

/// 각 청크의 원문 문자 오프셋 계산
///
/// 연속 부분 문자열을 내보내는 전략은 전방 탐색으로 정확한 오프셋을
/// 복원합니다. 텍스트를 재작성하는 전략(또는 탐색 실패 시)은
/// `i * (chunk_size - overlap)` 근사식을 사용합니다.
fn assign_offsets(
    text: &str,
    pieces: &[String],
    substrings: bool,
    split: &SplitConfig,
) -> Vec<(usize, usize)> {
    let stride = split.chunk_size.saturating_sub(split.chunk_overlap);
    let mut offsets = Vec::with_capacity(pieces.len());
    let mut cursor_byte = 0usize;

    for (i, piece) in pieces.iter().enumerate() {
        let found = if substrings {
            text.get(cursor_byte..).and_then(|tail| tail.find(piece.as_str()))
        } else {
            None
        };

        match found {
            Some(pos) => {
                let abs_byte = cursor_byte + pos;
                let start = text[..abs_byte].chars().count();
                let end = start + piece.chars().count();
                offsets.push((start, end));

                // 오버랩 때문에 다음 탐색은 한 글자만 전진
                if let Some(first) = piece.chars().next() {
                    cursor_byte = abs_byte + first.len_utf8();
                }
            }
            None => {
                let start = i * stride;
                offsets.push((start, start + piece.chars().count()));
            }
        }
    }

    offsets
}

// ============================================================================
// Tests
// ============================================================================
