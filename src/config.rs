//! 설정 모듈
//!
//! 환경변수 기반 설정을 제공합니다. 모든 값에 합리적인 기본값이 있어
//! 환경변수 없이도 로컬에서 바로 동작합니다.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.taxorag/)
///
/// `TAXORAG_DATA_DIR` 환경변수로 재정의할 수 있습니다.
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TAXORAG_DATA_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }

    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".taxorag")
}

// ============================================================================
// Settings
// ============================================================================

/// 애플리케이션 설정
#[derive(Debug, Clone)]
pub struct Settings {
    /// 데이터 디렉토리 (인덱스, 문서 저장소)
    pub data_dir: PathBuf,
    /// 청크 최대 크기 (문자 수)
    pub chunk_size: usize,
    /// 청크 간 오버랩 (문자 수)
    pub chunk_overlap: usize,
    /// 수집 워커 수
    pub worker_count: usize,
    /// 검색 기본 결과 수
    pub top_k: usize,
    /// Ollama API 베이스 URL
    pub ollama_base_url: String,
    /// 임베딩 모델 이름
    pub embedding_model: String,
    /// 분류(엔티티) 모델 이름
    pub classifier_model: String,
    /// 임베딩 차원
    pub embedding_dimension: usize,
    /// 하이브리드 검색 브랜치별 타임아웃
    pub search_timeout: Duration,
    /// 완료/실패 태스크 보존 기간 (이후 enqueue 시 정리됨)
    pub task_retention: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: get_data_dir(),
            chunk_size: 1000,
            chunk_overlap: 200,
            worker_count: 2,
            top_k: 10,
            ollama_base_url: "http://localhost:11434".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            classifier_model: "llama3".to_string(),
            embedding_dimension: 768,
            search_timeout: Duration::from_secs(30),
            task_retention: Duration::from_secs(3600),
        }
    }
}

impl Settings {
    /// 환경변수에서 설정 로드 (없는 값은 기본값)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            data_dir: get_data_dir(),
            chunk_size: env_parse("CHUNK_SIZE", defaults.chunk_size),
            chunk_overlap: env_parse("CHUNK_OVERLAP", defaults.chunk_overlap),
            worker_count: env_parse("TAXORAG_WORKERS", defaults.worker_count),
            top_k: env_parse("TOP_K", defaults.top_k),
            ollama_base_url: env_string("OLLAMA_BASE_URL", &defaults.ollama_base_url),
            embedding_model: env_string("EMBEDDING_MODEL", &defaults.embedding_model),
            classifier_model: env_string("CLASSIFIER_MODEL", &defaults.classifier_model),
            embedding_dimension: env_parse("EMBEDDING_DIMENSION", defaults.embedding_dimension),
            search_timeout: Duration::from_secs(env_parse(
                "TAXORAG_SEARCH_TIMEOUT_SECS",
                defaults.search_timeout.as_secs(),
            )),
            task_retention: Duration::from_secs(env_parse(
                "TAXORAG_TASK_RETENTION_SECS",
                defaults.task_retention.as_secs(),
            )),
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 환경변수를 파싱하고 실패 시 기본값 사용
fn env_parse<T: FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(val) => match val.trim().parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!("Invalid value for {}: {:?}, using default", key, val);
                default
            }
        },
        Err(_) => default,
    }
}

/// 문자열 환경변수 (빈 값은 기본값)
fn env_string(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => val,
        _ => default.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
