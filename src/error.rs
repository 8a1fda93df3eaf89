//! 에러 타입 정의
//!
//! 파이프라인/검색 단계별 실패를 구분하기 위한 에러 분류입니다.
//! - 수집(ingestion) 중: Extraction/Embedding/StoreWrite는 해당 문서의 태스크를 FAILED로 만듭니다.
//! - 분류(Classification) 실패는 빈 분석 결과로 degrade되며 치명적이지 않습니다.
//! - 검색(retrieval) 중: Embedding/StoreQuery는 해당 브랜치만 빈 결과로 degrade됩니다.
//! - InvalidParameter는 작업 시작 전에 동기적으로 반환됩니다.

use thiserror::Error;

/// taxorag 공통 에러 타입
#[derive(Debug, Error)]
pub enum RagError {
    /// 원본 문서에서 텍스트 추출 실패 (치명적)
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// 분류기 호출/파싱 실패 (빈 분석으로 degrade)
    #[error("classification failed: {0}")]
    Classification(String),

    /// 임베딩 생성 실패
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// 인덱스 쓰기 실패 (다른 스토어의 이미 완료된 쓰기는 롤백되지 않음)
    #[error("store write failed: {0}")]
    StoreWrite(String),

    /// 인덱스 조회 실패 (검색 브랜치에 국한)
    #[error("store query failed: {0}")]
    StoreQuery(String),

    /// 잘못된 파라미터 (작업 시작 전에 반환)
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// 파일 시스템 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// taxorag 공통 Result 타입
pub type Result<T> = std::result::Result<T, RagError>;

// ============================================================================
// Tests
// ============================================================================
