//! 콘텐츠 추출 모듈
//!
//! 다양한 파일 형식에서 텍스트 콘텐츠를 추출합니다.
//! - 텍스트/Markdown 파일: 직접 읽기
//! - PDF 파일: pdf-extract로 텍스트 추출

pub mod pdf;

use std::path::Path;

use async_trait::async_trait;

use crate::collector::FileType;
use crate::error::{RagError, Result};

// ============================================================================
// Extracted Content
// ============================================================================

/// 추출된 콘텐츠
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    /// 추출된 전체 텍스트
    pub text: String,
    /// 원본 파일 타입
    pub source_type: FileType,
    /// 메타데이터
    pub metadata: ContentMetadata,
}

/// 콘텐츠 메타데이터
#[derive(Debug, Clone, Default)]
pub struct ContentMetadata {
    /// 총 페이지 수 (PDF)
    pub total_pages: Option<usize>,
}

// ============================================================================
// Text Extractor Trait
// ============================================================================

/// 텍스트 추출 트레이트
///
/// 추출 실패는 해당 문서의 수집 태스크를 실패시킵니다.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// 파일에서 텍스트 추출
    async fn extract(&self, path: &Path, file_type: FileType) -> Result<ExtractedContent>;
}

// ============================================================================
// File Extractor
// ============================================================================

/// 로컬 파일 추출기
#[derive(Debug, Default)]
pub struct FileExtractor;

impl FileExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 텍스트/Markdown 파일에서 추출
    async fn extract_text(&self, path: &Path, file_type: FileType) -> Result<ExtractedContent> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| RagError::Extraction(format!("failed to read {:?}: {}", path, e)))?;

        Ok(ExtractedContent {
            text,
            source_type: file_type,
            metadata: ContentMetadata::default(),
        })
    }

    /// PDF 파일에서 추출
    async fn extract_pdf(&self, path: &Path) -> Result<ExtractedContent> {
        // PDF 추출은 CPU 바운드이므로 spawn_blocking 사용
        let path_buf = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || pdf::extract_text_from_pdf(&path_buf))
            .await
            .map_err(|e| RagError::Extraction(format!("pdf extraction task failed: {}", e)))??;

        let total_pages = pages.len();
        let text = pages
            .into_iter()
            .map(|(_, page_text)| page_text)
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(ExtractedContent {
            text,
            source_type: FileType::Pdf,
            metadata: ContentMetadata {
                total_pages: Some(total_pages),
            },
        })
    }
}

#[async_trait]
impl TextExtractor for FileExtractor {
    async fn extract(&self, path: &Path, file_type: FileType) -> Result<ExtractedContent> {
        match file_type {
            FileType::Text | FileType::Markdown => self.extract_text(path, file_type).await,
            FileType::Pdf => self.extract_pdf(path).await,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
