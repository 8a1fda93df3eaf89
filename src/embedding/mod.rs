//! 임베딩 모듈 - Ollama API를 통한 텍스트 벡터화
//!
//! 텍스트를 벡터로 변환하는 Ollama 임베딩 프로바이더입니다.
//! 시맨틱 검색을 위한 핵심 모듈입니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = OllamaEmbedding::new("http://localhost:11434", "nomic-embed-text", 768)?;
//! let embedding = embedder.embed("Hello, world!").await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::{RagError, Result};

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Ollama Embedding
// ============================================================================

/// 기본 임베딩 차원 (nomic-embed-text)
pub const DEFAULT_DIMENSION: usize = 768;

/// 전송 실패 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프 (ms)
const INITIAL_BACKOFF_MS: u64 = 500;

/// 로컬 Ollama 임베딩 구현체
#[derive(Debug)]
pub struct OllamaEmbedding {
    base_url: String,
    model: String,
    client: reqwest::Client,
    dimension: usize,
}

impl OllamaEmbedding {
    /// 새 Ollama 임베딩 인스턴스 생성
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
    ) -> Result<Self> {
        if dimension == 0 {
            return Err(RagError::InvalidParameter(
                "embedding dimension must be positive".into(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| RagError::Embedding(format!("failed to create http client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
            dimension,
        })
    }

    /// 설정에서 생성
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            settings.ollama_base_url.clone(),
            settings.embedding_model.clone(),
            settings.embedding_dimension,
        )
    }
}

/// Ollama 임베딩 요청 본문
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

/// Ollama 임베딩 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        // 빈 텍스트는 0 벡터
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }

        let url = format!("{}/api/embeddings", self.base_url);
        let request = EmbedRequest {
            model: &self.model,
            prompt: text,
        };

        let mut last_error: Option<RagError> = None;

        // 재시도 루프 (전송 실패 시 지수 백오프)
        for attempt in 0..=MAX_RETRIES {
            let response = match self.client.post(&url).json(&request).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(RagError::Embedding(format!(
                        "failed to send embedding request: {}",
                        e
                    )));
                    if attempt < MAX_RETRIES {
                        let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                        tracing::warn!(
                            "Embedding request failed, retrying in {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| RagError::Embedding(format!("failed to read response body: {}", e)))?;

            if status.is_success() {
                let embed_response: EmbedResponse = serde_json::from_str(&body).map_err(|e| {
                    RagError::Embedding(format!("failed to parse embedding response: {}", e))
                })?;

                if embed_response.embedding.len() != self.dimension {
                    return Err(RagError::Embedding(format!(
                        "dimension mismatch: expected {}, got {}",
                        self.dimension,
                        embed_response.embedding.len()
                    )));
                }

                return Ok(embed_response.embedding);
            }

            // 서버 과부하 - 재시도
            if status.as_u16() == 429 || status.is_server_error() {
                last_error = Some(RagError::Embedding(format!(
                    "ollama returned {}: {}",
                    status, body
                )));
                if attempt < MAX_RETRIES {
                    let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                    tracing::warn!(
                        "Ollama busy ({}), backing off {:?} (attempt {}/{})",
                        status,
                        backoff,
                        attempt + 1,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            } else {
                // 다른 에러 - 즉시 실패
                return Err(RagError::Embedding(format!(
                    "ollama api error ({}): {}",
                    status, body
                )));
            }
        }

        Err(last_error.unwrap_or_else(|| {
            RagError::Embedding(format!("embedding failed after {} retries", MAX_RETRIES))
        }))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // Ollama 임베딩 엔드포인트는 단건이므로 순차 처리
        let mut results = Vec::with_capacity(texts.len());

        for (i, text) in texts.iter().enumerate() {
            tracing::debug!("Embedding batch {}/{}", i + 1, texts.len());
            results.push(self.embed(text).await?);
        }

        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Factory Function
// ============================================================================

/// 임베딩 프로바이더 생성 (설정 기반)
pub fn create_embedder(settings: &Settings) -> Result<OllamaEmbedding> {
    let embedder = OllamaEmbedding::from_settings(settings)?;
    tracing::info!(
        "Using Ollama embedding: {} (dimension: {})",
        embedder.name(),
        embedder.dimension()
    );
    Ok(embedder)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_dimension() {
        let result = OllamaEmbedding::new("http://localhost:11434", "nomic-embed-text", 0);
        assert!(result.is_err());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let embedder =
            OllamaEmbedding::new("http://localhost:11434/", "nomic-embed-text", 768).unwrap();
        assert_eq!(embedder.base_url, "http://localhost:11434");
    }

    #[tokio::test]
    async fn test_empty_text_returns_zero_vector() {
        let embedder =
            OllamaEmbedding::new("http://localhost:11434", "nomic-embed-text", 768).unwrap();
        let vec = embedder.embed("   ").await.unwrap();
        assert_eq!(vec.len(), 768);
        assert!(vec.iter().all(|v| *v == 0.0));
    }
}
