//! 원본 문서 파일 저장소
//!
//! 수집된 원본 파일을 raw 디렉토리에 보관하고, 분류가 끝나면
//! 카테고리 디렉토리로 옮깁니다.
//!
//! 레이아웃:
//! ```text
//! <data_dir>/documents/
//!   raw/                          # 분류 전 원본
//!   category_<id>/                # 분류 후
//! ```

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::{RagError, Result};
use crate::taxonomy::Taxonomy;

/// 파일 저장소
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_dir: PathBuf,
    raw_dir: PathBuf,
}

impl FileStorage {
    /// 저장소 초기화 (디렉토리 생성)
    pub fn new(data_dir: &Path, taxonomy: &Taxonomy) -> Result<Self> {
        let base_dir = data_dir.join("documents");
        let raw_dir = base_dir.join("raw");

        std::fs::create_dir_all(&raw_dir)?;
        for category in &taxonomy.categories {
            std::fs::create_dir_all(base_dir.join(Self::category_dirname(&category.id)))?;
        }

        tracing::info!("File storage initialized at {:?}", base_dir);

        Ok(Self { base_dir, raw_dir })
    }

    /// 카테고리 디렉토리 이름
    fn category_dirname(category_id: &str) -> String {
        format!("category_{}", category_id)
    }

    /// raw 디렉토리 경로
    pub fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }

    /// 원본 파일을 raw 디렉토리에 복사
    ///
    /// 충돌 방지를 위해 타임스탬프와 짧은 uuid를 접두어로 붙입니다.
    pub fn save_raw(&self, source: &Path) -> Result<PathBuf> {
        let filename = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| RagError::InvalidParameter(format!("invalid filename: {:?}", source)))?;

        let timestamp = Utc::now().format("%Y%m%d%H%M%S");
        let unique = &uuid::Uuid::new_v4().to_string()[..8];
        let target = self.raw_dir.join(format!("{}_{}_{}", timestamp, unique, filename));

        std::fs::copy(source, &target)?;
        tracing::info!("Document saved to raw directory: {:?}", target);

        Ok(target)
    }

    /// raw 파일을 카테고리 디렉토리로 이동
    ///
    /// 대상 카테고리 디렉토리가 없으면 생성합니다.
    pub fn move_to_category(&self, source: &Path, category_id: &str) -> Result<PathBuf> {
        if category_id.is_empty() {
            return Err(RagError::InvalidParameter("empty category id".into()));
        }

        let category_dir = self.base_dir.join(Self::category_dirname(category_id));
        std::fs::create_dir_all(&category_dir)?;

        let filename = source
            .file_name()
            .ok_or_else(|| RagError::InvalidParameter(format!("invalid filename: {:?}", source)))?;
        let target = category_dir.join(filename);

        std::fs::rename(source, &target)?;
        tracing::info!("Document moved to category {}: {:?}", category_id, target);

        Ok(target)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_raw_and_move_to_category() {
        let data_dir = tempfile::TempDir::new().unwrap();
        let source_dir = tempfile::TempDir::new().unwrap();

        let source = source_dir.path().join("report.txt");
        std::fs::write(&source, "contents").unwrap();

        let storage = FileStorage::new(data_dir.path(), &Taxonomy::minimal()).unwrap();

        let raw = storage.save_raw(&source).unwrap();
        assert!(raw.exists());
        assert!(raw.to_string_lossy().contains("report.txt"));
        // 원본은 남는다
        assert!(source.exists());

        let moved = storage.move_to_category(&raw, "3").unwrap();
        assert!(moved.exists());
        assert!(!raw.exists());
        assert!(moved.to_string_lossy().contains("category_3"));
    }

    #[test]
    fn test_move_to_category_rejects_empty_id() {
        let data_dir = tempfile::TempDir::new().unwrap();
        let storage = FileStorage::new(data_dir.path(), &Taxonomy::minimal()).unwrap();

        let result = storage.move_to_category(Path::new("/tmp/x.txt"), "");
        assert!(matches!(result, Err(RagError::InvalidParameter(_))));
    }
}
