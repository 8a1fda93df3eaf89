//! 수집 태스크 상태 추적
//!
//! 문서 하나의 수집 진행 상황을 나타내는 상태 기계입니다.
//! 진행률은 단조 증가하며, 종결 상태(Completed/Failed) 이후에는
//! 더 이상 변하지 않습니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Task State
// ============================================================================

/// 태스크 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// 큐에 들어감, 아직 워커가 집지 않음
    Queued,
    /// 워커가 처리 중
    Processing,
    /// 성공적으로 완료 (진행률 100)
    Completed,
    /// 실패 (진행률은 실패 시점에 고정)
    Failed,
}

impl TaskState {
    /// 종결 상태 여부
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

// ============================================================================
// Processing Task
// ============================================================================

/// 문서 수집 태스크
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingTask {
    /// 문서 id
    pub document_id: String,
    /// 현재 상태
    pub state: TaskState,
    /// 진행률 (0~100, 단조 증가)
    pub progress: u8,
    /// 현재 단계 설명
    pub message: String,
    /// 실패 사유 (Failed일 때만)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 큐 등록 시각
    pub created_at: DateTime<Utc>,
    /// 마지막 갱신 시각
    pub updated_at: DateTime<Utc>,
}

impl ProcessingTask {
    /// 큐 등록 상태로 생성
    pub fn queued(document_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            document_id: document_id.into(),
            state: TaskState::Queued,
            progress: 0,
            message: "Document queued for processing".to_string(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 워커가 처리 시작
    pub fn begin(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.state = TaskState::Processing;
        self.touch();
    }

    /// 진행 단계 갱신
    ///
    /// 진행률은 뒤로 가지 않습니다. 종결 상태에서는 무시됩니다.
    pub fn update(&mut self, progress: u8, message: impl Into<String>) {
        if self.state.is_terminal() {
            return;
        }
        self.state = TaskState::Processing;
        self.progress = self.progress.max(progress.min(100));
        self.message = message.into();
        self.touch();
    }

    /// 성공 종결 (진행률 100)
    pub fn complete(&mut self, message: impl Into<String>) {
        if self.state.is_terminal() {
            return;
        }
        self.state = TaskState::Completed;
        self.progress = 100;
        self.message = message.into();
        self.touch();
    }

    /// 실패 종결 (진행률은 실패 시점에 고정)
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.state.is_terminal() {
            return;
        }
        self.state = TaskState::Failed;
        self.error = Some(error.into());
        self.message = "Document processing failed".to_string();
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_monotonic() {
        let mut task = ProcessingTask::queued("doc-1");
        task.begin();
        task.update(30, "Splitting document into chunks");
        task.update(10, "Extracting text from document");

        // 뒤로 가는 갱신은 진행률을 낮추지 않는다
        assert_eq!(task.progress, 30);
        assert_eq!(task.message, "Extracting text from document");
    }

    #[test]
    fn test_complete_sets_hundred() {
        let mut task = ProcessingTask::queued("doc-1");
        task.begin();
        task.update(90, "Creating chunk nodes in graph");
        task.complete("Document processed successfully");

        assert_eq!(task.state, TaskState::Completed);
        assert_eq!(task.progress, 100);
    }

    #[test]
    fn test_progress_hundred_only_when_completed() {
        let mut task = ProcessingTask::queued("doc-1");
        task.begin();
        task.update(90, "Creating chunk nodes in graph");
        assert!(task.progress < 100);
        assert_ne!(task.state, TaskState::Completed);
    }

    #[test]
    fn test_fail_freezes_progress() {
        let mut task = ProcessingTask::queued("doc-1");
        task.begin();
        task.update(40, "Creating document embedding");
        task.fail("embedding failed: connection refused");

        assert_eq!(task.state, TaskState::Failed);
        assert_eq!(task.progress, 40);
        assert!(task.error.as_deref().unwrap().contains("embedding failed"));

        // 종결 이후 갱신은 무시된다
        task.update(80, "Creating document node in graph");
        task.complete("Document processed successfully");
        assert_eq!(task.state, TaskState::Failed);
        assert_eq!(task.progress, 40);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!TaskState::Queued.is_terminal());
        assert!(!TaskState::Processing.is_terminal());
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Failed.is_terminal());
    }
}
