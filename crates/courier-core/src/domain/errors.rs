//! Errors - エラー型と分類
//!
//! `ErrorKind` は運用上の分類で、ワーカーはこれを見てリトライするか決めます。

use thiserror::Error;

use super::content::ContentStatus;

/// Operational classification of a failure.
///
/// - Transient: retry is worthwhile (upstream down, timeout, 5xx)
/// - Permanent: retry is pointless (bad payload, lost race, wiring bug)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
}

/// Pipeline error taxonomy.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Status/channel guard failed. Handlers turn this into a skip, never a task failure.
    #[error("precondition mismatch for {subject}: {reason}")]
    PreconditionMismatch { subject: String, reason: String },

    /// Referenced item or channel vanished.
    #[error("{0} not found")]
    NotFound(String),

    #[error("content generation failed: {0}")]
    Generation(String),

    #[error("storage failed: {0}")]
    Storage(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    /// Storage compare-and-set lost, or an immutable field was touched.
    #[error("conflict on {subject}: expected {expected}, found {found}")]
    Conflict {
        subject: String,
        expected: String,
        found: String,
    },

    /// The external send went out but could not be recorded. Never retried,
    /// since a retry would send the message again.
    #[error("{subject}: message {message_id} sent but not recorded: {reason}")]
    Unrecorded {
        subject: String,
        message_id: String,
        reason: String,
    },

    #[error("payload decode failed for task_type={task_type}: {message}")]
    Decode { task_type: String, message: String },

    #[error("handler not found for task_type={0}")]
    HandlerNotFound(String),
}

impl PipelineError {
    pub fn precondition(subject: impl ToString, reason: impl Into<String>) -> Self {
        Self::PreconditionMismatch {
            subject: subject.to_string(),
            reason: reason.into(),
        }
    }

    pub fn status_conflict(
        subject: impl ToString,
        expected: ContentStatus,
        found: ContentStatus,
    ) -> Self {
        Self::Conflict {
            subject: subject.to_string(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Generation(_)
            | PipelineError::Storage(_)
            | PipelineError::Delivery(_) => ErrorKind::Transient,
            PipelineError::PreconditionMismatch { .. }
            | PipelineError::NotFound(_)
            | PipelineError::Conflict { .. }
            | PipelineError::Unrecorded { .. }
            | PipelineError::Decode { .. }
            | PipelineError::HandlerNotFound(_) => ErrorKind::Permanent,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_failures_are_transient() {
        assert!(PipelineError::Generation("503".into()).is_retryable());
        assert!(PipelineError::Storage("disk full".into()).is_retryable());
        assert!(PipelineError::Delivery("timeout".into()).is_retryable());
    }

    #[test]
    fn guards_and_races_are_permanent() {
        let conflict = PipelineError::status_conflict(
            "content-x",
            ContentStatus::Approved,
            ContentStatus::Scheduled,
        );
        assert_eq!(conflict.kind(), ErrorKind::Permanent);
        assert!(conflict.to_string().contains("expected approved, found scheduled"));
        assert!(!PipelineError::NotFound("content-x".into()).is_retryable());
        let unrecorded = PipelineError::Unrecorded {
            subject: "content-x".into(),
            message_id: "42".into(),
            reason: "db down".into(),
        };
        assert!(!unrecorded.is_retryable());
    }
}
