//! Task state machine for the queue.

use serde::{Deserialize, Serialize};

/// Queue-side state of one task (not the content item's status).
///
/// State transitions:
/// - Delayed -> Queued (fire time reached)
/// - Queued -> Running -> Succeeded
/// - Queued -> Running -> RetryScheduled -> Queued (loop until max_attempts)
/// - Queued -> Running -> Dead (permanent error or max_attempts exceeded)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting for its `eta` / `countdown`.
    Delayed,

    /// Ready to run immediately.
    Queued,

    /// Currently being executed by a worker.
    Running,

    /// Handler returned `Ok` (including deliberate skips).
    Succeeded,

    /// Waiting for retry (delayed due to backoff).
    RetryScheduled,

    /// Failed permanently.
    Dead,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Dead)
    }

    pub fn is_runnable(self) -> bool {
        matches!(self, TaskState::Queued)
    }

    /// Sitting in the time-ordered heap.
    pub fn is_waiting(self) -> bool {
        matches!(self, TaskState::Delayed | TaskState::RetryScheduled)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub delayed: usize,
    pub queued: usize,
    pub running: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub retry_scheduled: usize,
    pub dead: usize,
}
