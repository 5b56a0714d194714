//! Queue module: deferred task queue, retry logic, and in-memory implementation.

mod memory;
mod record;
mod retry;
mod state;

pub use memory::InMemoryQueue;
pub use record::TaskRecord;
pub use retry::RetryPolicy;
pub use state::{QueueCounts, TaskState};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Decision, Outcome, PipelineError, TaskEnvelope, TaskId, TaskType, Trigger};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("task {task_id} is {state:?}, expected running")]
    NotRunning { task_id: TaskId, state: TaskState },

    #[error("payload encode failed for task_type={task_type}: {message}")]
    Encode { task_type: String, message: String },
}

/// A leased task for processing.
/// The worker owns this lease and must either `ack` or `fail`.
///
/// - Queue manages state transitions (Queued -> Running -> ...).
/// - Worker/Runtime executes side effects and reports the result.
#[async_trait]
pub trait TaskLease: Send {
    fn envelope(&self) -> &TaskEnvelope;

    /// 1-indexed attempt number of this lease.
    fn attempt(&self) -> u32;

    fn max_attempts(&self) -> u32;

    /// Mark success (or a deliberate skip).
    async fn ack(self: Box<Self>, outcome: &Outcome) -> Result<(), QueueError>;

    /// Mark failure. The queue decides retry or dead and reports what it chose.
    async fn fail(self: Box<Self>, error: &PipelineError) -> Result<Decision, QueueError>;
}

/// Queue port (interface).
#[async_trait]
pub trait Queue: Send + Sync {
    /// Enqueue a new task, eligible according to `trigger`.
    async fn enqueue(
        &self,
        task_type: TaskType,
        payload: serde_json::Value,
        trigger: Trigger,
    ) -> Result<TaskId, QueueError>;

    /// Lease one ready task, waiting until one is available.
    async fn lease(&self) -> Option<Box<dyn TaskLease>>;

    async fn counts_by_state(&self) -> Result<QueueCounts, QueueError>;
}
