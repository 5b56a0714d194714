//! Task record: metadata + envelope.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::TaskState;
use crate::domain::{OutcomeKind, TaskEnvelope};

/// Metadata + envelope for a task in the queue.
///
/// - This is the "single source of truth" for task state.
/// - Queue structures (ready/scheduled) hold TaskId only.
/// - All state transitions happen here.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub envelope: TaskEnvelope,
    pub state: TaskState,

    /// Number of times this task has been executed (including current attempt if Running).
    pub attempts: u32,
    pub max_attempts: u32,

    pub last_error: Option<String>,
    pub last_outcome: Option<OutcomeKind>,

    /// When the task becomes (or became) eligible to run.
    pub fire_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn new(envelope: TaskEnvelope, max_attempts: u32, now: DateTime<Utc>) -> Self {
        Self {
            envelope,
            state: TaskState::Queued,
            attempts: 0,
            max_attempts,
            last_error: None,
            last_outcome: None,
            fire_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Hold the task until `fire_at`.
    pub fn delay_until(&mut self, fire_at: DateTime<Utc>) {
        self.state = TaskState::Delayed;
        self.fire_at = fire_at;
    }

    pub fn start_attempt(&mut self, now: DateTime<Utc>) {
        self.state = TaskState::Running;
        self.attempts += 1;
        self.updated_at = now;
    }

    pub fn mark_succeeded(&mut self, outcome: OutcomeKind, now: DateTime<Utc>) {
        self.state = TaskState::Succeeded;
        self.last_outcome = Some(outcome);
        self.updated_at = now;
    }

    pub fn mark_dead(&mut self, error: String, now: DateTime<Utc>) {
        self.state = TaskState::Dead;
        self.last_error = Some(error);
        self.updated_at = now;
    }

    pub fn schedule_retry(&mut self, fire_at: DateTime<Utc>, error: String, now: DateTime<Utc>) {
        self.state = TaskState::RetryScheduled;
        self.fire_at = fire_at;
        self.last_error = Some(error);
        self.updated_at = now;
    }

    /// Move from Delayed/RetryScheduled back to Queued.
    pub fn requeue(&mut self, now: DateTime<Utc>) {
        self.state = TaskState::Queued;
        self.updated_at = now;
    }
}
