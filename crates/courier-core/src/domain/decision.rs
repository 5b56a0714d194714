//! Decision model: what the queue does with a failed task.
//!
//! The Decider is a pure function of the task record and the failure kind.
//! Applying the decision (scheduling the retry, marking dead) is the lease's job.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ErrorKind;
use super::ids::TaskId;
use crate::queue::{RetryPolicy, TaskRecord};

/// The next action to take for a failed task.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Retry { delay: Duration, reason: String },
    MarkDead { reason: String },
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Retry { .. } => "schedule_retry",
            Decision::MarkDead { .. } => "mark_dead",
        }
    }
}

pub trait Decider: Send + Sync {
    fn decide(&self, task: &TaskRecord, kind: ErrorKind) -> Decision;
}

/// Bounded retry with exponential backoff.
///
/// - Permanent errors are never retried
/// - Transient errors are retried while `attempts < max_attempts`
#[derive(Debug, Clone)]
pub struct DefaultDecider {
    retry_policy: RetryPolicy,
}

impl DefaultDecider {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self { retry_policy }
    }
}

impl Decider for DefaultDecider {
    fn decide(&self, task: &TaskRecord, kind: ErrorKind) -> Decision {
        if kind == ErrorKind::Permanent {
            return Decision::MarkDead {
                reason: "permanent error".to_string(),
            };
        }
        if task.attempts >= task.max_attempts {
            return Decision::MarkDead {
                reason: format!(
                    "max attempts reached: {}/{}",
                    task.attempts, task.max_attempts
                ),
            };
        }
        let delay = self.retry_policy.next_delay(task.attempts);
        Decision::Retry {
            delay,
            reason: format!(
                "retry attempt {}/{} after {:?}",
                task.attempts + 1,
                task.max_attempts,
                delay
            ),
        }
    }
}

/// Why the system did what it did with a failed task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub task_id: TaskId,

    /// What was observed (error text, attempt counters).
    pub trigger: serde_json::Value,

    /// e.g. "retry_policy"
    pub policy: String,

    /// e.g. "schedule_retry", "mark_dead"
    pub decision: String,

    pub context: Option<serde_json::Value>,

    pub decided_at: DateTime<Utc>,
}

impl DecisionRecord {
    pub fn new(
        task_id: TaskId,
        trigger: serde_json::Value,
        policy: impl Into<String>,
        decision: impl Into<String>,
        context: Option<serde_json::Value>,
        decided_at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id,
            trigger,
            policy: policy.into(),
            decision: decision.into(),
            context,
            decided_at,
        }
    }
}
