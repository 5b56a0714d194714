use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::TaskId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskType(String);

impl TaskType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// TaskType + Payload (+ TaskId) の"運搬用"データ。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    task_id: TaskId,
    task_type: TaskType,
    payload: serde_json::Value,
}

impl TaskEnvelope {
    pub fn new(task_id: TaskId, task_type: TaskType, payload: serde_json::Value) -> Self {
        Self {
            task_id,
            task_type,
            payload,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn task_type(&self) -> &TaskType {
        &self.task_type
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }
}

/// When an enqueued task becomes eligible to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Eligible immediately.
    Now,
    /// Absolute fire time (`eta`).
    At(DateTime<Utc>),
    /// Relative delay (`countdown`).
    After(Duration),
}

impl Trigger {
    /// Resolve to an absolute fire time against `now`.
    pub fn fire_at(self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Trigger::Now => now,
            Trigger::At(at) => at,
            Trigger::After(delay) => chrono::Duration::from_std(delay)
                .ok()
                .and_then(|d| now.checked_add_signed(d))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// How long to wait from `now`; past fire times mean "run now".
    pub fn delay_from(self, now: DateTime<Utc>) -> Duration {
        (self.fire_at(now) - now).to_std().unwrap_or(Duration::ZERO)
    }
}
