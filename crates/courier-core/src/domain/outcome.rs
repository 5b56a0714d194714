//! Outcome model: what a handler reports when it returns `Ok`.
//!
//! Failures travel as `Err(PipelineError)`; an `Outcome` is either real
//! progress or a deliberate no-op (a guard did not hold).

use serde::{Deserialize, Serialize};

/// Classification of a finished handler run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    Success,
    /// Precondition did not hold (stale/duplicate task, inactive channel, ...).
    Skipped,
}

/// Something produced during execution, kept for logs and tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Artifact {
    /// Message id assigned by the external channel.
    MessageId(String),

    /// URL of an uploaded asset.
    Url(String),

    Json(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub kind: OutcomeKind,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Outcome {
    pub fn success() -> Self {
        Self {
            kind: OutcomeKind::Success,
            artifacts: Vec::new(),
            reason: None,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Skipped,
            artifacts: Vec::new(),
            reason: Some(reason.into()),
        }
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn is_skipped(&self) -> bool {
        self.kind == OutcomeKind::Skipped
    }

    /// First message id artifact, if any.
    pub fn message_id(&self) -> Option<&str> {
        self.artifacts.iter().find_map(|a| match a {
            Artifact::MessageId(id) => Some(id.as_str()),
            _ => None,
        })
    }
}
