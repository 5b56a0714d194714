//! Runtime - 型付き Task API の表面
//!
//! lease した envelope を task_type で Handler に振り分けて実行します。

use crate::domain::{Outcome, PipelineError, TaskEnvelope};
use crate::typed::{AttemptContext, TypedRegistry};

/// Runtime executes a `TaskEnvelope` by dispatching to a registered handler.
///
/// The registry is built during initialization and immutable afterwards,
/// so no locks are needed here.
pub struct Runtime {
    registry: TypedRegistry,
}

impl Runtime {
    pub fn new(registry: TypedRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TypedRegistry {
        &self.registry
    }

    /// Execute one envelope.
    pub async fn execute(
        &self,
        envelope: &TaskEnvelope,
        ctx: &AttemptContext,
    ) -> Result<Outcome, PipelineError> {
        let task_type = envelope.task_type().as_str();
        let handler = self
            .registry
            .get(task_type)
            .ok_or_else(|| PipelineError::HandlerNotFound(task_type.to_string()))?;

        handler.handle_dyn(envelope.payload().clone(), ctx).await
    }
}
