//! Typed - 型付き Task API
//!
//! このモジュールは task_type の typo を型で排除し、
//! Handler との対応付けを静的に保証します。
//!
//! # 二層構造
//! - **表層（Typed）**: `Task` trait, `Handler<T>` trait - 型安全
//! - **内部（Dyn）**: `DynHandler` trait - object-safe, type erasure

pub mod handler;
pub mod registry;
pub mod task;

pub use self::handler::{AttemptContext, DynHandler, Handler};
pub use self::registry::{RegistryError, TypedRegistry};
pub use self::task::{
    DispatchContent, PIPELINE_TASK_TYPES, PollChannelMetrics, PollContentMetrics, PublishContent,
    Task,
};

use crate::domain::{TaskId, Trigger};
use crate::queue::{Queue, QueueError};

/// Enqueue a typed task. The payload is the task serialized as JSON.
pub async fn enqueue<T: Task>(
    queue: &dyn Queue,
    task: &T,
    trigger: Trigger,
) -> Result<TaskId, QueueError> {
    let payload = serde_json::to_value(task).map_err(|e| QueueError::Encode {
        task_type: T::TYPE.to_string(),
        message: e.to_string(),
    })?;
    queue
        .enqueue(crate::domain::TaskType::new(T::TYPE), payload, trigger)
        .await
}
