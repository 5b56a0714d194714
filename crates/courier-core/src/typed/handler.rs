//! Handler trait - Task を実行する Handler の定義
//!
//! - ジェネリック trait (`Handler<T>`)
//! - Object-safe trait (`DynHandler`)
//! - Type erasure パターン (`TypedHandler<T, H>` → `DynHandler`)

use std::marker::PhantomData;

use async_trait::async_trait;

use super::task::Task;
use crate::domain::{Outcome, PipelineError, TaskId};

/// Which attempt of which task is running.
///
/// Handlers that must behave differently on the last attempt (the publish
/// executor marks the item failed instead of asking for a retry) read it here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptContext {
    pub task_id: TaskId,
    /// 1-indexed.
    pub attempt: u32,
    pub max_attempts: u32,
}

impl AttemptContext {
    pub fn is_final_attempt(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

/// Handler は Task を実行して Outcome を返す
///
/// - `Handler<PublishContent>` は `PublishContent` しか受け取れない
/// - Task と Handler の対応はコンパイル時に保証される
#[async_trait]
pub trait Handler<T: Task>: Send + Sync {
    async fn handle(&self, task: T, ctx: &AttemptContext) -> Result<Outcome, PipelineError>;
}

/// DynHandler は object-safe な Handler の抽象化
///
/// `HashMap<String, Arc<dyn DynHandler>>` に格納するためのものです。
#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn handle_dyn(
        &self,
        payload: serde_json::Value,
        ctx: &AttemptContext,
    ) -> Result<Outcome, PipelineError>;

    fn task_type(&self) -> &str;
}

pub struct TypedHandler<T: Task, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<T>,
}

impl<T: Task, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Task, H: Handler<T>> DynHandler for TypedHandler<T, H> {
    async fn handle_dyn(
        &self,
        payload: serde_json::Value,
        ctx: &AttemptContext,
    ) -> Result<Outcome, PipelineError> {
        let task: T = serde_json::from_value(payload).map_err(|e| PipelineError::Decode {
            task_type: T::TYPE.to_string(),
            message: e.to_string(),
        })?;
        self.handler.handle(task, ctx).await
    }

    fn task_type(&self) -> &str {
        T::TYPE
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct EchoTask {
        pub value: i32,
    }

    impl Task for EchoTask {
        const TYPE: &'static str = "test.echo.v1";
    }

    pub struct EchoHandler;

    #[async_trait]
    impl Handler<EchoTask> for EchoHandler {
        async fn handle(&self, task: EchoTask, _ctx: &AttemptContext) -> Result<Outcome, PipelineError> {
            if task.value < 0 {
                return Err(PipelineError::Delivery(format!("negative: {}", task.value)));
            }
            Ok(Outcome::success())
        }
    }

    pub fn ctx() -> AttemptContext {
        AttemptContext {
            task_id: TaskId::from_ulid(ulid::Ulid::new()),
            attempt: 1,
            max_attempts: 3,
        }
    }
}
