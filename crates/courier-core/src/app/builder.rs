//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! - Builder パターン
//! - 起動時検証（Fail-fast 設計）：期待する task_type が全部登録されているか

use std::sync::Arc;

use super::runtime::Runtime;
use crate::pipeline::{MetricsPoller, PipelineContext, PublishExecutor, SchedulerDispatcher};
use crate::typed::{
    DispatchContent, Handler, PIPELINE_TASK_TYPES, PollChannelMetrics, PollContentMetrics,
    PublishContent, RegistryError, Task, TypedRegistry,
};

/// AppBuilder はアプリケーションを構築
///
/// ```ignore
/// let app = AppBuilder::new()
///     .register::<PublishContent, _>(PublishExecutor::new(ctx.clone()))?
///     .expect_tasks(&[PublishContent::TYPE])
///     .build()?;
/// ```
///
/// `build()` 時に「期待集合 ⊆ 登録済み集合」をチェックし、
/// 不足があれば `BuildError` を返す。
pub struct AppBuilder {
    registry: TypedRegistry,
    expected_tasks: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing task types: {0:?}. These tasks were expected but not registered.")]
    MissingTaskTypes(Vec<String>),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            registry: TypedRegistry::new(),
            expected_tasks: None,
        }
    }

    /// All pipeline handlers registered, and all pipeline task types expected.
    pub fn pipeline(ctx: Arc<PipelineContext>) -> Result<Self, RegistryError> {
        let poller = MetricsPoller::new(Arc::clone(&ctx));
        Ok(Self::new()
            .register::<DispatchContent, _>(SchedulerDispatcher::new(Arc::clone(&ctx)))?
            .register::<PublishContent, _>(PublishExecutor::new(ctx))?
            .register::<PollContentMetrics, _>(poller.clone())?
            .register::<PollChannelMetrics, _>(poller)?
            .expect_tasks(&PIPELINE_TASK_TYPES))
    }

    pub fn register<T: Task, H: Handler<T> + 'static>(
        mut self,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.registry.register::<T, H>(handler)?;
        Ok(self)
    }

    pub fn expect_tasks(mut self, task_types: &[&str]) -> Self {
        self.expected_tasks = Some(task_types.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn build(self) -> Result<App, BuildError> {
        if let Some(expected_tasks) = &self.expected_tasks {
            let registered_types = self.registry.registered_types();
            let missing_tasks: Vec<String> = expected_tasks
                .iter()
                .filter(|x| !registered_types.contains(x))
                .cloned()
                .collect();
            if !missing_tasks.is_empty() {
                return Err(BuildError::MissingTaskTypes(missing_tasks));
            }
        }
        Ok(App {
            runtime: Arc::new(Runtime::new(self.registry)),
        })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 検証済みの Runtime を保持する
pub struct App {
    pub runtime: Arc<Runtime>,
}
