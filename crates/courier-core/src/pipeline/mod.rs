//! Pipeline - 配信パイプラインの各ハンドラ
//!
//! - **SchedulerDispatcher**: approved → scheduled（本文・画像の補完、publish の予約）
//! - **PublishExecutor**: scheduled → published / failed（配信）
//! - **MetricsPoller**: 公開済み投稿とチャンネルの定期メトリクス取得
//!
//! どのハンドラも前提条件が崩れていたら `Outcome::skipped` を返すだけで、
//! タスクを失敗させません。

pub mod dispatcher;
pub mod executor;
pub mod metrics;
pub mod skips;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

pub use self::dispatcher::SchedulerDispatcher;
pub use self::executor::PublishExecutor;
pub use self::metrics::{MetricsPoller, MetricsSchedule};
pub use self::skips::{SkipLog, SkipReason};

use crate::domain::{ContentId, PipelineError, TaskId, Trigger};
use crate::ports::{AssetUploader, ChannelGateway, Clock, ContentResolver, ContentStore, ScheduleStore};
use crate::queue::Queue;
use crate::typed::{DispatchContent, Task};

/// Everything the handlers share.
pub struct PipelineContext {
    pub store: Arc<dyn ContentStore>,
    pub schedules: Arc<dyn ScheduleStore>,
    pub queue: Arc<dyn Queue>,
    pub resolver: Arc<dyn ContentResolver>,
    pub uploader: Arc<dyn AssetUploader>,
    pub gateway: Arc<dyn ChannelGateway>,
    pub clock: Arc<dyn Clock>,
    pub metrics: MetricsSchedule,
    pub skips: Arc<SkipLog>,
}

/// Blob key of an item's generated image.
pub fn media_key(content_id: ContentId) -> String {
    format!("posts/{}.jpg", content_id.as_ulid())
}

/// Enqueue a typed task, mapping queue failures into the pipeline taxonomy.
pub(crate) async fn enqueue_task<T: Task>(
    queue: &dyn Queue,
    task: &T,
    trigger: Trigger,
) -> Result<TaskId, PipelineError> {
    crate::typed::enqueue(queue, task, trigger)
        .await
        .map_err(|e| PipelineError::Storage(format!("enqueue {}: {e}", T::TYPE)))
}

/// Entry point for the authoring surface: an item was approved, dispatch it now.
pub async fn request_dispatch(
    queue: &dyn Queue,
    content_id: ContentId,
) -> Result<TaskId, PipelineError> {
    enqueue_task(queue, &DispatchContent { content_id }, Trigger::Now).await
}
