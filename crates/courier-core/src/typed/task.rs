//! Task trait - 型付き Task の定義
//!
//! パイプラインが投入する 4 種類のタスクもここで定義します。

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::{ChannelId, ContentId};

/// Task は task_type と型を対応付ける
///
/// # 命名規約
/// - `{namespace}.{domain}.{action}.v{major}`
/// - 例: `courier.content.publish.v1`
pub trait Task: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TYPE: &'static str;
}

/// Resolve missing body/media and move an approved item to scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchContent {
    pub content_id: ContentId,
}

impl Task for DispatchContent {
    const TYPE: &'static str = "courier.content.dispatch.v1";
}

/// Deliver a scheduled item. Enqueued with `eta = scheduled_time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishContent {
    pub content_id: ContentId,
}

impl Task for PublishContent {
    const TYPE: &'static str = "courier.content.publish.v1";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollContentMetrics {
    pub content_id: ContentId,
}

impl Task for PollContentMetrics {
    const TYPE: &'static str = "courier.metrics.content.v1";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollChannelMetrics {
    pub channel_id: ChannelId,
}

impl Task for PollChannelMetrics {
    const TYPE: &'static str = "courier.metrics.channel.v1";
}

/// Every task type the pipeline enqueues. `AppBuilder::expect_tasks` input.
pub const PIPELINE_TASK_TYPES: [&str; 4] = [
    DispatchContent::TYPE,
    PublishContent::TYPE,
    PollContentMetrics::TYPE,
    PollChannelMetrics::TYPE,
];
