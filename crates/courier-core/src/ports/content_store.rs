//! ContentStore port - content item と channel の正本（source of truth）
//!
//! パイプラインがストレージに要求するのは lookup-by-id と compare-and-update だけです。
//! 状態遷移はすべて「期待する現在状態」を添えた条件付き更新で行い、
//! read-then-write の競合（二重配信）を防ぎます。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Channel, ChannelId, ContentId, ContentItem, ContentStatus, DeliveryClaim, EngagementSnapshot,
    PipelineError, Subject, TaskId,
};

/// Fields written together with a status compare-and-set.
///
/// `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentPatch {
    pub status: Option<ContentStatus>,
    pub body: Option<String>,
    pub media_url: Option<String>,
    pub external_message_id: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Drop the delivery claim (e.g. after a terminal outcome).
    pub release_claim: bool,
}

impl ContentPatch {
    pub fn status(next: ContentStatus) -> Self {
        Self {
            status: Some(next),
            ..Self::default()
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_media_url(mut self, url: impl Into<String>) -> Self {
        self.media_url = Some(url.into());
        self
    }

    pub fn with_message_id(mut self, id: impl Into<String>, at: DateTime<Utc>) -> Self {
        self.external_message_id = Some(id.into());
        self.published_at = Some(at);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.last_error = Some(error.into());
        self
    }

    pub fn releasing_claim(mut self) -> Self {
        self.release_claim = true;
        self
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn get_item(&self, id: ContentId) -> Result<Option<ContentItem>, PipelineError>;

    async fn get_channel(&self, id: ChannelId) -> Result<Option<Channel>, PipelineError>;

    /// Apply `patch` only if the item's status still equals `expected`.
    ///
    /// Errors: `NotFound` if the item is gone, `Conflict` if the status moved.
    async fn compare_and_update(
        &self,
        id: ContentId,
        expected: ContentStatus,
        patch: ContentPatch,
    ) -> Result<ContentItem, PipelineError>;

    /// Atomically take ownership of a scheduled item's delivery.
    ///
    /// Succeeds when the item is `scheduled` and unclaimed, or already claimed
    /// by the same task (a retry). Returns `false` when someone else owns it.
    async fn claim_delivery(
        &self,
        id: ContentId,
        claim: DeliveryClaim,
    ) -> Result<bool, PipelineError>;

    /// Remember on the held claim that `message_id` went out.
    ///
    /// Returns `false` unless `task_id` holds the claim of a `scheduled` item.
    async fn record_sent(
        &self,
        id: ContentId,
        task_id: TaskId,
        message_id: &str,
    ) -> Result<bool, PipelineError>;

    /// Move `scheduled_time`. Only `draft`/`approved` items may move; once
    /// dispatched the publish task is armed and the time is fixed (`Conflict`).
    async fn reschedule(
        &self,
        id: ContentId,
        at: DateTime<Utc>,
    ) -> Result<ContentItem, PipelineError>;

    async fn upsert_snapshot(&self, snapshot: EngagementSnapshot) -> Result<(), PipelineError>;

    async fn snapshot(&self, subject: Subject) -> Result<Option<EngagementSnapshot>, PipelineError>;
}
