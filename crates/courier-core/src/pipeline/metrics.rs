//! MetricsPoller - 公開済み投稿・チャンネルのエンゲージメント定期取得
//!
//! 定期実行そのものは `ScheduleStore` のエントリと sweeper が担当し、
//! ここでは 1 回分の取得と、生存確認に失敗したときの disarm だけを行います。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{PipelineContext, SkipReason};
use crate::domain::{
    Artifact, Channel, ChannelId, ContentId, ContentStatus, EngagementSnapshot, Outcome,
    PipelineError, Subject,
};
use crate::ports::ScheduleEntry;
use crate::ports::schedule_store::seconds;
use crate::typed::{AttemptContext, Handler, PollChannelMetrics, PollContentMetrics};

/// Interval and first delay of the recurring polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSchedule {
    pub interval_secs: u64,
    /// Delay between publish and the first item poll.
    pub initial_delay_secs: u64,
}

impl Default for MetricsSchedule {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            initial_delay_secs: 3600,
        }
    }
}

impl MetricsSchedule {
    pub fn item_entry(&self, content_id: ContentId, now: DateTime<Utc>) -> ScheduleEntry {
        let first = now
            .checked_add_signed(seconds(self.initial_delay_secs))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        ScheduleEntry::new(Subject::Content(content_id), self.interval_secs, first, now)
    }

    /// Channel polls start right away.
    pub fn channel_entry(&self, channel_id: ChannelId, now: DateTime<Utc>) -> ScheduleEntry {
        ScheduleEntry::new(Subject::Channel(channel_id), self.interval_secs, now, now)
    }
}

#[derive(Clone)]
pub struct MetricsPoller {
    ctx: Arc<PipelineContext>,
}

impl MetricsPoller {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }

    /// Install the recurring channel poll once per active channel.
    ///
    /// Returns whether a new entry was armed.
    pub async fn arm_channel(&self, channel_id: ChannelId) -> Result<bool, PipelineError> {
        let ctx = &self.ctx;
        let channel = ctx
            .store
            .get_channel(channel_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(channel_id.to_string()))?;
        if !channel.is_active {
            return Err(PipelineError::precondition(channel_id, "channel inactive"));
        }
        let armed = ctx
            .schedules
            .arm(ctx.metrics.channel_entry(channel_id, ctx.clock.now()))
            .await?;
        if armed {
            info!(%channel_id, interval_secs = ctx.metrics.interval_secs, "channel metrics armed");
        }
        Ok(armed)
    }

    pub async fn poll_item(&self, content_id: ContentId) -> Result<Outcome, PipelineError> {
        let ctx = &self.ctx;
        let subject = Subject::Content(content_id);

        let Some(item) = ctx.store.get_item(content_id).await? else {
            return self.stop(subject, None, SkipReason::ContentMissing).await;
        };
        let Some(message_id) = item.external_message_id.clone() else {
            return self.stop(subject, Some(item.status), SkipReason::NotPublished).await;
        };
        let channel = match self.live_channel(item.channel_id).await? {
            Ok(channel) => channel,
            Err(reason) => return self.stop(subject, Some(item.status), reason).await,
        };

        let stats = ctx
            .gateway
            .fetch_stats(&channel.external_channel_id, &message_id)
            .await?;
        let snapshot = EngagementSnapshot::for_message(subject, stats, ctx.clock.now());
        ctx.store.upsert_snapshot(snapshot.clone()).await?;

        debug!(
            %content_id,
            views = snapshot.views,
            shares = snapshot.shares,
            comments = snapshot.comments,
            "item metrics updated"
        );
        Ok(Outcome::success().with_artifact(snapshot_artifact(&snapshot)))
    }

    pub async fn poll_channel(&self, channel_id: ChannelId) -> Result<Outcome, PipelineError> {
        let ctx = &self.ctx;
        let subject = Subject::Channel(channel_id);

        let channel = match self.live_channel(channel_id).await? {
            Ok(channel) => channel,
            Err(reason) => return self.stop(subject, None, reason).await,
        };

        let info = ctx.gateway.get_info(&channel.external_channel_id).await?;
        let snapshot = EngagementSnapshot::for_channel(channel_id, info.member_count, ctx.clock.now());
        ctx.store.upsert_snapshot(snapshot.clone()).await?;

        debug!(%channel_id, subscribers = info.member_count, "channel metrics updated");
        Ok(Outcome::success().with_artifact(snapshot_artifact(&snapshot)))
    }

    /// The channel if it exists and is active, otherwise why not.
    async fn live_channel(
        &self,
        channel_id: ChannelId,
    ) -> Result<Result<Channel, SkipReason>, PipelineError> {
        Ok(match self.ctx.store.get_channel(channel_id).await? {
            None => Err(SkipReason::ChannelMissing),
            Some(channel) if !channel.is_active => Err(SkipReason::ChannelInactive),
            Some(channel) => Ok(channel),
        })
    }

    /// Disarm the subject's schedule and report the skip.
    async fn stop(
        &self,
        subject: Subject,
        status: Option<ContentStatus>,
        reason: SkipReason,
    ) -> Result<Outcome, PipelineError> {
        let disarmed = self.ctx.schedules.disarm(subject).await?;
        if disarmed {
            info!(%subject, reason = reason.as_str(), "metrics schedule disarmed");
        }
        Ok(self.ctx.skips.record("metrics", subject, status, reason))
    }
}

fn snapshot_artifact(snapshot: &EngagementSnapshot) -> Artifact {
    Artifact::Json(serde_json::json!({
        "subject": snapshot.subject,
        "views": snapshot.views,
        "shares": snapshot.shares,
        "comments": snapshot.comments,
        "subscribers": snapshot.subscribers,
        "engagement_rate": snapshot.engagement_rate(),
    }))
}

#[async_trait]
impl Handler<PollContentMetrics> for MetricsPoller {
    async fn handle(
        &self,
        task: PollContentMetrics,
        _ctx: &AttemptContext,
    ) -> Result<Outcome, PipelineError> {
        self.poll_item(task.content_id).await
    }
}

#[async_trait]
impl Handler<PollChannelMetrics> for MetricsPoller {
    async fn handle(
        &self,
        task: PollChannelMetrics,
        _ctx: &AttemptContext,
    ) -> Result<Outcome, PipelineError> {
        self.poll_channel(task.channel_id).await
    }
}
