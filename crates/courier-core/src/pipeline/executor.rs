//! PublishExecutor - scheduled な投稿を配信する
//!
//! 二重配信を防ぐため、送信前に `claim_delivery` で配信権を取ります。
//! 同じタスクのリトライは同じ task_id なので再取得でき、重複タスクは取れません。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::{PipelineContext, SkipReason};
use crate::domain::{
    Artifact, ContentId, ContentStatus, DeliveryClaim, LifecycleEvent, Outcome, PipelineError,
    transition,
};
use crate::ports::ContentPatch;
use crate::typed::{AttemptContext, Handler, PublishContent};

const TASK: &str = "publish";

/// `last_error` written when the channel is gone or switched off at fire time.
pub const CHANNEL_INACTIVE: &str = "channel inactive";

#[derive(Clone)]
pub struct PublishExecutor {
    ctx: Arc<PipelineContext>,
}

impl PublishExecutor {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }

    pub async fn execute(
        &self,
        content_id: ContentId,
        attempt: &AttemptContext,
    ) -> Result<Outcome, PipelineError> {
        let ctx = &self.ctx;
        let skip = |status: Option<ContentStatus>, reason: SkipReason| {
            ctx.skips.record(TASK, content_id, status, reason)
        };

        let Some(item) = ctx.store.get_item(content_id).await? else {
            return Ok(skip(None, SkipReason::ContentMissing));
        };
        if item.status != ContentStatus::Scheduled {
            return Ok(skip(Some(item.status), SkipReason::NotScheduled));
        }

        let channel = match ctx.store.get_channel(item.channel_id).await? {
            Some(channel) if channel.is_active => channel,
            missing_or_inactive => {
                let reason = match missing_or_inactive {
                    None => SkipReason::ChannelMissing,
                    Some(_) => SkipReason::ChannelInactive,
                };
                return self
                    .fail_item(content_id, LifecycleEvent::ChannelInactive, CHANNEL_INACTIVE)
                    .await
                    .map(|_| skip(Some(ContentStatus::Scheduled), reason));
            }
        };

        let claim = DeliveryClaim::new(attempt.task_id, ctx.clock.now());
        if !ctx.store.claim_delivery(content_id, claim).await? {
            return Ok(skip(Some(item.status), SkipReason::ClaimedElsewhere));
        }

        // an earlier attempt of this task already sent; only the status write is left
        if let Some(message_id) = item
            .delivery_claim
            .as_ref()
            .filter(|c| c.is_held_by(attempt.task_id))
            .and_then(|c| c.sent_message_id.clone())
        {
            info!(%content_id, %message_id, attempt = attempt.attempt, "already sent, finishing publish");
            return self.mark_published(content_id, message_id).await;
        }

        let sent = ctx
            .gateway
            .send(&channel.external_channel_id, &item.body, item.media_url.as_deref())
            .await
            .and_then(|message_id| {
                if message_id.trim().is_empty() {
                    Err(PipelineError::Delivery("channel returned empty message id".into()))
                } else {
                    Ok(message_id)
                }
            });

        match sent {
            Ok(message_id) => {
                self.record_sent(content_id, attempt, &message_id).await?;
                self.mark_published(content_id, message_id).await
            }
            Err(err) if err.is_retryable() && !attempt.is_final_attempt() => {
                warn!(
                    %content_id,
                    attempt = attempt.attempt,
                    max_attempts = attempt.max_attempts,
                    error = %err,
                    "delivery failed, will retry"
                );
                Err(err)
            }
            Err(err) => {
                error!(
                    %content_id,
                    attempt = attempt.attempt,
                    error = %err,
                    "delivery failed, giving up"
                );
                self.fail_item(content_id, LifecycleEvent::DeliveryFailed, &err.to_string())
                    .await?;
                Err(err)
            }
        }
    }

    /// Pin the message id to the claim before touching status, so a retry
    /// after a failed status write does not send twice.
    async fn record_sent(
        &self,
        content_id: ContentId,
        attempt: &AttemptContext,
        message_id: &str,
    ) -> Result<(), PipelineError> {
        let unrecorded = |reason: String| {
            error!(%content_id, message_id, %reason, "message sent but not recorded");
            PipelineError::Unrecorded {
                subject: content_id.to_string(),
                message_id: message_id.to_string(),
                reason,
            }
        };
        match self
            .ctx
            .store
            .record_sent(content_id, attempt.task_id, message_id)
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => Err(unrecorded("delivery claim no longer held".to_string())),
            Err(e) => Err(unrecorded(e.to_string())),
        }
    }

    async fn mark_published(
        &self,
        content_id: ContentId,
        message_id: String,
    ) -> Result<Outcome, PipelineError> {
        let ctx = &self.ctx;
        let next = transition(ContentStatus::Scheduled, LifecycleEvent::Delivered)
            .next()
            .ok_or_else(|| PipelineError::precondition(content_id, "delivered rejected"))?;
        let now = ctx.clock.now();

        ctx.store
            .compare_and_update(
                content_id,
                ContentStatus::Scheduled,
                ContentPatch::status(next)
                    .with_message_id(message_id.clone(), now)
                    .releasing_claim(),
            )
            .await?;

        let entry = ctx.metrics.item_entry(content_id, now);
        let first_poll = entry.next_fire_at;
        ctx.schedules.arm(entry).await?;

        info!(%content_id, %message_id, %first_poll, "content published");
        Ok(Outcome::success().with_artifact(Artifact::MessageId(message_id)))
    }

    /// `scheduled → failed`. A lost CAS is not an error: the item already
    /// left `scheduled`.
    async fn fail_item(
        &self,
        content_id: ContentId,
        event: LifecycleEvent,
        reason: &str,
    ) -> Result<(), PipelineError> {
        let Some(next) = transition(ContentStatus::Scheduled, event).next() else {
            return Ok(());
        };
        let patch = ContentPatch::status(next)
            .with_error(reason)
            .releasing_claim();
        match self
            .ctx
            .store
            .compare_and_update(content_id, ContentStatus::Scheduled, patch)
            .await
        {
            Ok(_) => {
                warn!(%content_id, reason, "content failed");
                Ok(())
            }
            Err(PipelineError::Conflict { found, .. }) => {
                warn!(%content_id, %found, "content already moved, not marking failed");
                Ok(())
            }
            Err(PipelineError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Handler<PublishContent> for PublishExecutor {
    async fn handle(
        &self,
        task: PublishContent,
        ctx: &AttemptContext,
    ) -> Result<Outcome, PipelineError> {
        self.execute(task.content_id, ctx).await
    }
}
