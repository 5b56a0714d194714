//! SchedulerDispatcher - approved な投稿を scheduled にして publish を予約する
//!
//! 1. 前提条件（approved、チャンネルが存在して active）を確認
//! 2. 本文が空なら ContentResolver で生成、画像が無ければ生成してアップロード
//! 3. `approved → scheduled` を CAS（本文・画像 URL も同時に書き込む）
//! 4. `eta = scheduled_time` で publish タスクを投入
//!
//! 生成・アップロードの失敗は `Err` として返し、キューの backoff に任せます。
//! その間アイテムは approved のままです。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{PipelineContext, SkipReason, enqueue_task, media_key};
use crate::domain::{
    Artifact, ContentId, ContentStatus, LifecycleEvent, Outcome, PipelineError, Trigger,
    transition,
};
use crate::ports::ContentPatch;
use crate::typed::{AttemptContext, DispatchContent, Handler, PublishContent};

const TASK: &str = "dispatch";

#[derive(Clone)]
pub struct SchedulerDispatcher {
    ctx: Arc<PipelineContext>,
}

impl SchedulerDispatcher {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }

    pub async fn dispatch(&self, content_id: ContentId) -> Result<Outcome, PipelineError> {
        let ctx = &self.ctx;
        let skip = |status: Option<ContentStatus>, reason: SkipReason| {
            ctx.skips.record(TASK, content_id, status, reason)
        };

        let Some(item) = ctx.store.get_item(content_id).await? else {
            return Ok(skip(None, SkipReason::ContentMissing));
        };
        let Some(next) = transition(item.status, LifecycleEvent::Dispatch).next() else {
            return Ok(skip(Some(item.status), SkipReason::NotApproved));
        };
        match ctx.store.get_channel(item.channel_id).await? {
            None => return Ok(skip(Some(item.status), SkipReason::ChannelMissing)),
            Some(channel) if !channel.is_active => {
                return Ok(skip(Some(item.status), SkipReason::ChannelInactive));
            }
            Some(_) => {}
        }

        let mut patch = ContentPatch::status(next);

        let body = if item.needs_body() {
            let text = ctx.resolver.generate_text(item.prompt.as_deref()).await?;
            if text.trim().is_empty() {
                return Err(PipelineError::Generation("resolver returned empty text".into()));
            }
            debug!(%content_id, chars = text.len(), "body generated");
            patch = patch.with_body(text.clone());
            text
        } else {
            item.body.clone()
        };

        if item.needs_media() {
            let bytes = ctx.resolver.generate_image(&body).await?;
            if bytes.is_empty() {
                return Err(PipelineError::Generation("resolver returned empty image".into()));
            }
            let url = ctx.uploader.upload(bytes, &media_key(content_id)).await?;
            if url.trim().is_empty() {
                return Err(PipelineError::Storage("uploader returned empty url".into()));
            }
            debug!(%content_id, %url, "media uploaded");
            patch = patch.with_media_url(url);
        }

        let scheduled = match ctx
            .store
            .compare_and_update(content_id, ContentStatus::Approved, patch)
            .await
        {
            Ok(item) => item,
            Err(PipelineError::Conflict { found, .. }) => {
                let status = found.parse().ok();
                return Ok(skip(status, SkipReason::LostRace));
            }
            Err(PipelineError::NotFound(_)) => return Ok(skip(None, SkipReason::ContentMissing)),
            Err(e) => return Err(e),
        };

        let publish_task = enqueue_task(
            ctx.queue.as_ref(),
            &PublishContent { content_id },
            Trigger::At(scheduled.scheduled_time),
        )
        .await?;

        info!(
            %content_id,
            %publish_task,
            eta = %scheduled.scheduled_time,
            "content scheduled"
        );

        let mut outcome = Outcome::success().with_artifact(Artifact::Json(serde_json::json!({
            "publish_task_id": publish_task.to_string(),
            "eta": scheduled.scheduled_time.to_rfc3339(),
        })));
        if let Some(url) = scheduled.media_url {
            outcome = outcome.with_artifact(Artifact::Url(url));
        }
        Ok(outcome)
    }
}

#[async_trait]
impl Handler<DispatchContent> for SchedulerDispatcher {
    async fn handle(
        &self,
        task: DispatchContent,
        _ctx: &AttemptContext,
    ) -> Result<Outcome, PipelineError> {
        self.dispatch(task.content_id).await
    }
}
