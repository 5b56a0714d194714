//! InMemoryContentStore - 開発用・テスト用の ContentStore
//!
//! 1 つの Mutex の中で「読んで比較して書く」ので、compare-and-update と
//! claim_delivery は本物の CAS と同じ意味になります。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{
    Channel, ChannelId, ContentId, ContentItem, ContentStatus, DeliveryClaim, EngagementSnapshot,
    PipelineError, Subject, TaskId,
};
use crate::ports::{Clock, ContentPatch, ContentStore};

#[derive(Default)]
struct StoreState {
    items: HashMap<ContentId, ContentItem>,
    channels: HashMap<ChannelId, Channel>,
    snapshots: HashMap<Subject, EngagementSnapshot>,
}

pub struct InMemoryContentStore {
    state: Mutex<StoreState>,
    clock: Arc<dyn Clock>,
}

impl InMemoryContentStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            clock,
        }
    }

    pub async fn insert_item(&self, item: ContentItem) {
        self.state.lock().await.items.insert(item.id, item);
    }

    pub async fn insert_channel(&self, channel: Channel) {
        self.state.lock().await.channels.insert(channel.id, channel);
    }

    pub async fn remove_item(&self, id: ContentId) -> Option<ContentItem> {
        self.state.lock().await.items.remove(&id)
    }

    /// Flip a channel's `is_active`. Returns false if the channel is unknown.
    pub async fn set_channel_active(&self, id: ChannelId, is_active: bool) -> bool {
        let mut state = self.state.lock().await;
        match state.channels.get_mut(&id) {
            Some(channel) => {
                channel.is_active = is_active;
                true
            }
            None => false,
        }
    }

    /// Authoring-surface approval (`draft → approved`).
    pub async fn approve(&self, id: ContentId) -> Result<ContentItem, PipelineError> {
        self.compare_and_update(
            id,
            ContentStatus::Draft,
            ContentPatch::status(ContentStatus::Approved),
        )
        .await
    }

    pub async fn items(&self) -> Vec<ContentItem> {
        let state = self.state.lock().await;
        let mut items: Vec<ContentItem> = state.items.values().cloned().collect();
        items.sort_by_key(|i| (i.scheduled_time, i.id));
        items
    }

    pub async fn channels(&self) -> Vec<Channel> {
        let state = self.state.lock().await;
        let mut channels: Vec<Channel> = state.channels.values().cloned().collect();
        channels.sort_by_key(|c| c.id);
        channels
    }
}

fn not_found(id: ContentId) -> PipelineError {
    PipelineError::NotFound(id.to_string())
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn get_item(&self, id: ContentId) -> Result<Option<ContentItem>, PipelineError> {
        Ok(self.state.lock().await.items.get(&id).cloned())
    }

    async fn get_channel(&self, id: ChannelId) -> Result<Option<Channel>, PipelineError> {
        Ok(self.state.lock().await.channels.get(&id).cloned())
    }

    async fn compare_and_update(
        &self,
        id: ContentId,
        expected: ContentStatus,
        patch: ContentPatch,
    ) -> Result<ContentItem, PipelineError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let item = state.items.get_mut(&id).ok_or_else(|| not_found(id))?;
        if item.status != expected {
            return Err(PipelineError::status_conflict(id, expected, item.status));
        }

        let ContentPatch {
            status,
            body,
            media_url,
            external_message_id,
            published_at,
            last_error,
            release_claim,
        } = patch;

        if let Some(status) = status {
            item.status = status;
        }
        if let Some(body) = body {
            item.body = body;
        }
        if let Some(url) = media_url {
            item.media_url = Some(url);
        }
        if let Some(message_id) = external_message_id {
            item.external_message_id = Some(message_id);
        }
        if let Some(at) = published_at {
            item.published_at = Some(at);
        }
        if let Some(error) = last_error {
            item.last_error = Some(error);
        }
        if release_claim {
            item.delivery_claim = None;
        }
        item.updated_at = now;
        Ok(item.clone())
    }

    async fn claim_delivery(
        &self,
        id: ContentId,
        claim: DeliveryClaim,
    ) -> Result<bool, PipelineError> {
        let mut state = self.state.lock().await;
        let item = state.items.get_mut(&id).ok_or_else(|| not_found(id))?;
        if item.status != ContentStatus::Scheduled {
            return Ok(false);
        }
        match &item.delivery_claim {
            Some(existing) if !existing.is_held_by(claim.task_id) => Ok(false),
            Some(_) => Ok(true),
            None => {
                item.updated_at = claim.started_at;
                item.delivery_claim = Some(claim);
                Ok(true)
            }
        }
    }

    async fn record_sent(
        &self,
        id: ContentId,
        task_id: TaskId,
        message_id: &str,
    ) -> Result<bool, PipelineError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let item = state.items.get_mut(&id).ok_or_else(|| not_found(id))?;
        match item.delivery_claim.as_mut() {
            Some(claim) if item.status == ContentStatus::Scheduled && claim.is_held_by(task_id) => {
                claim.sent_message_id = Some(message_id.to_string());
                item.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn reschedule(
        &self,
        id: ContentId,
        at: DateTime<Utc>,
    ) -> Result<ContentItem, PipelineError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let item = state.items.get_mut(&id).ok_or_else(|| not_found(id))?;
        match item.status {
            ContentStatus::Draft | ContentStatus::Approved => {
                item.scheduled_time = at;
                item.updated_at = now;
                Ok(item.clone())
            }
            other => Err(PipelineError::Conflict {
                subject: id.to_string(),
                expected: "draft or approved".to_string(),
                found: other.to_string(),
            }),
        }
    }

    async fn upsert_snapshot(&self, snapshot: EngagementSnapshot) -> Result<(), PipelineError> {
        self.state
            .lock()
            .await
            .snapshots
            .insert(snapshot.subject, snapshot);
        Ok(())
    }

    async fn snapshot(&self, subject: Subject) -> Result<Option<EngagementSnapshot>, PipelineError> {
        Ok(self.state.lock().await.snapshots.get(&subject).cloned())
    }
}
