//! Test doubles for the external collaborators and a wired-up harness.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use ulid::Ulid;

use super::{MetricsSchedule, PipelineContext, SkipLog};
use crate::domain::{
    Channel, ChannelId, ChannelInfo, ContentId, ContentItem, ContentStatus, MessageStats,
    PipelineError, TaskId,
};
use crate::impls::{InMemoryContentStore, InMemoryScheduleStore};
use crate::ports::{AssetUploader, ChannelGateway, ContentResolver, ContentStore, FixedClock};
use crate::queue::{InMemoryQueue, RetryPolicy};
use crate::typed::AttemptContext;

pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

#[derive(Default)]
pub(crate) struct ScriptedResolver {
    pub text: Mutex<String>,
    pub image: Mutex<Vec<u8>>,
    /// Fail this many text generations before succeeding.
    pub text_failures: AtomicU32,
    pub prompts: Mutex<Vec<Option<String>>>,
    pub image_prompts: Mutex<Vec<String>>,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        let r = Self::default();
        *lock(&r.text) = "generated body #courier".to_string();
        *lock(&r.image) = vec![0xff, 0xd8, 0xff];
        r
    }
}

#[async_trait]
impl ContentResolver for ScriptedResolver {
    async fn generate_text(&self, prompt: Option<&str>) -> Result<String, PipelineError> {
        lock(&self.prompts).push(prompt.map(str::to_string));
        if self
            .text_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(PipelineError::Generation("upstream 503".into()));
        }
        Ok(lock(&self.text).clone())
    }

    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, PipelineError> {
        lock(&self.image_prompts).push(prompt.to_string());
        Ok(lock(&self.image).clone())
    }
}

#[derive(Default)]
pub(crate) struct MemoryUploader {
    pub uploads: Mutex<Vec<(String, usize)>>,
}

#[async_trait]
impl AssetUploader for MemoryUploader {
    async fn upload(&self, bytes: Vec<u8>, key: &str) -> Result<String, PipelineError> {
        lock(&self.uploads).push((key.to_string(), bytes.len()));
        Ok(format!("https://cdn.test/{key}"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SentMessage {
    pub channel: String,
    pub text: String,
    pub media_url: Option<String>,
}

pub(crate) struct RecordingGateway {
    pub sent: Mutex<Vec<SentMessage>>,
    /// Fail this many sends before succeeding.
    pub send_failures: AtomicU32,
    /// Answer an empty message id instead of a real one.
    pub empty_ids: std::sync::atomic::AtomicBool,
    next_message_id: AtomicU64,
    pub stats: Mutex<MessageStats>,
    pub member_count: AtomicU64,
    pub stats_calls: AtomicU32,
}

impl Default for RecordingGateway {
    fn default() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            send_failures: AtomicU32::new(0),
            empty_ids: std::sync::atomic::AtomicBool::new(false),
            next_message_id: AtomicU64::new(1000),
            stats: Mutex::new(MessageStats {
                views: 120,
                forwards: 6,
                replies: 3,
            }),
            member_count: AtomicU64::new(1500),
            stats_calls: AtomicU32::new(0),
        }
    }
}

impl RecordingGateway {
    pub fn sent(&self) -> Vec<SentMessage> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl ChannelGateway for RecordingGateway {
    async fn get_info(&self, channel_external_id: &str) -> Result<ChannelInfo, PipelineError> {
        Ok(ChannelInfo {
            id: channel_external_id.to_string(),
            title: Some("Courier".into()),
            member_count: self.member_count.load(Ordering::SeqCst),
            ..ChannelInfo::default()
        })
    }

    async fn is_bot_admin(&self, _channel_external_id: &str) -> bool {
        true
    }

    async fn send(
        &self,
        channel_external_id: &str,
        text: &str,
        media_url: Option<&str>,
    ) -> Result<String, PipelineError> {
        if self
            .send_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(PipelineError::Delivery("telegram timeout".into()));
        }
        lock(&self.sent).push(SentMessage {
            channel: channel_external_id.to_string(),
            text: text.to_string(),
            media_url: media_url.map(str::to_string),
        });
        if self.empty_ids.load(Ordering::SeqCst) {
            return Ok(String::new());
        }
        Ok(self.next_message_id.fetch_add(1, Ordering::SeqCst).to_string())
    }

    async fn fetch_stats(
        &self,
        _channel_external_id: &str,
        _message_id: &str,
    ) -> Result<MessageStats, PipelineError> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*lock(&self.stats))
    }
}

pub(crate) struct Harness {
    pub clock: Arc<FixedClock>,
    pub store: Arc<InMemoryContentStore>,
    pub schedules: Arc<InMemoryScheduleStore>,
    pub queue: Arc<InMemoryQueue>,
    pub resolver: Arc<ScriptedResolver>,
    pub uploader: Arc<MemoryUploader>,
    pub gateway: Arc<RecordingGateway>,
    pub ctx: Arc<PipelineContext>,
}

impl Harness {
    pub fn new() -> Self {
        let clock = Arc::new(FixedClock::new(t0()));
        let store = Arc::new(InMemoryContentStore::new(clock.clone()));
        let schedules = Arc::new(InMemoryScheduleStore::new());
        let queue = Arc::new(InMemoryQueue::new(RetryPolicy::default(), 5, clock.clone()));
        let resolver = Arc::new(ScriptedResolver::new());
        let uploader = Arc::new(MemoryUploader::default());
        let gateway = Arc::new(RecordingGateway::default());

        let ctx = Arc::new(PipelineContext {
            store: store.clone(),
            schedules: schedules.clone(),
            queue: queue.clone(),
            resolver: resolver.clone(),
            uploader: uploader.clone(),
            gateway: gateway.clone(),
            clock: clock.clone(),
            metrics: MetricsSchedule::default(),
            skips: Arc::new(SkipLog::new()),
        });

        Self {
            clock,
            store,
            schedules,
            queue,
            resolver,
            uploader,
            gateway,
            ctx,
        }
    }

    /// Same collaborators, different content store.
    pub fn context_with_store(&self, store: Arc<dyn ContentStore>) -> Arc<PipelineContext> {
        Arc::new(PipelineContext {
            store,
            schedules: self.schedules.clone(),
            queue: self.queue.clone(),
            resolver: self.resolver.clone(),
            uploader: self.uploader.clone(),
            gateway: self.gateway.clone(),
            clock: self.clock.clone(),
            metrics: MetricsSchedule::default(),
            skips: Arc::new(SkipLog::new()),
        })
    }

    pub async fn channel(&self, is_active: bool) -> Channel {
        let mut channel = Channel::new(ChannelId::from_ulid(Ulid::new()), "@courier_news");
        channel.is_active = is_active;
        self.store.insert_channel(channel.clone()).await;
        channel
    }

    /// Item scheduled two hours after `t0()`.
    pub async fn item(&self, channel: &Channel, status: ContentStatus, body: &str) -> ContentItem {
        let item = ContentItem::new(
            ContentId::from_ulid(Ulid::new()),
            channel.id,
            body,
            t0() + chrono::Duration::hours(2),
            t0(),
        )
        .with_status(status);
        self.store.insert_item(item.clone()).await;
        item
    }

    pub async fn reload(&self, item: &ContentItem) -> ContentItem {
        self.store.get_item(item.id).await.unwrap().unwrap()
    }
}

pub(crate) fn attempt(n: u32, max: u32) -> AttemptContext {
    AttemptContext {
        task_id: TaskId::from_ulid(Ulid::new()),
        attempt: n,
        max_attempts: max,
    }
}
