//! Content item record and its lifecycle status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ChannelId, ContentId, TaskId};

/// Lifecycle status of a content item.
///
/// State transitions (see [`crate::domain::lifecycle`]):
/// - Draft -> Approved -> Scheduled -> Published
/// - Scheduled -> Failed (delivery error or inactive channel)
/// - Failed -> Draft (external reset only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Draft,
    Approved,
    Scheduled,
    Published,
    Failed,
}

impl ContentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentStatus::Draft => "draft",
            ContentStatus::Approved => "approved",
            ContentStatus::Scheduled => "scheduled",
            ContentStatus::Published => "published",
            ContentStatus::Failed => "failed",
        }
    }

    /// Terminal for the pipeline (no event the pipeline emits moves it on).
    pub fn is_terminal(self) -> bool {
        matches!(self, ContentStatus::Published | ContentStatus::Failed)
    }
}

impl std::fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ContentStatus::Draft),
            "approved" => Ok(ContentStatus::Approved),
            "scheduled" => Ok(ContentStatus::Scheduled),
            "published" => Ok(ContentStatus::Published),
            "failed" => Ok(ContentStatus::Failed),
            other => Err(format!("unknown content status: {other}")),
        }
    }
}

/// Marks the delivery attempt that owns an item.
///
/// Set atomically before the external send. Retries of the same task carry
/// the same `task_id` and may re-claim; any other task may not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryClaim {
    pub task_id: TaskId,
    pub started_at: DateTime<Utc>,

    /// Message id of a send that already went out under this claim.
    /// A retry that finds it set finishes the publish without sending again.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_message_id: Option<String>,
}

impl DeliveryClaim {
    pub fn new(task_id: TaskId, started_at: DateTime<Utc>) -> Self {
        Self {
            task_id,
            started_at,
            sent_message_id: None,
        }
    }

    pub fn is_held_by(&self, task_id: TaskId) -> bool {
        self.task_id == task_id
    }
}

/// A unit of material scheduled for delivery to a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ContentId,
    pub channel_id: ChannelId,

    /// Text payload. Empty until resolved.
    #[serde(default)]
    pub body: String,

    /// Generation prompt used when `body` is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,

    pub scheduled_time: DateTime<Utc>,
    pub status: ContentStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_message_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_claim: Option<DeliveryClaim>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    pub updated_at: DateTime<Utc>,
}

impl ContentItem {
    pub fn new(
        id: ContentId,
        channel_id: ChannelId,
        body: impl Into<String>,
        scheduled_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            channel_id,
            body: body.into(),
            prompt: None,
            media_url: None,
            scheduled_time,
            status: ContentStatus::Draft,
            external_message_id: None,
            delivery_claim: None,
            published_at: None,
            last_error: None,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: ContentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_media_url(mut self, url: impl Into<String>) -> Self {
        self.media_url = Some(url.into());
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn needs_body(&self) -> bool {
        self.body.trim().is_empty()
    }

    pub fn needs_media(&self) -> bool {
        self.media_url.as_deref().is_none_or(|u| u.trim().is_empty())
    }
}
