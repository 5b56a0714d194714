//! Engagement counters and the snapshot we keep per subject.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{ChannelId, ContentId};

/// What a snapshot (or a recurring schedule entry) is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Subject {
    Content(ContentId),
    Channel(ChannelId),
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Content(id) => id.fmt(f),
            Subject::Channel(id) => id.fmt(f),
        }
    }
}

/// Per-message counters as reported by the channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageStats {
    pub views: u64,
    pub forwards: u64,
    pub replies: u64,
}

/// Latest engagement capture for one subject (upserted on every poll).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementSnapshot {
    pub subject: Subject,
    pub timestamp: DateTime<Utc>,
    pub views: u64,
    pub shares: u64,
    pub comments: u64,

    /// Channel subscribers; only filled for channel subjects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribers: Option<u64>,
}

impl EngagementSnapshot {
    pub fn for_message(subject: Subject, stats: MessageStats, at: DateTime<Utc>) -> Self {
        Self {
            subject,
            timestamp: at,
            views: stats.views,
            shares: stats.forwards,
            comments: stats.replies,
            subscribers: None,
        }
    }

    pub fn for_channel(channel_id: ChannelId, subscribers: u64, at: DateTime<Utc>) -> Self {
        Self {
            subject: Subject::Channel(channel_id),
            timestamp: at,
            views: 0,
            shares: 0,
            comments: 0,
            subscribers: Some(subscribers),
        }
    }

    pub fn share_rate(&self) -> f64 {
        ratio(self.shares, self.views)
    }

    pub fn comment_rate(&self) -> f64 {
        ratio(self.comments, self.views)
    }

    pub fn engagement_rate(&self) -> f64 {
        ratio(self.shares + self.comments, self.views)
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
