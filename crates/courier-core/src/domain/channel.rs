use serde::{Deserialize, Serialize};

use super::ids::ChannelId;

/// The external destination of content items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,

    /// Identifier on the external channel (e.g. `@my_channel` or `-100123...`).
    pub external_channel_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// When false, recurring work for the channel and its items stops.
    pub is_active: bool,
}

impl Channel {
    pub fn new(id: ChannelId, external_channel_id: impl Into<String>) -> Self {
        Self {
            id,
            external_channel_id: external_channel_id.into(),
            title: None,
            is_active: true,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Channel metadata reported by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    pub title: Option<String>,
    pub username: Option<String>,
    pub description: Option<String>,
    pub member_count: u64,
}
