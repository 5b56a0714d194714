//! External collaborators the pipeline calls out to.
//!
//! All three are stateless from the pipeline's point of view.

use async_trait::async_trait;

use crate::domain::{ChannelInfo, MessageStats, PipelineError};

/// Fills in missing text and media via a generation service.
#[async_trait]
pub trait ContentResolver: Send + Sync {
    /// Generate post text. `None` uses the resolver's default prompt.
    /// An empty result is reported as `PipelineError::Generation`.
    async fn generate_text(&self, prompt: Option<&str>) -> Result<String, PipelineError>;

    /// Generate image bytes illustrating `prompt`.
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, PipelineError>;
}

/// Durable blob storage.
#[async_trait]
pub trait AssetUploader: Send + Sync {
    /// Store `bytes` under `key` and return a retrievable URL.
    async fn upload(&self, bytes: Vec<u8>, key: &str) -> Result<String, PipelineError>;
}

/// The external channel (Telegram in production).
#[async_trait]
pub trait ChannelGateway: Send + Sync {
    async fn get_info(&self, channel_external_id: &str) -> Result<ChannelInfo, PipelineError>;

    /// Whether our bot administers the channel. Lookup errors answer `false`.
    async fn is_bot_admin(&self, channel_external_id: &str) -> bool;

    /// Deliver `text` (as a photo caption when `media_url` is set) and
    /// return the channel-assigned message id.
    async fn send(
        &self,
        channel_external_id: &str,
        text: &str,
        media_url: Option<&str>,
    ) -> Result<String, PipelineError>;

    async fn fetch_stats(
        &self,
        channel_external_id: &str,
        message_id: &str,
    ) -> Result<MessageStats, PipelineError>;
}
