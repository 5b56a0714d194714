//! OpenAiResolver - OpenAI API 上の ContentResolver
//!
//! 本文は chat completions、画像は images/generations（URL 応答）を
//! 取得してからダウンロードします。

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::PipelineError;
use crate::ports::ContentResolver;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_TEXT_MODEL: &str = "gpt-4";
pub const DEFAULT_PROMPT: &str = "Generate an engaging post about cryptocurrency or blockchain technology. Include relevant hashtags.";

const SYSTEM_PROMPT: &str = "You are a professional cryptocurrency content creator. Create engaging and informative posts.";
const MAX_TOKENS: u32 = 500;
const TEMPERATURE: f32 = 0.7;
const IMAGE_SIZE: &str = "1024x1024";

pub struct OpenAiResolver {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    text_model: String,
    default_prompt: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
}

impl OpenAiResolver {
    pub fn new(
        api_key: impl Into<String>,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Generation(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            default_prompt: DEFAULT_PROMPT.to_string(),
        })
    }

    pub fn with_text_model(mut self, model: impl Into<String>) -> Self {
        self.text_model = model.into();
        self
    }

    pub fn with_default_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.default_prompt = prompt.into();
        self
    }

    async fn post_json(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, PipelineError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| PipelineError::Generation(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, endpoint, "OpenAI API error");
            return Err(PipelineError::Generation(format!("{endpoint} returned {status}")));
        }
        Ok(resp)
    }
}

#[async_trait]
impl ContentResolver for OpenAiResolver {
    async fn generate_text(&self, prompt: Option<&str>) -> Result<String, PipelineError> {
        let prompt = prompt
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(&self.default_prompt);
        debug!(model = %self.text_model, "requesting post text");

        let body = serde_json::json!({
            "model": self.text_model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "max_tokens": MAX_TOKENS,
            "temperature": TEMPERATURE,
        });
        let completion: ChatCompletion = self
            .post_json("/v1/chat/completions", &body)
            .await?
            .json()
            .await
            .map_err(|e| PipelineError::Generation(e.to_string()))?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(PipelineError::Generation("empty completion".to_string()));
        }
        Ok(text)
    }

    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, PipelineError> {
        let body = serde_json::json!({
            "prompt": prompt,
            "n": 1,
            "size": IMAGE_SIZE,
            "response_format": "url",
        });
        let images: ImageResponse = self
            .post_json("/v1/images/generations", &body)
            .await?
            .json()
            .await
            .map_err(|e| PipelineError::Generation(e.to_string()))?;

        let url = images
            .data
            .into_iter()
            .find_map(|d| d.url)
            .ok_or_else(|| PipelineError::Generation("no image url in response".to_string()))?;
        debug!(%url, "downloading generated image");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PipelineError::Generation(format!("image download: {}", e.without_url())))?;
        if !resp.status().is_success() {
            return Err(PipelineError::Generation(format!(
                "image download returned {}",
                resp.status().as_u16()
            )));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| PipelineError::Generation(format!("image download: {}", e.without_url())))?;
        if bytes.is_empty() {
            return Err(PipelineError::Generation("empty image".to_string()));
        }
        Ok(bytes.to_vec())
    }
}
