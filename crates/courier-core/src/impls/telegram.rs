//! TelegramGateway - Telegram Bot API 上の ChannelGateway
//!
//! すべて `POST {api_base_url}/bot{token}/{method}` に JSON を送り、
//! `{ "ok": bool, "result": ..., "description": ... }` を受け取ります。

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::domain::{ChannelInfo, MessageStats, PipelineError};
use crate::ports::ChannelGateway;

pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

const PARSE_MODE: &str = "HTML";

pub struct TelegramGateway {
    client: reqwest::Client,
    bot_token: String,
    api_base_url: String,
    bot_id: OnceCell<i64>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
    title: Option<String>,
    username: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct ChatMember {
    status: String,
}

#[derive(Debug, Deserialize)]
struct Message {
    message_id: i64,
}

impl TelegramGateway {
    pub fn new(
        bot_token: impl Into<String>,
        api_base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Delivery(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            bot_token: bot_token.into(),
            api_base_url: api_base_url
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            bot_id: OnceCell::new(),
        })
    }

    /// The token is part of every request path, so transport errors are
    /// reported without their URL.
    fn transport_error(&self, method: &str, context: &str, e: reqwest::Error) -> PipelineError {
        let message = e.without_url().to_string().replace(&self.bot_token, "<redacted>");
        PipelineError::Delivery(format!("{method}: {context}{message}"))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, PipelineError> {
        let url = format!("{}/bot{}/{}", self.api_base_url, self.bot_token, method);
        debug!(method, "calling Telegram Bot API");

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(method, "", e))?;

        let status = resp.status().as_u16();
        let api: ApiResponse<T> = resp
            .json()
            .await
            .map_err(|e| self.transport_error(method, &format!("bad response ({status}): "), e))?;

        if !api.ok {
            let description = api.description.unwrap_or_default();
            warn!(method, status, %description, "Telegram API error");
            return Err(PipelineError::Delivery(format!("{method}: {description}")));
        }
        api.result
            .ok_or_else(|| PipelineError::Delivery(format!("{method}: missing result")))
    }

    async fn bot_id(&self) -> Result<i64, PipelineError> {
        let id = self
            .bot_id
            .get_or_try_init(|| async {
                let me: User = self.call("getMe", serde_json::json!({})).await?;
                Ok::<i64, PipelineError>(me.id)
            })
            .await?;
        Ok(*id)
    }

    async fn member_status(&self, channel_external_id: &str) -> Result<String, PipelineError> {
        let user_id = self.bot_id().await?;
        let member: ChatMember = self
            .call(
                "getChatMember",
                serde_json::json!({ "chat_id": channel_external_id, "user_id": user_id }),
            )
            .await?;
        Ok(member.status)
    }
}

#[async_trait]
impl ChannelGateway for TelegramGateway {
    async fn get_info(&self, channel_external_id: &str) -> Result<ChannelInfo, PipelineError> {
        let chat: Chat = self
            .call("getChat", serde_json::json!({ "chat_id": channel_external_id }))
            .await?;
        let member_count: u64 = self
            .call(
                "getChatMemberCount",
                serde_json::json!({ "chat_id": channel_external_id }),
            )
            .await?;

        Ok(ChannelInfo {
            id: chat.id.to_string(),
            title: chat.title,
            username: chat.username,
            description: chat.description,
            member_count,
        })
    }

    async fn is_bot_admin(&self, channel_external_id: &str) -> bool {
        match self.member_status(channel_external_id).await {
            Ok(status) => status == "administrator",
            Err(e) => {
                warn!(channel = channel_external_id, error = %e, "bot admin check failed");
                false
            }
        }
    }

    async fn send(
        &self,
        channel_external_id: &str,
        text: &str,
        media_url: Option<&str>,
    ) -> Result<String, PipelineError> {
        let message: Message = match media_url {
            Some(photo) => {
                self.call(
                    "sendPhoto",
                    serde_json::json!({
                        "chat_id": channel_external_id,
                        "photo": photo,
                        "caption": text,
                        "parse_mode": PARSE_MODE,
                    }),
                )
                .await?
            }
            None => {
                self.call(
                    "sendMessage",
                    serde_json::json!({
                        "chat_id": channel_external_id,
                        "text": text,
                        "parse_mode": PARSE_MODE,
                    }),
                )
                .await?
            }
        };
        Ok(message.message_id.to_string())
    }

    /// Bot API には投稿ごとの閲覧数を取る method が無いので、常にゼロを返す。
    ///
    /// Production item snapshots therefore read all-zero engagement until a
    /// gateway backed by MTProto (user API) replaces this one.
    /// Channel snapshots are unaffected: subscriber counts come from `get_info`.
    async fn fetch_stats(
        &self,
        channel_external_id: &str,
        message_id: &str,
    ) -> Result<MessageStats, PipelineError> {
        debug!(
            channel = channel_external_id,
            message_id, "per-message counters unavailable via Bot API"
        );
        Ok(MessageStats::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn gateway(server: &MockServer) -> TelegramGateway {
        TelegramGateway::new("TOKEN", Some(server.uri()), Duration::from_secs(5)).unwrap()
    }

    fn ok(result: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": result }))
    }

    #[tokio::test]
    async fn send_text_uses_html_parse_mode() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .and(body_partial_json(json!({
                "chat_id": "@courier",
                "text": "<b>hi</b>",
                "parse_mode": "HTML",
            })))
            .respond_with(ok(json!({ "message_id": 42 })))
            .expect(1)
            .mount(&server)
            .await;

        let id = gateway(&server)
            .await
            .send("@courier", "<b>hi</b>", None)
            .await
            .unwrap();
        assert_eq!(id, "42");
    }

    #[tokio::test]
    async fn send_with_media_posts_photo_with_caption() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendPhoto"))
            .and(body_partial_json(json!({
                "photo": "https://cdn/x.jpg",
                "caption": "hello",
            })))
            .respond_with(ok(json!({ "message_id": 7 })))
            .expect(1)
            .mount(&server)
            .await;

        let id = gateway(&server)
            .await
            .send("@courier", "hello", Some("https://cdn/x.jpg"))
            .await
            .unwrap();
        assert_eq!(id, "7");
    }

    #[tokio::test]
    async fn api_error_is_delivery_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "ok": false,
                "description": "Forbidden: bot is not a member of the channel chat",
            })))
            .mount(&server)
            .await;

        let err = gateway(&server)
            .await
            .send("@courier", "hello", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Delivery(ref m) if m.contains("not a member")));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn get_info_combines_chat_and_member_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/getChat"))
            .respond_with(ok(json!({
                "id": -1001234,
                "type": "channel",
                "title": "Courier News",
                "username": "courier",
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/getChatMemberCount"))
            .respond_with(ok(json!(1500)))
            .mount(&server)
            .await;

        let info = gateway(&server).await.get_info("@courier").await.unwrap();
        assert_eq!(info.id, "-1001234");
        assert_eq!(info.title.as_deref(), Some("Courier News"));
        assert_eq!(info.description, None);
        assert_eq!(info.member_count, 1500);
    }

    #[tokio::test]
    async fn admin_check_resolves_bot_id_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/getMe"))
            .respond_with(ok(json!({ "id": 99, "is_bot": true, "first_name": "courier" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/getChatMember"))
            .and(body_partial_json(json!({ "user_id": 99 })))
            .respond_with(ok(json!({ "status": "administrator" })))
            .mount(&server)
            .await;

        let gw = gateway(&server).await;
        assert!(gw.is_bot_admin("@courier").await);
        assert!(gw.is_bot_admin("@courier").await);
    }

    #[tokio::test]
    async fn admin_check_errors_answer_false() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&server)
            .await;

        assert!(!gateway(&server).await.is_bot_admin("@courier").await);
    }

    #[tokio::test]
    async fn plain_member_is_not_admin() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/getMe"))
            .respond_with(ok(json!({ "id": 99 })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/getChatMember"))
            .respond_with(ok(json!({ "status": "member" })))
            .mount(&server)
            .await;

        assert!(!gateway(&server).await.is_bot_admin("@courier").await);
    }

    #[tokio::test]
    async fn transport_errors_do_not_expose_the_token() {
        // nothing listens on port 1
        let gw = TelegramGateway::new(
            "SECRET123:TOKEN",
            Some("http://127.0.0.1:1".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();

        let err = gw.send("@courier", "hello", None).await.unwrap_err();

        assert!(matches!(err, PipelineError::Delivery(_)));
        assert!(err.is_retryable());
        assert!(!err.to_string().contains("SECRET123"), "{err}");
    }

    #[tokio::test]
    async fn undecodable_response_does_not_expose_the_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botSECRET123:TOKEN/sendMessage"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;
        let gw = TelegramGateway::new(
            "SECRET123:TOKEN",
            Some(server.uri()),
            Duration::from_secs(5),
        )
        .unwrap();

        let err = gw.send("@courier", "hello", None).await.unwrap_err();

        assert!(err.to_string().contains("bad response (502)"), "{err}");
        assert!(!err.to_string().contains("SECRET123"), "{err}");
    }

    #[tokio::test]
    async fn slow_api_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ok(json!({ "message_id": 1 })).set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;
        let gw = TelegramGateway::new("TOKEN", Some(server.uri()), Duration::from_millis(200))
            .unwrap();

        let err = gw.send("@courier", "hello", None).await.unwrap_err();

        assert!(err.is_retryable());
        assert!(!err.to_string().contains("TOKEN"), "{err}");
    }

    #[tokio::test]
    async fn message_stats_are_zero_without_calling_the_api() {
        let server = MockServer::start().await;
        let stats = gateway(&server)
            .await
            .fetch_stats("@courier_news", "1000")
            .await
            .unwrap();
        assert_eq!(stats, MessageStats::default());
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
