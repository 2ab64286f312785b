use crate::domain::ports::{DeliveryError, Messenger};
use crate::utils::error::{transport_detail, NotifierError, Result};
use crate::utils::validation::require_credential;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub api_base: String,
    pub parse_mode: Option<String>,
    pub timeout: Duration,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: DEFAULT_API_BASE.to_string(),
            parse_mode: Some("HTML".to_string()),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GetMeResponse {
    ok: bool,
    result: Option<BotUser>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BotUser {
    username: Option<String>,
}

/// Telegram Bot API 的 `sendMessage`
pub struct TelegramMessenger {
    settings: TelegramSettings,
    client: Client,
}

impl TelegramMessenger {
    pub fn new(settings: TelegramSettings) -> Result<Self> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { settings, client })
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        let token = require_credential("telegram.bot_token", self.settings.bot_token.as_deref())?;
        let chat_id = require_credential("telegram.chat_id", self.settings.chat_id.as_deref())?;
        Ok((token, chat_id))
    }

    fn method_url(&self, token: &str, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.settings.api_base.trim_end_matches('/'),
            token,
            method
        )
    }

    fn is_html(&self) -> bool {
        self.settings
            .parse_mode
            .as_deref()
            .is_some_and(|mode| mode.eq_ignore_ascii_case("html"))
    }

    /// 確認 bot token 有效，回傳 bot 的 username
    pub async fn get_me(&self) -> Result<String> {
        let token = require_credential("telegram.bot_token", self.settings.bot_token.as_deref())?;
        let response = self
            .client
            .get(self.method_url(token, "getMe"))
            .send()
            .await
            .map_err(|e| NotifierError::Delivery {
                status: None,
                detail: transport_detail(e),
            })?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(NotifierError::Delivery {
                status: Some(status.as_u16()),
                detail: body,
            });
        }

        let parsed: GetMeResponse = serde_json::from_str(&body)?;
        match parsed {
            GetMeResponse {
                ok: true,
                result: Some(user),
                ..
            } => Ok(user.username.unwrap_or_default()),
            other => Err(NotifierError::Delivery {
                status: Some(status.as_u16()),
                detail: other
                    .description
                    .unwrap_or_else(|| "getMe returned ok=false".to_string()),
            }),
        }
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[async_trait]
impl Messenger for TelegramMessenger {
    fn ensure_configured(&self) -> Result<()> {
        self.credentials().map(|_| ())
    }

    async fn send(&self, text: &str) -> std::result::Result<(), DeliveryError> {
        let (token, chat_id) = self
            .credentials()
            .map_err(|e| DeliveryError {
                status: None,
                detail: e.to_string(),
                retryable: false,
            })?;

        let text = if self.is_html() {
            escape_html(text)
        } else {
            text.to_string()
        };
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(mode) = &self.settings.parse_mode {
            body["parse_mode"] = serde_json::Value::String(mode.clone());
        }

        tracing::debug!("Posting sendMessage to chat {}", chat_id);
        let response = self
            .client
            .post(self.method_url(token, "sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError::transport(transport_detail(e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::http(status.as_u16(), body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn settings(api_base: String) -> TelegramSettings {
        TelegramSettings {
            bot_token: Some("123:abc".to_string()),
            chat_id: Some("-100777".to_string()),
            api_base,
            ..Default::default()
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("Tom & <Jerry>"), "Tom &amp; &lt;Jerry&gt;");
        assert_eq!(escape_html("🎂 plain"), "🎂 plain");
    }

    #[test]
    fn test_missing_chat_id_is_reported_by_field() {
        let messenger = TelegramMessenger::new(TelegramSettings {
            bot_token: Some("123:abc".to_string()),
            chat_id: Some("${TELEGRAM_CHAT_ID}".to_string()),
            ..Default::default()
        })
        .unwrap();

        let err = messenger.ensure_configured().unwrap_err();
        assert!(matches!(err, NotifierError::MissingConfiguration { field } if field == "telegram.chat_id"));
    }

    #[tokio::test]
    async fn test_send_posts_chat_id_and_text() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/bot123:abc/sendMessage")
                    .json_body(serde_json::json!({
                        "chat_id": "-100777",
                        "text": "Hi &lt;b&gt;",
                        "parse_mode": "HTML"
                    }));
                then.status(200).json_body(serde_json::json!({"ok": true}));
            })
            .await;

        let messenger = TelegramMessenger::new(settings(server.base_url())).unwrap();
        messenger.send("Hi <b>").await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_2xx_becomes_delivery_error_with_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/bot123:abc/sendMessage");
                then.status(400)
                    .body(r#"{"ok":false,"description":"Bad Request: chat not found"}"#);
            })
            .await;

        let messenger = TelegramMessenger::new(settings(server.base_url())).unwrap();
        let err = messenger.send("hello").await.unwrap_err();

        assert_eq!(err.status, Some(400));
        assert!(err.detail.contains("chat not found"));
        assert!(!err.retryable);
    }

    #[tokio::test]
    async fn test_get_me_returns_username() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/bot123:abc/getMe");
                then.status(200).json_body(serde_json::json!({
                    "ok": true,
                    "result": {"id": 1, "is_bot": true, "username": "crm_birthday_bot"}
                }));
            })
            .await;

        let messenger = TelegramMessenger::new(settings(server.base_url())).unwrap();
        assert_eq!(messenger.get_me().await.unwrap(), "crm_birthday_bot");
    }

    #[tokio::test]
    async fn test_timeout_detail_names_the_cause() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/bot123:abc/sendMessage");
                then.status(200).delay(Duration::from_secs(3));
            })
            .await;

        let messenger = TelegramMessenger::new(TelegramSettings {
            timeout: Duration::from_millis(300),
            ..settings(server.base_url())
        })
        .unwrap();
        let err = messenger.send("hello").await.unwrap_err();

        assert_eq!(err.status, None);
        assert!(err.retryable);
        assert!(err.detail.contains("timed out"), "{}", err.detail);
    }
}
